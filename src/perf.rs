use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::debug::json_escape;

/// Phase timings and counters as JSONL. When dropped, writes a ranked
/// `<stem>_hot.log` next to the main log.
#[derive(Clone)]
pub(crate) struct PerfLogger {
    inner: Arc<Mutex<PerfState>>,
}

struct PerfState {
    writer: BufWriter<File>,
    path: PathBuf,
    span_totals: HashMap<String, (f64, u64)>,
    count_totals: HashMap<String, u64>,
}

impl PerfLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(PerfState {
                writer: BufWriter::new(file),
                path,
                span_totals: HashMap::new(),
                count_totals: HashMap::new(),
            })),
        })
    }

    /// Starts a span that is logged when the returned guard drops.
    pub fn span(&self, name: &'static str) -> PerfSpan<'_> {
        PerfSpan {
            logger: self,
            name,
            start: Instant::now(),
        }
    }

    pub fn log_span_ms(&self, name: &str, ms: f64) {
        let json = format!(
            "{{\"type\":\"perf.span\",\"name\":\"{}\",\"unit\":\"ms\",\"ms\":{:.3}}}",
            json_escape(name),
            ms
        );
        if let Ok(mut state) = self.inner.lock() {
            let entry = state
                .span_totals
                .entry(name.to_string())
                .or_insert((0.0, 0));
            entry.0 += ms;
            entry.1 = entry.1.saturating_add(1);
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn log_counts(&self, name: &str, counts: &[(&str, u64)]) {
        let body = counts
            .iter()
            .map(|(key, value)| format!("\"{}\":{}", json_escape(key), value))
            .collect::<Vec<_>>()
            .join(",");
        let json = format!(
            "{{\"type\":\"perf.counts\",\"name\":\"{}\",\"counts\":{{{}}}}}",
            json_escape(name),
            body
        );
        if let Ok(mut state) = self.inner.lock() {
            for (key, value) in counts {
                let entry = state
                    .count_totals
                    .entry(format!("{name}.{key}"))
                    .or_insert(0);
                *entry = entry.saturating_add(*value);
            }
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

pub(crate) struct PerfSpan<'a> {
    logger: &'a PerfLogger,
    name: &'static str,
    start: Instant,
}

impl Drop for PerfSpan<'_> {
    fn drop(&mut self) {
        let ms = self.start.elapsed().as_secs_f64() * 1000.0;
        self.logger.log_span_ms(self.name, ms);
    }
}

impl Drop for PerfState {
    fn drop(&mut self) {
        let _ = self.writer.flush();
        let Ok(file) = File::create(hot_path_for(&self.path)) else {
            return;
        };
        let mut writer = BufWriter::new(file);

        let mut spans: Vec<(&String, &(f64, u64))> = self.span_totals.iter().collect();
        spans.sort_by(|a, b| {
            b.1 .0
                .partial_cmp(&a.1 .0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        for (rank, (name, (ms, count))) in spans.into_iter().enumerate() {
            let avg = if *count == 0 { 0.0 } else { ms / *count as f64 };
            let _ = writeln!(
                writer,
                "{{\"type\":\"perf.hot.span\",\"rank\":{},\"name\":\"{}\",\"ms\":{:.3},\"count\":{},\"avg_ms\":{:.3}}}",
                rank + 1,
                json_escape(name),
                ms,
                count,
                avg
            );
        }

        let mut counts: Vec<(&String, &u64)> = self.count_totals.iter().collect();
        counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (rank, (name, value)) in counts.into_iter().enumerate() {
            let _ = writeln!(
                writer,
                "{{\"type\":\"perf.hot.count\",\"rank\":{},\"name\":\"{}\",\"value\":{}}}",
                rank + 1,
                json_escape(name),
                value
            );
        }
        let _ = writer.flush();
    }
}

fn hot_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("pagetile_perf.log");
    let stem = file_name
        .rsplit_once('.')
        .map(|(s, _)| s)
        .unwrap_or(file_name);
    path.with_file_name(format!("{stem}_hot.log"))
}
