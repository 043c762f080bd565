use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// JSONL trace of pagination decisions. One object per line; counters are
/// flushed as a `debug.summary` record.
#[derive(Clone)]
pub(crate) struct DebugLogger {
    inner: Arc<Mutex<DebugState>>,
}

struct DebugState {
    writer: BufWriter<File>,
    counters: BTreeMap<String, u64>,
}

impl DebugLogger {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(DebugState {
                writer: BufWriter::new(file),
                counters: BTreeMap::new(),
            })),
        })
    }

    pub fn log_json(&self, json: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = writeln!(state.writer, "{json}");
        }
    }

    pub fn increment(&self, key: &str, amount: u64) {
        if let Ok(mut state) = self.inner.lock() {
            let entry = state.counters.entry(key.to_string()).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
    }

    pub fn page_break(&self, from_page: usize, reason: &str, block_id: Option<&str>) {
        let block = block_id
            .map(|id| format!("\"{}\"", json_escape(id)))
            .unwrap_or_else(|| "null".to_string());
        self.log_json(&format!(
            "{{\"type\":\"compose.page_break\",\"reason\":\"{}\",\"from_page\":{},\"to_page\":{},\"block\":{}}}",
            json_escape(reason),
            from_page,
            from_page + 1,
            block
        ));
        self.increment(&format!("compose.page_break.{reason}"), 1);
    }

    pub fn split(&self, page: usize, block_id: &str, source_y_start: u32, source_y_end: u32) {
        self.log_json(&format!(
            "{{\"type\":\"compose.split\",\"page\":{},\"block\":\"{}\",\"source_y_start\":{},\"source_y_end\":{}}}",
            page,
            json_escape(block_id),
            source_y_start,
            source_y_end
        ));
        self.increment("compose.split", 1);
    }

    pub fn emit_summary(&self, context: &str) {
        if let Ok(mut state) = self.inner.lock() {
            let counters = std::mem::take(&mut state.counters);
            let counts = counters
                .iter()
                .map(|(key, value)| format!("\"{}\":{}", json_escape(key), value))
                .collect::<Vec<_>>()
                .join(",");
            let _ = writeln!(
                state.writer,
                "{{\"type\":\"debug.summary\",\"context\":\"{}\",\"counts\":{{{}}}}}",
                json_escape(context),
                counts
            );
        }
    }

    pub fn flush(&self) {
        if let Ok(mut state) = self.inner.lock() {
            let _ = state.writer.flush();
        }
    }
}

pub(crate) fn json_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(ch),
        }
    }
    out
}
