mod canvas;
mod compositor;
mod debug;
mod error;
mod flowable;
mod frame;
mod metrics;
mod page_template;
mod pdf;
mod perf;
mod plan;
mod raster;
mod types;
mod units;

pub use canvas::{Canvas, Command, Document, Page, PageState, SourceCrop};
pub use compositor::{Compositor, SignaturePolicy};
use debug::DebugLogger;
pub use error::{PageTileError, Result};
pub use flowable::{Anchor, BreakInside, ContentBlock, Pagination};
pub use frame::{AddResult, Frame, PendingBlock};
pub use metrics::{DocumentMetrics, PageMetrics};
pub use page_template::{PageGeometry, PageTemplate};
pub use pdf::{ImageStore, document_to_pdf};
use perf::PerfLogger;
pub use plan::{BlockFragment, ContentPlacement, DecorationPlacement, PagePlan, PlannedPage};
pub use raster::{
    BlockRole, MAX_PIXEL_DIMENSION, MemoryRasterizer, RasterBlock, Rasterizer, capture_all,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
pub use types::{Margins, Pt, Rect, Size};
pub use units::{rows_to_height, rows_within, to_page_units};

/// Composes `content` onto pages of `geometry` using the default signature policy.
pub fn compose(
    geometry: PageGeometry,
    header: &RasterBlock,
    footer: &RasterBlock,
    content: &[ContentBlock],
) -> Result<PagePlan> {
    Compositor::new(geometry).compose(header, footer, content)
}

/// A configured compositor with optional JSONL debug and perf logs.
pub struct PageTiler {
    compositor: Compositor,
    debug: Option<Arc<DebugLogger>>,
    perf: Option<Arc<PerfLogger>>,
}

pub struct PageTilerBuilder {
    page_size: Size,
    margins: Margins,
    signature: SignaturePolicy,
    debug_path: Option<PathBuf>,
    perf_path: Option<PathBuf>,
}

impl PageTiler {
    pub fn builder() -> PageTilerBuilder {
        PageTilerBuilder::new()
    }

    pub fn geometry(&self) -> PageGeometry {
        self.compositor.geometry()
    }

    pub fn signature_policy(&self) -> SignaturePolicy {
        self.compositor.signature_policy()
    }

    pub fn compose(
        &self,
        header: &RasterBlock,
        footer: &RasterBlock,
        content: &[ContentBlock],
    ) -> Result<PagePlan> {
        self.compositor.compose(header, footer, content)
    }

    pub fn compose_with_metrics(
        &self,
        header: &RasterBlock,
        footer: &RasterBlock,
        content: &[ContentBlock],
    ) -> Result<(PagePlan, DocumentMetrics)> {
        self.compositor.compose_with_metrics(header, footer, content)
    }

    /// Composes the blocks and writes the result as PDF bytes. Every block
    /// must carry a bitmap.
    pub fn render_pdf(
        &self,
        header: &RasterBlock,
        footer: &RasterBlock,
        content: &[ContentBlock],
    ) -> Result<Vec<u8>> {
        let plan = self.compose(header, footer, content)?;
        let document = {
            let _span = self.perf.as_deref().map(|perf| perf.span("document"));
            plan.to_document()
        };
        let images = ImageStore::from_blocks(
            [header, footer]
                .into_iter()
                .chain(content.iter().map(ContentBlock::block)),
        );
        let bytes = {
            let _span = self.perf.as_deref().map(|perf| perf.span("pdf"));
            document_to_pdf(&document, &images)?
        };
        if let Some(perf) = self.perf.as_deref() {
            perf.log_counts(
                "pdf",
                &[
                    ("pages", document.pages.len() as u64),
                    ("images", images.len() as u64),
                    ("bytes", bytes.len() as u64),
                ],
            );
        }
        self.flush_logs();
        Ok(bytes)
    }

    pub fn render_pdf_to_path(
        &self,
        header: &RasterBlock,
        footer: &RasterBlock,
        content: &[ContentBlock],
        path: impl AsRef<Path>,
    ) -> Result<usize> {
        let bytes = self.render_pdf(header, footer, content)?;
        std::fs::write(path, &bytes)?;
        Ok(bytes.len())
    }

    fn flush_logs(&self) {
        if let Some(logger) = self.debug.as_deref() {
            logger.flush();
        }
        if let Some(perf) = self.perf.as_deref() {
            perf.flush();
        }
    }
}

impl Default for PageTilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PageTilerBuilder {
    /// A4 with 3mm margins and the default signature policy.
    pub fn new() -> Self {
        let geometry = PageGeometry::a4_form();
        Self {
            page_size: geometry.page_size(),
            margins: geometry.margins(),
            signature: SignaturePolicy::default(),
            debug_path: None,
            perf_path: None,
        }
    }

    pub fn page_size(mut self, size: Size) -> Self {
        self.page_size = size;
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    pub fn margins_mm(mut self, x_mm: f32, y_mm: f32) -> Self {
        self.margins = Margins::symmetric_mm(x_mm, y_mm);
        self
    }

    pub fn signature_anchor_gap(mut self, gap: Pt) -> Self {
        self.signature.anchor_gap = gap;
        self
    }

    pub fn signature_clearance(mut self, clearance: Pt) -> Self {
        self.signature.clearance = clearance;
        self
    }

    // JSONL trace of page breaks and splits.
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    // JSONL phase timings; a ranked `_hot.log` is written next to it on drop.
    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.perf_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<PageTiler> {
        let geometry = PageGeometry::new(self.page_size, self.margins)?;
        self.signature.validate()?;
        let debug = if let Some(path) = self.debug_path {
            Some(Arc::new(DebugLogger::new(path)?))
        } else {
            None
        };
        let perf = if let Some(path) = self.perf_path {
            Some(Arc::new(PerfLogger::new(path)?))
        } else {
            None
        };
        let compositor = Compositor::new(geometry)
            .with_signature_policy(self.signature)
            .with_debug(debug.clone())
            .with_perf(perf.clone());
        Ok(PageTiler {
            compositor,
            debug,
            perf,
        })
    }
}
