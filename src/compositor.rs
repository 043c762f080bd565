use crate::debug::DebugLogger;
use crate::error::{PageTileError, Result};
use crate::flowable::ContentBlock;
use crate::frame::{AddResult, Frame, PendingBlock};
use crate::metrics::DocumentMetrics;
use crate::page_template::{PageGeometry, PageTemplate};
use crate::perf::PerfLogger;
use crate::plan::{PagePlan, PlannedPage};
use crate::raster::{BlockRole, RasterBlock};
use crate::types::Pt;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Placement rule for the block anchored to the bottom of the content band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignaturePolicy {
    /// Gap between the block's bottom edge and the bottom of the content band.
    pub anchor_gap: Pt,
    /// Minimum distance between preceding content and the anchored block.
    pub clearance: Pt,
}

impl Default for SignaturePolicy {
    fn default() -> Self {
        Self {
            anchor_gap: Pt::from_mm(5.0),
            clearance: Pt::from_mm(5.0),
        }
    }
}

impl SignaturePolicy {
    /// Both distances must be zero or positive.
    pub fn validate(&self) -> Result<()> {
        if self.anchor_gap < Pt::ZERO || self.clearance < Pt::ZERO {
            return Err(PageTileError::Geometry(format!(
                "signature anchor gap ({}pt) and clearance ({}pt) must not be negative",
                self.anchor_gap, self.clearance
            )));
        }
        Ok(())
    }
}

/// Tiles content blocks onto pages between a repeating header and footer.
///
/// Composition is a pure function of its inputs: the same geometry, policy
/// and blocks always give the same [`PagePlan`].
#[derive(Clone)]
pub struct Compositor {
    geometry: PageGeometry,
    signature: SignaturePolicy,
    debug: Option<Arc<DebugLogger>>,
    perf: Option<Arc<PerfLogger>>,
}

impl Compositor {
    pub fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            signature: SignaturePolicy::default(),
            debug: None,
            perf: None,
        }
    }

    pub fn with_signature_policy(mut self, policy: SignaturePolicy) -> Self {
        self.signature = policy;
        self
    }

    pub(crate) fn with_debug(mut self, debug: Option<Arc<DebugLogger>>) -> Self {
        self.debug = debug;
        self
    }

    pub(crate) fn with_perf(mut self, perf: Option<Arc<PerfLogger>>) -> Self {
        self.perf = perf;
        self
    }

    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    pub fn signature_policy(&self) -> SignaturePolicy {
        self.signature
    }

    pub fn compose(
        &self,
        header: &RasterBlock,
        footer: &RasterBlock,
        content: &[ContentBlock],
    ) -> Result<PagePlan> {
        Ok(self.compose_with_metrics(header, footer, content)?.0)
    }

    pub fn compose_with_metrics(
        &self,
        header: &RasterBlock,
        footer: &RasterBlock,
        content: &[ContentBlock],
    ) -> Result<(PagePlan, DocumentMetrics)> {
        let started = Instant::now();
        let _span = self.perf.as_deref().map(|perf| perf.span("compose"));

        self.signature.validate()?;
        validate_inputs(header, footer, content)?;
        let template = PageTemplate::resolve(self.geometry, header, footer)?;
        let debug = self.debug.as_deref();

        let mut pages: Vec<PlannedPage> = Vec::new();
        let mut frame = template.instantiate_frame();

        for (index, block) in content.iter().enumerate() {
            let pagination = block.pagination();
            let mut pending = PendingBlock::new(index, block);
            loop {
                let page_number = pages.len() + 1;
                let first_row = pending.next_row;
                let result = if pagination.is_anchored() {
                    frame.add_anchored(pending, self.signature.anchor_gap, self.signature.clearance)?
                } else {
                    frame.add(pending)?
                };
                match result {
                    AddResult::Placed => {
                        if first_row > 0 {
                            if let Some(logger) = debug {
                                logger.split(
                                    page_number,
                                    block.id(),
                                    first_row,
                                    block.block().pixel_height(),
                                );
                            }
                        }
                        break;
                    }
                    AddResult::Split(rest) => {
                        if let Some(logger) = debug {
                            logger.split(page_number, block.id(), first_row, rest.next_row);
                            logger.page_break(page_number, "band_full", Some(block.id()));
                        }
                        frame = seal_page(&mut pages, &template, frame);
                        pending = rest;
                    }
                    AddResult::Overflow(rest) => {
                        if !frame.has_visible_content() {
                            // A fresh band refused the block; starting another page would loop.
                            return Err(PageTileError::BlockTooLarge {
                                block_id: block.id().to_string(),
                                height: block.block().height_in_page_units(frame.rect().width)?,
                                available: frame.rect().height,
                            });
                        }
                        if let Some(logger) = debug {
                            let reason = if pagination.is_anchored() {
                                "signature_clearance"
                            } else if pagination.is_splittable() {
                                "band_full"
                            } else {
                                "block_overflow"
                            };
                            logger.page_break(page_number, reason, Some(block.id()));
                        }
                        frame = seal_page(&mut pages, &template, frame);
                        pending = rest;
                    }
                }
            }
        }
        seal_page(&mut pages, &template, frame);

        let plan = PagePlan {
            geometry: template.geometry(),
            header_height: template.header_height(),
            footer_height: template.footer_height(),
            available_content_height: template.available_height(),
            pages,
        };
        let metrics =
            DocumentMetrics::from_plan(&plan, started.elapsed().as_secs_f64() * 1000.0);

        if let Some(logger) = debug {
            logger.increment("compose.pages", plan.page_count() as u64);
            logger.emit_summary("compose");
            logger.flush();
        }
        if let Some(perf) = self.perf.as_deref() {
            perf.log_counts(
                "compose",
                &[
                    ("pages", plan.page_count() as u64),
                    ("placements", metrics.total_placements() as u64),
                    ("blocks", content.len() as u64),
                ],
            );
        }
        Ok((plan, metrics))
    }
}

/// Closes the current page (its footer is implied by the template) and opens the next.
fn seal_page(pages: &mut Vec<PlannedPage>, template: &PageTemplate, frame: Frame) -> Frame {
    pages.push(PlannedPage {
        page_number: pages.len() + 1,
        header: template.header().clone(),
        footer: template.footer().clone(),
        content: frame.into_placements(),
    });
    template.instantiate_frame()
}

fn validate_inputs(
    header: &RasterBlock,
    footer: &RasterBlock,
    content: &[ContentBlock],
) -> Result<()> {
    header.validate()?;
    footer.validate()?;

    let mut seen: HashSet<&str> = HashSet::new();
    for id in [header.id(), footer.id()] {
        if !seen.insert(id) {
            return Err(PageTileError::InvalidBlock(format!(
                "header and footer share the id '{}'",
                id
            )));
        }
    }

    let last = content.len().saturating_sub(1);
    for (index, block) in content.iter().enumerate() {
        let raster = block.block();
        raster.validate()?;
        if raster.role() != BlockRole::Content {
            return Err(PageTileError::InvalidBlock(format!(
                "block '{}' at position {} has role {}, only content blocks can flow",
                raster.id(),
                index,
                raster.role().as_str()
            )));
        }
        if !seen.insert(raster.id()) {
            return Err(PageTileError::InvalidBlock(format!(
                "duplicate block id '{}'",
                raster.id()
            )));
        }
        let pagination = block.pagination();
        if pagination.is_anchored() {
            if pagination.is_splittable() {
                return Err(PageTileError::InvalidBlock(format!(
                    "anchored block '{}' must be unsplittable",
                    raster.id()
                )));
            }
            if index != last {
                return Err(PageTileError::InvalidBlock(format!(
                    "anchored block '{}' must be the last content block",
                    raster.id()
                )));
            }
        }
    }
    Ok(())
}
