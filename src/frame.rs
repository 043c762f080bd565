use crate::error::{PageTileError, Result};
use crate::flowable::ContentBlock;
use crate::plan::{BlockFragment, ContentPlacement};
use crate::types::{Pt, Rect};
use crate::units;

// 0.1mm. Free space at or below this is treated as a full band, so float
// noise in the captured heights never produces sliver fragments.
const SPACE_EPSILON_MILLI: i64 = 283;

/// A content block on its way through pagination, with the first source row
/// not yet placed.
#[derive(Debug, Clone, Copy)]
pub struct PendingBlock<'a> {
    pub index: usize,
    pub block: &'a ContentBlock,
    pub next_row: u32,
}

impl<'a> PendingBlock<'a> {
    pub fn new(index: usize, block: &'a ContentBlock) -> Self {
        Self {
            index,
            block,
            next_row: 0,
        }
    }
}

pub enum AddResult<'a> {
    Placed,
    /// Part of the block was placed; the rest continues on the next page.
    Split(PendingBlock<'a>),
    /// Nothing was placed; the block needs a fresh page.
    Overflow(PendingBlock<'a>),
}

/// The content band of one page with a running cursor.
pub struct Frame {
    rect: Rect,
    cursor_y: Pt,
    placements: Vec<ContentPlacement>,
    visible: bool,
}

impl Frame {
    pub fn new(rect: Rect) -> Self {
        Self {
            rect,
            cursor_y: Pt::ZERO,
            placements: Vec::new(),
            visible: false,
        }
    }

    pub fn remaining_height(&self) -> Pt {
        (self.rect.height - self.cursor_y).max(Pt::ZERO)
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn cursor_y(&self) -> Pt {
        self.cursor_y
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// True once a placement with positive height has been made. Zero-height
    /// placements do not count: a band holding only those is still free.
    pub fn has_visible_content(&self) -> bool {
        self.visible
    }

    pub fn into_placements(self) -> Vec<ContentPlacement> {
        self.placements
    }

    pub fn add<'a>(&mut self, pending: PendingBlock<'a>) -> Result<AddResult<'a>> {
        let block = pending.block.block();
        let (pixel_width, pixel_height) = (block.pixel_width(), block.pixel_height());
        let avail_height = self.remaining_height();

        if !pending.block.pagination().is_splittable() || pixel_height == 0 {
            let height = units::rows_to_height(pixel_height, self.rect.width, pixel_width);
            self.ensure_fits_band(pending, height)?;
            if height <= avail_height {
                self.place(pending, BlockFragment::Whole, self.cursor_y, height);
                return Ok(AddResult::Placed);
            }
            return Ok(AddResult::Overflow(pending));
        }

        if self.visible && avail_height.to_milli_i64() <= SPACE_EPSILON_MILLI {
            return Ok(AddResult::Overflow(pending));
        }

        let remaining_rows = pixel_height - pending.next_row;
        let rows = remaining_rows.min(units::rows_within(
            avail_height,
            self.rect.width,
            pixel_width,
        ));
        if rows == 0 {
            if !self.visible {
                // Not even one source row fits into an empty band.
                let row_height = units::rows_to_height(1, self.rect.width, pixel_width);
                return Err(self.too_large(pending, row_height));
            }
            return Ok(AddResult::Overflow(pending));
        }

        let start = pending.next_row;
        let end = start + rows;
        let fragment = if start == 0 && end == pixel_height {
            BlockFragment::Whole
        } else {
            BlockFragment::Slice {
                source_y_start: start,
                source_y_end: end,
            }
        };
        let height = units::rows_to_height(rows, self.rect.width, pixel_width);
        self.place(pending, fragment, self.cursor_y, height);

        if end == pixel_height {
            Ok(AddResult::Placed)
        } else {
            Ok(AddResult::Split(PendingBlock {
                next_row: end,
                ..pending
            }))
        }
    }

    /// Places an unsplittable block with its bottom edge `anchor_gap` above the
    /// bottom of the band. Overflows when the content already on the page,
    /// plus `clearance`, would reach the anchored position. The block never
    /// ends below the band, whatever the gap.
    pub fn add_anchored<'a>(
        &mut self,
        pending: PendingBlock<'a>,
        anchor_gap: Pt,
        clearance: Pt,
    ) -> Result<AddResult<'a>> {
        let block = pending.block.block();
        let height = units::rows_to_height(
            block.pixel_height(),
            self.rect.width,
            block.pixel_width(),
        );
        self.ensure_fits_band(pending, height)?;

        let lowest = self.rect.height - height;
        let anchor_y = (lowest - anchor_gap).min(lowest).max(Pt::ZERO);
        if self.visible && self.cursor_y + clearance > anchor_y {
            return Ok(AddResult::Overflow(pending));
        }
        self.place(pending, BlockFragment::Whole, anchor_y, height);
        Ok(AddResult::Placed)
    }

    fn place(&mut self, pending: PendingBlock<'_>, fragment: BlockFragment, y: Pt, height: Pt) {
        self.placements.push(ContentPlacement {
            block_id: pending.block.id().to_string(),
            block_index: pending.index,
            fragment,
            rect: Rect::new(self.rect.x, self.rect.y + y, self.rect.width, height),
        });
        self.cursor_y = y + height;
        if height.is_positive() {
            self.visible = true;
        }
    }

    fn ensure_fits_band(&self, pending: PendingBlock<'_>, height: Pt) -> Result<()> {
        if height > self.rect.height {
            return Err(self.too_large(pending, height));
        }
        Ok(())
    }

    fn too_large(&self, pending: PendingBlock<'_>, height: Pt) -> PageTileError {
        PageTileError::BlockTooLarge {
            block_id: pending.block.id().to_string(),
            height,
            available: self.rect.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{BlockRole, RasterBlock};

    fn pt(v: f32) -> Pt {
        Pt::from_f32(v)
    }

    // 100pt wide band, 1px == 1pt for 100px wide blocks.
    fn band(height: f32) -> Frame {
        Frame::new(Rect::new(pt(5.0), pt(20.0), pt(100.0), pt(height)))
    }

    fn splittable(id: &str, px_height: u32) -> ContentBlock {
        ContentBlock::splittable(RasterBlock::dimensions_only(id, BlockRole::Content, 100, px_height))
    }

    fn unsplittable(id: &str, px_height: u32) -> ContentBlock {
        ContentBlock::unsplittable(RasterBlock::dimensions_only(id, BlockRole::Content, 100, px_height))
    }

    #[test]
    fn stacks_blocks_and_reports_overflow() {
        let a = unsplittable("a", 60);
        let b = unsplittable("b", 50);
        let mut frame = band(100.0);
        assert!(matches!(frame.add(PendingBlock::new(0, &a)), Ok(AddResult::Placed)));
        assert_eq!(frame.cursor_y(), pt(60.0));
        assert!(matches!(frame.add(PendingBlock::new(1, &b)), Ok(AddResult::Overflow(_))));
        let placements = frame.into_placements();
        assert_eq!(placements.len(), 1);
        assert_eq!(placements[0].rect, Rect::new(pt(5.0), pt(20.0), pt(100.0), pt(60.0)));
    }

    #[test]
    fn splits_on_whole_rows() {
        let block = splittable("report", 150);
        let mut frame = band(100.0);
        let rest = match frame.add(PendingBlock::new(0, &block)) {
            Ok(AddResult::Split(rest)) => rest,
            _ => panic!("expected split"),
        };
        assert_eq!(rest.next_row, 100);
        assert_eq!(
            frame.into_placements()[0].fragment,
            BlockFragment::Slice {
                source_y_start: 0,
                source_y_end: 100
            }
        );

        let mut next = band(100.0);
        assert!(matches!(next.add(rest), Ok(AddResult::Placed)));
        let placements = next.into_placements();
        assert_eq!(
            placements[0].fragment,
            BlockFragment::Slice {
                source_y_start: 100,
                source_y_end: 150
            }
        );
        assert_eq!(placements[0].rect.height, pt(50.0));
    }

    #[test]
    fn sliver_of_space_counts_as_full() {
        let filler = unsplittable("filler", 100);
        let block = splittable("report", 10);
        // 0.2pt left after the filler, under the 0.1mm threshold.
        let mut frame = band(100.2);
        assert!(matches!(frame.add(PendingBlock::new(0, &filler)), Ok(AddResult::Placed)));
        assert!(matches!(frame.add(PendingBlock::new(1, &block)), Ok(AddResult::Overflow(_))));
    }

    #[test]
    fn unsplittable_taller_than_band_is_fatal() {
        let block = unsplittable("photos", 101);
        let mut frame = band(100.0);
        match frame.add(PendingBlock::new(0, &block)) {
            Err(PageTileError::BlockTooLarge {
                block_id,
                height,
                available,
            }) => {
                assert_eq!(block_id, "photos");
                assert_eq!(height, pt(101.0));
                assert_eq!(available, pt(100.0));
            }
            _ => panic!("expected BlockTooLarge"),
        }
    }

    #[test]
    fn anchored_block_sits_above_band_bottom() {
        let lead = unsplittable("tables", 20);
        let sig = ContentBlock::signature(RasterBlock::dimensions_only(
            "signatures",
            BlockRole::Content,
            100,
            30,
        ));
        let mut frame = band(100.0);
        assert!(matches!(frame.add(PendingBlock::new(0, &lead)), Ok(AddResult::Placed)));
        assert!(matches!(
            frame.add_anchored(PendingBlock::new(1, &sig), pt(5.0), pt(5.0)),
            Ok(AddResult::Placed)
        ));
        let placements = frame.into_placements();
        // band top 20 + anchor 100 - 30 - 5
        assert_eq!(placements[1].rect.y, pt(85.0));
        assert_eq!(placements[1].rect.bottom(), pt(115.0));
    }

    #[test]
    fn anchored_block_overflows_when_clearance_is_violated() {
        let lead = unsplittable("tables", 61);
        let sig = ContentBlock::signature(RasterBlock::dimensions_only(
            "signatures",
            BlockRole::Content,
            100,
            30,
        ));
        let mut frame = band(100.0);
        assert!(matches!(frame.add(PendingBlock::new(0, &lead)), Ok(AddResult::Placed)));
        // anchor at 65, content ends at 61, 61 + 5 > 65.
        assert!(matches!(
            frame.add_anchored(PendingBlock::new(1, &sig), pt(5.0), pt(5.0)),
            Ok(AddResult::Overflow(_))
        ));
    }

    #[test]
    fn zero_height_placements_leave_the_band_free() {
        let notes = unsplittable("empty-notes", 0);
        let sig = ContentBlock::signature(RasterBlock::dimensions_only(
            "signatures",
            BlockRole::Content,
            100,
            92,
        ));
        let mut frame = band(100.0);
        assert!(matches!(frame.add(PendingBlock::new(0, &notes)), Ok(AddResult::Placed)));
        assert!(!frame.is_empty());
        assert!(!frame.has_visible_content());
        // anchor at 100 - 92 - 5 = 3; clearance only applies to visible content.
        assert!(matches!(
            frame.add_anchored(PendingBlock::new(1, &sig), pt(5.0), pt(5.0)),
            Ok(AddResult::Placed)
        ));
        assert!(frame.has_visible_content());
        assert_eq!(frame.into_placements()[1].rect.y, pt(23.0));
    }

    #[test]
    fn negative_anchor_gap_stays_inside_the_band() {
        let sig = ContentBlock::signature(RasterBlock::dimensions_only(
            "signatures",
            BlockRole::Content,
            100,
            30,
        ));
        let mut frame = band(100.0);
        assert!(matches!(
            frame.add_anchored(PendingBlock::new(0, &sig), pt(-20.0), pt(5.0)),
            Ok(AddResult::Placed)
        ));
        // band runs 20..120
        assert_eq!(frame.into_placements()[0].rect.bottom(), pt(120.0));
    }
}
