use crate::raster::RasterBlock;

/// Whether a block may be cut across a page boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakInside {
    /// Cut on whole pixel rows wherever the content band runs out.
    Auto,
    /// Keep in one piece; move to the next page if it does not fit.
    Avoid,
}

/// Vertical positioning rule inside the content band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// Stacked directly below the previous block.
    Flow,
    /// Bottom edge pinned a fixed gap above the footer band (signature block).
    BottomOfBand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pagination {
    pub break_inside: BreakInside,
    pub anchor: Anchor,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            break_inside: BreakInside::Auto,
            anchor: Anchor::Flow,
        }
    }
}

impl Pagination {
    pub fn splittable() -> Self {
        Self::default()
    }

    pub fn unsplittable() -> Self {
        Self {
            break_inside: BreakInside::Avoid,
            anchor: Anchor::Flow,
        }
    }

    pub fn signature() -> Self {
        Self {
            break_inside: BreakInside::Avoid,
            anchor: Anchor::BottomOfBand,
        }
    }

    pub fn is_splittable(self) -> bool {
        matches!(self.break_inside, BreakInside::Auto)
    }

    pub fn is_anchored(self) -> bool {
        matches!(self.anchor, Anchor::BottomOfBand)
    }
}

/// A captured section of the document body together with its pagination rule.
/// Blocks are laid out strictly in the order they are handed to the compositor.
#[derive(Debug, Clone)]
pub struct ContentBlock {
    block: RasterBlock,
    pagination: Pagination,
}

impl ContentBlock {
    pub fn new(block: RasterBlock, pagination: Pagination) -> Self {
        Self { block, pagination }
    }

    pub fn splittable(block: RasterBlock) -> Self {
        Self::new(block, Pagination::splittable())
    }

    pub fn unsplittable(block: RasterBlock) -> Self {
        Self::new(block, Pagination::unsplittable())
    }

    pub fn signature(block: RasterBlock) -> Self {
        Self::new(block, Pagination::signature())
    }

    pub fn block(&self) -> &RasterBlock {
        &self.block
    }

    pub fn id(&self) -> &str {
        self.block.id()
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination
    }
}
