use crate::error::{PageTileError, Result};
use crate::frame::Frame;
use crate::plan::DecorationPlacement;
use crate::raster::{BlockRole, RasterBlock};
use crate::types::{Margins, Pt, Rect, Size};
use crate::units;

/// Page size and margins, validated once per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageGeometry {
    page_size: Size,
    margins: Margins,
}

impl PageGeometry {
    pub fn new(page_size: Size, margins: Margins) -> Result<Self> {
        ensure_positive(page_size.width, "page width")?;
        ensure_positive(page_size.height, "page height")?;
        if margins.x < Pt::ZERO || margins.y < Pt::ZERO {
            return Err(PageTileError::Geometry(format!(
                "margins must not be negative, got x={}pt y={}pt",
                margins.x, margins.y
            )));
        }
        if margins.x * 2 >= page_size.width {
            return Err(PageTileError::Geometry(format!(
                "horizontal margins ({}pt each) leave no content width on a {}pt page",
                margins.x, page_size.width
            )));
        }
        Ok(Self {
            page_size,
            margins,
        })
    }

    /// A4 portrait with 3mm margins, the layout the service report form is designed for.
    pub fn a4_form() -> Self {
        Self {
            page_size: Size::a4(),
            margins: Margins::symmetric_mm(3.0, 3.0),
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn margins(&self) -> Margins {
        self.margins
    }

    pub fn content_width(&self) -> Pt {
        self.page_size.width - self.margins.x * 2
    }
}

fn ensure_positive(value: Pt, what: &str) -> Result<()> {
    if value.is_positive() {
        Ok(())
    } else {
        Err(PageTileError::Geometry(format!(
            "{} must be positive, got {}pt",
            what, value
        )))
    }
}

/// The fixed parts of every page: header and footer placements and the
/// content band left between them.
#[derive(Debug, Clone)]
pub struct PageTemplate {
    geometry: PageGeometry,
    header: DecorationPlacement,
    footer: DecorationPlacement,
    band: Rect,
}

impl PageTemplate {
    /// Measures header and footer once and derives the content band.
    /// The header is inset by the margins; the footer spans the full page width.
    pub fn resolve(
        geometry: PageGeometry,
        header: &RasterBlock,
        footer: &RasterBlock,
    ) -> Result<Self> {
        expect_role(header, BlockRole::Header)?;
        expect_role(footer, BlockRole::Footer)?;
        let size = geometry.page_size();
        let margins = geometry.margins();
        let content_width = geometry.content_width();

        let header_height = units::to_page_units(header, content_width)?;
        let footer_height = units::to_page_units(footer, size.width)?;
        let available = size.height - header_height - footer_height - margins.y * 2;
        if !available.is_positive() {
            return Err(PageTileError::Geometry(format!(
                "header ({}pt) and footer ({}pt) leave no room for content on a {}pt page with {}pt vertical margins",
                header_height, footer_height, size.height, margins.y
            )));
        }

        Ok(Self {
            geometry,
            header: DecorationPlacement {
                block_id: header.id().to_string(),
                rect: Rect::new(margins.x, margins.y, content_width, header_height),
            },
            footer: DecorationPlacement {
                block_id: footer.id().to_string(),
                rect: Rect::new(
                    Pt::ZERO,
                    size.height - footer_height,
                    size.width,
                    footer_height,
                ),
            },
            band: Rect::new(
                margins.x,
                margins.y + header_height,
                content_width,
                available,
            ),
        })
    }

    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    pub fn header(&self) -> &DecorationPlacement {
        &self.header
    }

    pub fn footer(&self) -> &DecorationPlacement {
        &self.footer
    }

    pub fn header_height(&self) -> Pt {
        self.header.rect.height
    }

    pub fn footer_height(&self) -> Pt {
        self.footer.rect.height
    }

    /// Height of the content band: page minus header, footer and both vertical margins.
    pub fn available_height(&self) -> Pt {
        self.band.height
    }

    pub fn band(&self) -> Rect {
        self.band
    }

    pub fn instantiate_frame(&self) -> Frame {
        Frame::new(self.band)
    }
}

fn expect_role(block: &RasterBlock, role: BlockRole) -> Result<()> {
    if block.role() == role {
        Ok(())
    } else {
        Err(PageTileError::InvalidBlock(format!(
            "block '{}' has role {} where {} was expected",
            block.id(),
            block.role().as_str(),
            role.as_str()
        )))
    }
}
