use crate::error::{PageTileError, Result};
use crate::types::Pt;
use crate::units;
use base64::Engine;
use image::RgbaImage;
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Largest accepted bitmap edge. Anything bigger is almost certainly a
/// capture bug and would push page-space heights out of `Pt` range.
pub const MAX_PIXEL_DIMENSION: u32 = 1 << 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockRole {
    Header,
    Footer,
    Content,
}

impl BlockRole {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockRole::Header => "header",
            BlockRole::Footer => "footer",
            BlockRole::Content => "content",
        }
    }
}

/// One captured section of the form: pixel dimensions plus, optionally, the
/// pixels themselves. Pagination only ever reads the dimensions; the bitmap
/// is carried for the PDF writer.
#[derive(Debug, Clone)]
pub struct RasterBlock {
    id: String,
    role: BlockRole,
    pixel_width: u32,
    pixel_height: u32,
    bitmap: Option<Arc<RgbaImage>>,
}

impl RasterBlock {
    pub fn dimensions_only(
        id: impl Into<String>,
        role: BlockRole,
        pixel_width: u32,
        pixel_height: u32,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            pixel_width,
            pixel_height,
            bitmap: None,
        }
    }

    pub fn from_image(id: impl Into<String>, role: BlockRole, image: RgbaImage) -> Self {
        let (pixel_width, pixel_height) = image.dimensions();
        Self {
            id: id.into(),
            role,
            pixel_width,
            pixel_height,
            bitmap: Some(Arc::new(image)),
        }
    }

    /// Decodes PNG or JPEG bytes.
    pub fn from_encoded(id: impl Into<String>, role: BlockRole, data: &[u8]) -> Result<Self> {
        let id = id.into();
        let decoded = image::load_from_memory(data)
            .map_err(|err| PageTileError::Asset(format!("cannot decode bitmap for '{}': {}", id, err)))?;
        Ok(Self::from_image(id, role, decoded.to_rgba8()))
    }

    /// Accepts the `data:image/png;base64,...` strings that browser canvases export.
    pub fn from_data_uri(id: impl Into<String>, role: BlockRole, uri: &str) -> Result<Self> {
        let id = id.into();
        let Some((mime, data)) = parse_data_uri(uri) else {
            return Err(PageTileError::Asset(format!(
                "block '{}' is not a base64 data URI",
                id
            )));
        };
        if !mime.starts_with("image/") {
            return Err(PageTileError::Asset(format!(
                "block '{}' has non-image data URI type {}",
                id, mime
            )));
        }
        Self::from_encoded(id, role, &data)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> BlockRole {
        self.role
    }

    pub fn pixel_width(&self) -> u32 {
        self.pixel_width
    }

    pub fn pixel_height(&self) -> u32 {
        self.pixel_height
    }

    pub fn bitmap(&self) -> Option<&Arc<RgbaImage>> {
        self.bitmap.as_ref()
    }

    pub fn height_in_page_units(&self, target_width: Pt) -> Result<Pt> {
        units::to_page_units(self, target_width)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(PageTileError::InvalidBlock(format!(
                "{} block has an empty id",
                self.role.as_str()
            )));
        }
        if self.pixel_width == 0 {
            return Err(PageTileError::InvalidBlock(format!(
                "block '{}' has zero pixel width",
                self.id
            )));
        }
        if self.pixel_width > MAX_PIXEL_DIMENSION || self.pixel_height > MAX_PIXEL_DIMENSION {
            return Err(PageTileError::InvalidBlock(format!(
                "block '{}' is {}x{}px, limit is {}px per edge",
                self.id, self.pixel_width, self.pixel_height, MAX_PIXEL_DIMENSION
            )));
        }
        Ok(())
    }
}

/// Source of captured sections. Calls for different ids are independent and
/// may run concurrently.
pub trait Rasterizer: Send + Sync {
    fn capture(&self, block_id: &str) -> Result<RasterBlock>;
}

/// Captures every id in parallel and returns the blocks in the order given.
/// Any failure aborts the batch.
pub fn capture_all<R: Rasterizer + ?Sized>(
    rasterizer: &R,
    block_ids: &[&str],
) -> Result<Vec<RasterBlock>> {
    block_ids
        .par_iter()
        .map(|id| {
            let block = rasterizer.capture(id)?;
            block.validate()?;
            Ok(block)
        })
        .collect()
}

/// Rasterizer backed by blocks captured ahead of time.
#[derive(Debug, Default, Clone)]
pub struct MemoryRasterizer {
    blocks: HashMap<String, RasterBlock>,
}

impl MemoryRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, block: RasterBlock) {
        self.blocks.insert(block.id().to_string(), block);
    }
}

impl Rasterizer for MemoryRasterizer {
    fn capture(&self, block_id: &str) -> Result<RasterBlock> {
        self.blocks
            .get(block_id)
            .cloned()
            .ok_or_else(|| PageTileError::Asset(format!("no capture registered for '{}'", block_id)))
    }
}

fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mut params = header.split(';');
    let mime = params.next().unwrap_or("").to_ascii_lowercase();
    if !params.any(|p| p.eq_ignore_ascii_case("base64")) {
        return None;
    }
    let data = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .ok()?;
    Some((mime, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn decodes_png_data_uri() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes(4, 7));
        let uri = format!("data:image/png;base64,{encoded}");
        let block = RasterBlock::from_data_uri("photo", BlockRole::Content, &uri).expect("decode");
        assert_eq!(block.pixel_width(), 4);
        assert_eq!(block.pixel_height(), 7);
        assert!(block.bitmap().is_some());
    }

    #[test]
    fn rejects_non_base64_and_non_image_uris() {
        assert!(matches!(
            RasterBlock::from_data_uri("a", BlockRole::Content, "data:image/png,abc"),
            Err(PageTileError::Asset(_))
        ));
        assert!(matches!(
            RasterBlock::from_data_uri("b", BlockRole::Content, "data:text/plain;base64,aGk="),
            Err(PageTileError::Asset(_))
        ));
        assert!(matches!(
            RasterBlock::from_encoded("c", BlockRole::Content, b"not an image"),
            Err(PageTileError::Asset(_))
        ));
    }

    #[test]
    fn validate_flags_contract_breaches() {
        let zero = RasterBlock::dimensions_only("z", BlockRole::Content, 0, 10);
        assert!(matches!(zero.validate(), Err(PageTileError::InvalidBlock(_))));
        let unnamed = RasterBlock::dimensions_only("  ", BlockRole::Header, 10, 10);
        assert!(matches!(unnamed.validate(), Err(PageTileError::InvalidBlock(_))));
        let huge = RasterBlock::dimensions_only("h", BlockRole::Content, 10, MAX_PIXEL_DIMENSION + 1);
        assert!(matches!(huge.validate(), Err(PageTileError::InvalidBlock(_))));
        let flat = RasterBlock::dimensions_only("f", BlockRole::Content, 10, 0);
        assert!(flat.validate().is_ok());
    }

    #[test]
    fn capture_all_preserves_input_order() {
        let mut rasterizer = MemoryRasterizer::new();
        for (idx, id) in ["header", "tables", "report", "signatures"].iter().enumerate() {
            rasterizer.insert(RasterBlock::dimensions_only(
                *id,
                BlockRole::Content,
                100,
                10 * (idx as u32 + 1),
            ));
        }
        let blocks = capture_all(&rasterizer, &["signatures", "header", "report", "tables"])
            .expect("capture");
        let ids: Vec<&str> = blocks.iter().map(|b| b.id()).collect();
        assert_eq!(ids, vec!["signatures", "header", "report", "tables"]);
    }

    #[test]
    fn capture_all_surfaces_missing_blocks() {
        let rasterizer = MemoryRasterizer::new();
        assert!(matches!(
            capture_all(&rasterizer, &["missing"]),
            Err(PageTileError::Asset(_))
        ));
    }
}
