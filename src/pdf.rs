use crate::canvas::{Command, Document, SourceCrop};
use crate::error::{PageTileError, Result};
use crate::raster::RasterBlock;
use crate::types::{Pt, Rect};
use image::RgbaImage;
use lopdf::{Document as LoDocument, Object as LoObject, Stream as LoStream, dictionary};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

/// Bitmaps referenced by `DrawImage` commands, keyed by block id.
#[derive(Debug, Clone, Default)]
pub struct ImageStore {
    images: HashMap<String, Arc<RgbaImage>>,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects the bitmaps of every block that carries one.
    pub fn from_blocks<'a>(blocks: impl IntoIterator<Item = &'a RasterBlock>) -> Self {
        let mut store = Self::new();
        for block in blocks {
            if let Some(bitmap) = block.bitmap() {
                store.insert(block.id(), Arc::clone(bitmap));
            }
        }
        store
    }

    pub fn insert(&mut self, id: impl Into<String>, image: Arc<RgbaImage>) {
        self.images.insert(id.into(), image);
    }

    pub fn get(&self, id: &str) -> Option<&Arc<RgbaImage>> {
        self.images.get(id)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

// One image XObject per distinct (bitmap, crop) pair.
type ImageKey = (String, Option<SourceCrop>);

struct EncodedImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

/// Writes the recorded document as a PDF, one page per [`Document`] page.
///
/// Draw commands are emitted in recorded order. Rects with zero height and
/// empty crops draw nothing.
pub fn document_to_pdf(document: &Document, images: &ImageStore) -> Result<Vec<u8>> {
    let mut keys: Vec<ImageKey> = Vec::new();
    let mut key_index: HashMap<ImageKey, usize> = HashMap::new();
    for page in &document.pages {
        for command in &page.commands {
            if let Some(key) = drawable_key(command) {
                if !key_index.contains_key(&key) {
                    key_index.insert(key.clone(), keys.len());
                    keys.push(key);
                }
            }
        }
    }

    let encoded: Vec<EncodedImage> = keys
        .par_iter()
        .map(|(id, crop)| encode_image(id, *crop, images))
        .collect::<Result<Vec<_>>>()?;

    let page_width = document.page_size.width;
    let page_height = document.page_size.height;

    let mut doc = LoDocument::with_version("1.7");
    let pages_id = doc.new_object_id();

    let mut image_ids = Vec::with_capacity(encoded.len());
    for image in encoded {
        let smask_id = image.alpha.map(|alpha| {
            doc.add_object(LoStream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => i64::from(image.width),
                    "Height" => i64::from(image.height),
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                alpha,
            ))
        });
        let mut dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(image.width),
            "Height" => i64::from(image.height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        };
        if let Some(id) = smask_id {
            dict.set("SMask", id);
        }
        image_ids.push(doc.add_object(LoStream::new(dict, image.rgb)));
    }

    let mut kids: Vec<LoObject> = Vec::with_capacity(document.pages.len());
    for page in &document.pages {
        let mut content = String::new();
        let mut xobjects = lopdf::Dictionary::new();
        for command in &page.commands {
            let Command::DrawImage { rect, .. } = command else {
                continue;
            };
            let Some(key) = drawable_key(command) else {
                continue;
            };
            let Some(&idx) = key_index.get(&key) else {
                continue;
            };
            let name = format!("Im{}", idx + 1);
            content.push_str(&draw_operator(rect, page_height, &name));
            xobjects.set(name, image_ids[idx]);
        }

        let content_id = doc.add_object(LoStream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => LoObject::Dictionary(xobjects),
            },
            "MediaBox" => vec![
                0.into(),
                0.into(),
                page_width.to_f32().into(),
                page_height.to_f32().into(),
            ],
        });
        kids.push(LoObject::Reference(page_id));
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|err| PageTileError::Asset(format!("pdf write failed: {err}")))?;
    Ok(out)
}

fn drawable_key(command: &Command) -> Option<ImageKey> {
    let Command::DrawImage {
        rect,
        resource_id,
        crop,
    } = command
    else {
        return None;
    };
    if !rect.height.is_positive() || !rect.width.is_positive() {
        return None;
    }
    if let Some(c) = crop {
        if c.y_end <= c.y_start {
            return None;
        }
    }
    Some((resource_id.clone(), *crop))
}

/// `cm` maps the unit square onto the rect; PDF user space has its origin
/// at the bottom-left.
fn draw_operator(rect: &Rect, page_height: Pt, name: &str) -> String {
    let pdf_y = page_height - rect.y - rect.height;
    format!(
        "q {} 0 0 {} {} {} cm /{} Do Q\n",
        rect.width, rect.height, rect.x, pdf_y, name
    )
}

fn encode_image(id: &str, crop: Option<SourceCrop>, images: &ImageStore) -> Result<EncodedImage> {
    let Some(bitmap) = images.get(id) else {
        return Err(PageTileError::Asset(format!("no bitmap for block '{}'", id)));
    };
    let (width, full_height) = bitmap.dimensions();
    let (y_start, y_end) = match crop {
        Some(c) => (c.y_start, c.y_end),
        None => (0, full_height),
    };
    if y_end > full_height || y_start >= y_end || width == 0 {
        return Err(PageTileError::Asset(format!(
            "rows {}..{} of block '{}' fall outside its {}x{} bitmap",
            y_start, y_end, id, width, full_height
        )));
    }
    let height = y_end - y_start;
    let view = image::imageops::crop_imm(&**bitmap, 0, y_start, width, height).to_image();

    let pixels = (width as usize) * (height as usize);
    let mut rgb = Vec::with_capacity(pixels * 3);
    let mut alpha = Vec::with_capacity(pixels);
    let mut has_alpha = false;
    for pixel in view.pixels() {
        let [r, g, b, a] = pixel.0;
        if a != 255 {
            has_alpha = true;
        }
        rgb.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }
    Ok(EncodedImage {
        width,
        height,
        rgb,
        alpha: has_alpha.then_some(alpha),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::types::Size;
    use image::Rgba;

    fn pt(v: f32) -> Pt {
        Pt::from_f32(v)
    }

    fn solid(width: u32, height: u32, alpha: u8) -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(width, height, Rgba([200, 10, 10, alpha])))
    }

    fn store() -> ImageStore {
        let mut store = ImageStore::new();
        store.insert("header", solid(10, 2, 255));
        store.insert("report", solid(10, 30, 255));
        store.insert("stamp", solid(4, 4, 128));
        store
    }

    #[test]
    fn writes_one_pdf_page_per_document_page() {
        let mut canvas = Canvas::new(Size::new(pt(100.0), pt(200.0)));
        let crop_a = SourceCrop { y_start: 0, y_end: 20 };
        let crop_b = SourceCrop { y_start: 20, y_end: 30 };
        canvas.draw_image(Rect::new(pt(5.0), pt(5.0), pt(90.0), pt(18.0)), "header", None);
        canvas.draw_image(Rect::new(pt(5.0), pt(23.0), pt(90.0), pt(180.0)), "report", Some(crop_a));
        canvas.show_page();
        canvas.draw_image(Rect::new(pt(5.0), pt(5.0), pt(90.0), pt(18.0)), "header", None);
        canvas.draw_image(Rect::new(pt(5.0), pt(23.0), pt(90.0), pt(90.0)), "report", Some(crop_b));
        canvas.show_page();
        let bytes = document_to_pdf(&canvas.finish(), &store()).expect("pdf");

        let loaded = LoDocument::load_mem(&bytes).expect("reload");
        let pages: Vec<_> = loaded.get_pages().into_values().collect();
        assert_eq!(pages.len(), 2);
        let first = String::from_utf8(loaded.get_page_content(pages[0]).expect("content"))
            .expect("utf8");
        // header: 200 - 5 - 18 = 177
        assert!(first.contains("q 90 0 0 18 5 177 cm /Im1 Do Q"));
        assert!(first.contains("/Im2 Do"));
        let second = String::from_utf8(loaded.get_page_content(pages[1]).expect("content"))
            .expect("utf8");
        // header reused, second slice gets its own XObject
        assert!(second.contains("/Im1 Do"));
        assert!(second.contains("/Im3 Do"));
    }

    #[test]
    fn translucent_bitmaps_get_a_soft_mask() {
        let mut canvas = Canvas::new(Size::new(pt(50.0), pt(50.0)));
        canvas.draw_image(Rect::new(pt(0.0), pt(0.0), pt(4.0), pt(4.0)), "stamp", None);
        canvas.show_page();
        let bytes = document_to_pdf(&canvas.finish(), &store()).expect("pdf");
        let loaded = LoDocument::load_mem(&bytes).expect("reload");
        let has_smask = loaded.objects.values().any(|obj| {
            obj.as_stream()
                .map(|s| s.dict.has(b"SMask"))
                .unwrap_or(false)
        });
        assert!(has_smask);
    }

    #[test]
    fn missing_bitmap_is_an_asset_error() {
        let mut canvas = Canvas::new(Size::new(pt(50.0), pt(50.0)));
        canvas.draw_image(Rect::new(pt(0.0), pt(0.0), pt(10.0), pt(10.0)), "photos", None);
        canvas.show_page();
        assert!(matches!(
            document_to_pdf(&canvas.finish(), &store()),
            Err(PageTileError::Asset(_))
        ));
    }

    #[test]
    fn crop_beyond_bitmap_is_an_asset_error() {
        let mut canvas = Canvas::new(Size::new(pt(50.0), pt(50.0)));
        let crop = SourceCrop { y_start: 20, y_end: 40 };
        canvas.draw_image(Rect::new(pt(0.0), pt(0.0), pt(10.0), pt(10.0)), "report", Some(crop));
        canvas.show_page();
        assert!(matches!(
            document_to_pdf(&canvas.finish(), &store()),
            Err(PageTileError::Asset(_))
        ));
    }

    #[test]
    fn zero_height_draws_are_skipped() {
        let mut canvas = Canvas::new(Size::new(pt(50.0), pt(50.0)));
        canvas.draw_image(Rect::new(pt(0.0), pt(0.0), pt(10.0), Pt::ZERO), "empty-notes", None);
        canvas.show_page();
        let bytes = document_to_pdf(&canvas.finish(), &ImageStore::new()).expect("pdf");
        let loaded = LoDocument::load_mem(&bytes).expect("reload");
        assert_eq!(loaded.get_pages().len(), 1);
    }

    #[test]
    fn store_collects_only_blocks_with_bitmaps() {
        use crate::raster::BlockRole;
        let with = RasterBlock::from_image("report", BlockRole::Content, RgbaImage::new(3, 3));
        let without = RasterBlock::dimensions_only("photos", BlockRole::Content, 3, 3);
        let store = ImageStore::from_blocks([&with, &without]);
        assert_eq!(store.len(), 1);
        assert!(store.get("report").is_some());
        assert!(store.get("photos").is_none());
    }
}
