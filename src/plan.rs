use crate::canvas::{Canvas, Document, SourceCrop};
use crate::page_template::PageGeometry;
use crate::types::{Pt, Rect};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

/// Which part of a block's source bitmap a placement shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockFragment {
    Whole,
    /// Half-open source row range `[source_y_start, source_y_end)`.
    Slice {
        source_y_start: u32,
        source_y_end: u32,
    },
}

impl BlockFragment {
    /// Source rows covered, given the block's full pixel height.
    pub fn source_rows(self, pixel_height: u32) -> (u32, u32) {
        match self {
            BlockFragment::Whole => (0, pixel_height),
            BlockFragment::Slice {
                source_y_start,
                source_y_end,
            } => (source_y_start, source_y_end),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentPlacement {
    pub block_id: String,
    /// Position of the block in the composed input.
    pub block_index: usize,
    pub fragment: BlockFragment,
    pub rect: Rect,
}

/// Header or footer drawn identically on every page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecorationPlacement {
    pub block_id: String,
    pub rect: Rect,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlannedPage {
    pub page_number: usize,
    pub header: DecorationPlacement,
    pub footer: DecorationPlacement,
    pub content: Vec<ContentPlacement>,
}

impl PlannedPage {
    pub fn used_height(&self) -> Pt {
        self.content.iter().map(|p| p.rect.height).sum()
    }
}

/// Output of composition: one record per page, in print order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PagePlan {
    pub geometry: PageGeometry,
    pub header_height: Pt,
    pub footer_height: Pt,
    pub available_content_height: Pt,
    pub pages: Vec<PlannedPage>,
}

impl PagePlan {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All content placements with their zero-based page index, in reading order.
    pub fn placements(&self) -> impl Iterator<Item = (usize, &ContentPlacement)> {
        self.pages
            .iter()
            .enumerate()
            .flat_map(|(idx, page)| page.content.iter().map(move |p| (idx, p)))
    }

    pub fn placements_of<'a>(
        &'a self,
        block_id: &'a str,
    ) -> impl Iterator<Item = (usize, &'a ContentPlacement)> + 'a {
        self.placements().filter(move |(_, p)| p.block_id == block_id)
    }

    /// SHA-256 over a canonical dump of the plan. Equal plans hash equal.
    pub fn fingerprint(&self) -> String {
        let mut canon = String::new();
        let size = self.geometry.page_size();
        let margins = self.geometry.margins();
        let _ = writeln!(
            canon,
            "page {} {} margins {} {} header {} footer {} band {}",
            size.width,
            size.height,
            margins.x,
            margins.y,
            self.header_height,
            self.footer_height,
            self.available_content_height
        );
        for page in &self.pages {
            let _ = writeln!(
                canon,
                "p{} h={}@{} f={}@{}",
                page.page_number,
                page.header.block_id,
                fmt_rect(&page.header.rect),
                page.footer.block_id,
                fmt_rect(&page.footer.rect)
            );
            for placement in &page.content {
                let fragment = match placement.fragment {
                    BlockFragment::Whole => "whole".to_string(),
                    BlockFragment::Slice {
                        source_y_start,
                        source_y_end,
                    } => format!("{}..{}", source_y_start, source_y_end),
                };
                let _ = writeln!(
                    canon,
                    "  #{} {} {} @{}",
                    placement.block_index,
                    placement.block_id,
                    fragment,
                    fmt_rect(&placement.rect)
                );
            }
        }
        sha256_hex(canon.as_bytes())
    }

    /// Replays the plan as draw commands: header, content in order, footer,
    /// then seal, page after page.
    pub fn to_document(&self) -> Document {
        let mut canvas = Canvas::new(self.geometry.page_size());
        for page in &self.pages {
            canvas.begin_page();
            canvas.meta("page", page.page_number.to_string());
            canvas.draw_image(page.header.rect, &page.header.block_id, None);
            for placement in &page.content {
                let crop = match placement.fragment {
                    BlockFragment::Whole => None,
                    BlockFragment::Slice {
                        source_y_start,
                        source_y_end,
                    } => Some(SourceCrop {
                        y_start: source_y_start,
                        y_end: source_y_end,
                    }),
                };
                canvas.draw_image(placement.rect, &placement.block_id, crop);
            }
            canvas.draw_image(page.footer.rect, &page.footer.block_id, None);
            canvas.show_page();
        }
        canvas.finish()
    }
}

fn fmt_rect(rect: &Rect) -> String {
    format!("{},{},{},{}", rect.x, rect.y, rect.width, rect.height)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::types::{Margins, Size};

    fn pt(v: f32) -> Pt {
        Pt::from_f32(v)
    }

    fn sample_plan() -> PagePlan {
        let geometry = PageGeometry::new(Size::new(pt(200.0), pt(300.0)), Margins::all(10.0))
            .expect("geometry");
        let header = DecorationPlacement {
            block_id: "header".to_string(),
            rect: Rect::new(pt(10.0), pt(10.0), pt(180.0), pt(20.0)),
        };
        let footer = DecorationPlacement {
            block_id: "footer".to_string(),
            rect: Rect::new(Pt::ZERO, pt(280.0), pt(200.0), pt(20.0)),
        };
        let page = |number: usize, content: Vec<ContentPlacement>| PlannedPage {
            page_number: number,
            header: header.clone(),
            footer: footer.clone(),
            content,
        };
        PagePlan {
            geometry,
            header_height: pt(20.0),
            footer_height: pt(20.0),
            available_content_height: pt(240.0),
            pages: vec![
                page(
                    1,
                    vec![ContentPlacement {
                        block_id: "report".to_string(),
                        block_index: 0,
                        fragment: BlockFragment::Slice {
                            source_y_start: 0,
                            source_y_end: 240,
                        },
                        rect: Rect::new(pt(10.0), pt(30.0), pt(180.0), pt(240.0)),
                    }],
                ),
                page(
                    2,
                    vec![ContentPlacement {
                        block_id: "report".to_string(),
                        block_index: 0,
                        fragment: BlockFragment::Slice {
                            source_y_start: 240,
                            source_y_end: 300,
                        },
                        rect: Rect::new(pt(10.0), pt(30.0), pt(180.0), pt(60.0)),
                    }],
                ),
            ],
        }
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let plan = sample_plan();
        assert_eq!(plan.fingerprint(), sample_plan().fingerprint());
        assert_eq!(plan.fingerprint().len(), 64);

        let mut moved = sample_plan();
        moved.pages[1].content[0].rect.y = pt(31.0);
        assert_ne!(plan.fingerprint(), moved.fingerprint());
    }

    #[test]
    fn document_draws_header_content_footer_per_page() {
        let document = sample_plan().to_document();
        assert_eq!(document.pages.len(), 2);
        let ids: Vec<(&str, Option<SourceCrop>)> = document.pages[1]
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::DrawImage {
                    resource_id, crop, ..
                } => Some((resource_id.as_str(), *crop)),
                _ => None,
            })
            .collect();
        assert_eq!(
            ids,
            vec![
                ("header", None),
                (
                    "report",
                    Some(SourceCrop {
                        y_start: 240,
                        y_end: 300
                    })
                ),
                ("footer", None),
            ]
        );
    }

    #[test]
    fn placements_are_listed_in_reading_order() {
        let plan = sample_plan();
        let pages: Vec<usize> = plan.placements_of("report").map(|(idx, _)| idx).collect();
        assert_eq!(pages, vec![0, 1]);
        assert_eq!(plan.pages[0].used_height(), pt(240.0));
        assert_eq!(BlockFragment::Whole.source_rows(42), (0, 42));
    }
}
