use crate::types::{Rect, Size};

/// Source row range of a bitmap to show instead of the whole image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceCrop {
    pub y_start: u32,
    pub y_end: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Non-rendered metadata used for page-aware reporting. Ignored by the PDF writer.
    Meta {
        key: String,
        value: String,
    },
    DrawImage {
        rect: Rect,
        resource_id: String,
        crop: Option<SourceCrop>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub commands: Vec<Command>,
}

impl Page {
    fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Placements are still being added to the open page.
    Accumulating,
    /// The page is closed; the next drawing operation needs a new page.
    Sealed,
}

/// Records draw commands page by page. A page is opened with
/// [`Canvas::begin_page`] and closed with [`Canvas::show_page`]; drawing
/// while sealed opens a fresh page first, so commands never leak onto a
/// page that has already been handed off.
pub struct Canvas {
    page_size: Size,
    pages: Vec<Page>,
    current: Page,
    state: PageState,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            current: Page::new(),
            state: PageState::Sealed,
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn state(&self) -> PageState {
        self.state
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn begin_page(&mut self) {
        if self.state == PageState::Accumulating {
            self.show_page();
        }
        self.current = Page::new();
        self.state = PageState::Accumulating;
    }

    pub fn meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.ensure_open();
        self.current.commands.push(Command::Meta {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn draw_image(&mut self, rect: Rect, resource_id: &str, crop: Option<SourceCrop>) {
        self.ensure_open();
        self.current.commands.push(Command::DrawImage {
            rect,
            resource_id: resource_id.to_string(),
            crop,
        });
    }

    pub fn show_page(&mut self) {
        if self.state == PageState::Sealed {
            return;
        }
        let page = std::mem::replace(&mut self.current, Page::new());
        self.pages.push(page);
        self.state = PageState::Sealed;
    }

    pub fn current_command_count(&self) -> usize {
        match self.state {
            PageState::Accumulating => self.current.commands.len(),
            PageState::Sealed => 0,
        }
    }

    pub fn finish(mut self) -> Document {
        self.show_page();
        Document {
            page_size: self.page_size,
            pages: self.pages,
        }
    }

    fn ensure_open(&mut self) {
        if self.state == PageState::Sealed {
            self.begin_page();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Pt;

    fn rect() -> Rect {
        Rect::new(Pt::ZERO, Pt::ZERO, Pt::from_f32(10.0), Pt::from_f32(10.0))
    }

    #[test]
    fn pages_seal_in_order() {
        let mut canvas = Canvas::new(Size::a4());
        assert_eq!(canvas.state(), PageState::Sealed);
        canvas.begin_page();
        assert_eq!(canvas.state(), PageState::Accumulating);
        canvas.draw_image(rect(), "a", None);
        canvas.show_page();
        assert_eq!(canvas.state(), PageState::Sealed);
        canvas.begin_page();
        canvas.draw_image(rect(), "b", None);
        canvas.draw_image(rect(), "c", Some(SourceCrop { y_start: 0, y_end: 4 }));
        assert_eq!(canvas.current_command_count(), 2);
        let doc = canvas.finish();
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.pages[0].commands.len(), 1);
        assert_eq!(doc.pages[1].commands.len(), 2);
    }

    #[test]
    fn drawing_after_seal_opens_a_new_page() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.begin_page();
        canvas.show_page();
        canvas.show_page();
        assert_eq!(canvas.page_count(), 1);
        canvas.draw_image(rect(), "late", None);
        assert_eq!(canvas.state(), PageState::Accumulating);
        assert_eq!(canvas.finish().pages.len(), 2);
    }
}
