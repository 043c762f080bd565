use crate::plan::{BlockFragment, PagePlan};
use crate::types::Pt;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetrics {
    pub page_number: usize,
    pub placement_count: usize,
    pub fragment_count: usize,
    pub used_height: Pt,
    /// Used height over available content height, 0..=1.
    pub fill_ratio: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetrics {
    pub pages: Vec<PageMetrics>,
    pub compose_ms: f64,
}

impl DocumentMetrics {
    pub fn from_plan(plan: &PagePlan, compose_ms: f64) -> Self {
        let available = plan.available_content_height.to_milli_i64();
        let pages = plan
            .pages
            .iter()
            .map(|page| {
                let used_height = page.used_height();
                let fill_ratio = if available > 0 {
                    (used_height.to_milli_i64() as f64 / available as f64).clamp(0.0, 1.0) as f32
                } else {
                    0.0
                };
                PageMetrics {
                    page_number: page.page_number,
                    placement_count: page.content.len(),
                    fragment_count: page
                        .content
                        .iter()
                        .filter(|p| matches!(p.fragment, BlockFragment::Slice { .. }))
                        .count(),
                    used_height,
                    fill_ratio,
                }
            })
            .collect();
        Self { pages, compose_ms }
    }

    pub fn total_placements(&self) -> usize {
        self.pages.iter().map(|p| p.placement_count).sum()
    }

    /// Unused band height summed over all pages but the last.
    pub fn blank_height_before_last_page(&self, available: Pt) -> Pt {
        let Some((_, head)) = self.pages.split_last() else {
            return Pt::ZERO;
        };
        head.iter()
            .map(|p| (available - p.used_height).max(Pt::ZERO))
            .sum()
    }
}
