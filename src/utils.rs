use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    // Kept as a string so `?page=abc` falls back to the first page instead of
    // failing the Query extractor.
    #[serde(default)]
    page: Option<String>,
}

impl PageParams {
    pub fn new(page: u64) -> Self {
        Self {
            page: Some(page.to_string()),
        }
    }

    /// Requested page number, 1-based. Missing, unparsable or zero means 1.
    pub fn requested(&self) -> u64 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse::<u64>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1)
    }
}

/// Where one page starts and how big it is, resolved against the total count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: u64,
    pub num_pages: u64,
    pub per_page: u64,
    pub total: u64,
}

impl PageWindow {
    /// Clamps the requested page into `1..=num_pages`; an empty listing still
    /// has one (empty) page.
    pub fn resolve(params: &PageParams, per_page: u64, total: u64) -> Self {
        let per_page = per_page.max(1);
        let num_pages = total.div_ceil(per_page).max(1);
        let page = params.requested().min(num_pages);
        Self {
            page,
            num_pages,
            per_page,
            total,
        }
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }

    pub fn offset(&self) -> i64 {
        ((self.page - 1) * self.per_page) as i64
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub num_pages: u64,
    pub total: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: PageWindow) -> Self {
        Self {
            items,
            page: window.page,
            num_pages: window.num_pages,
            total: window.total,
            has_next: window.page < window.num_pages,
            has_previous: window.page > 1,
        }
    }
}
