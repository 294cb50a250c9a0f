//! API endpoint URL builders
//!
//! `base_url` is the API root (for example `https://rankify.example/api`);
//! a trailing slash is tolerated.

use crate::record::ImportMode;

/// Page size used when listing categories
pub const CATEGORY_PAGE_LIMIT: usize = 500;

fn root(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

/// Build the bulk-create URL for `mode`.
///
/// `recalc` asks the backend to recompute aggregates after the insert and is
/// only set for the final batch of a job.
pub fn bulk_create_url(base_url: &str, mode: ImportMode, recalc: bool) -> String {
    format!(
        "{}/{}/bulk_create/?recalc={}",
        root(base_url),
        mode.resource(),
        u8::from(recalc)
    )
}

/// Build one page of the category list URL
pub fn categories_url(base_url: &str, limit: usize, offset: usize) -> String {
    format!("{}/categories/?limit={}&offset={}", root(base_url), limit, offset)
}
