//! API request and response types
//!
//! Matches the backend API structure.

use serde::{Deserialize, Serialize};

use crate::record::{CategoryId, NormalizedRecord};

/// Body of a bulk-create request
#[derive(Debug, Clone, Serialize)]
pub struct BulkCreateRequest<'a> {
    pub items: &'a [NormalizedRecord],
}

/// Response from a bulk-create endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkCreateResponse {
    /// Records created; absent on some backends, meaning "all of them"
    #[serde(default)]
    pub created: Option<u64>,
}

/// A directory category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub full_slug: Option<String>,
}

impl Category {
    /// Case-insensitive match on name, slug or full slug
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim();
        self.name.eq_ignore_ascii_case(needle)
            || self.slug.as_deref().is_some_and(|s| s.eq_ignore_ascii_case(needle))
            || self
                .full_slug
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(needle))
    }
}

/// Category list, either plain or paginated
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryList {
    Paginated { results: Vec<Category> },
    Plain(Vec<Category>),
}

impl CategoryList {
    pub fn into_vec(self) -> Vec<Category> {
        match self {
            Self::Paginated { results } => results,
            Self::Plain(categories) => categories,
        }
    }
}
