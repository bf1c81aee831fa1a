//! Listing filters and paged results.

use serde::{Deserialize, Serialize};

/// First page number.
pub const FIRST_PAGE: u32 = 1;
/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;
/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Criteria for listing users.
///
/// `search` matches first name, last name or email, ignoring case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserFilter {
    pub search: Option<String>,
    pub is_active: Option<bool>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for UserFilter {
    fn default() -> Self {
        Self {
            search: None,
            is_active: None,
            page: FIRST_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl UserFilter {
    /// Search term with surrounding whitespace removed, if any remains.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    /// Number of rows preceding the requested page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(FIRST_PAGE)) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}
