use std::collections::BTreeMap;

use crate::entity::SortColumn;
use crate::types::SortDirection;

/// Facet value meaning "no filter" (the "All" entry of a dropdown).
pub const ALL: &str = "all";

/// UI-owned list state: search text, sort, page and facet filters.
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewParams<C> {
    pub search: String,
    pub sort: Option<(C, SortDirection)>,
    /// 1-based. May point past the last page; the transform clamps it.
    pub page: usize,
    pub page_size: usize,
    /// Equality filters by facet name.
    pub facets: BTreeMap<String, String>,
}

impl<C: SortColumn> ViewParams<C> {
    pub fn new(page_size: usize) -> Self {
        Self {
            search: String::new(),
            sort: None,
            page: 1,
            page_size: page_size.max(1),
            facets: BTreeMap::new(),
        }
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    /// Clicking a column header: the active column flips direction, any other
    /// column becomes active ascending.
    pub fn toggle_sort(&mut self, column: C) {
        self.sort = Some(match self.sort {
            Some((current, direction)) if current == column => (column, direction.flipped()),
            _ => (column, SortDirection::Asc),
        });
    }

    pub fn set_sort(&mut self, column: C, direction: SortDirection) {
        self.sort = Some((column, direction));
    }

    /// Back to server order.
    pub fn clear_sort(&mut self) {
        self.sort = None;
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    pub fn next_page(&mut self) {
        self.page += 1;
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }

    /// Changing the page size starts over at page 1.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page = 1;
    }

    /// Set an equality filter; [`ALL`] or an empty value removes it.
    pub fn set_facet(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let field = field.into();
        let value = value.into();
        if value.is_empty() || value == ALL {
            self.facets.remove(&field);
        } else {
            self.facets.insert(field, value);
        }
    }

    /// Current value of a facet, [`ALL`] when unset.
    pub fn facet(&self, field: &str) -> &str {
        self.facets.get(field).map_or(ALL, String::as_str)
    }
}
