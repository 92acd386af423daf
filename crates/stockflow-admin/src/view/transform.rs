//! Filter → sort → paginate, recomputed from scratch on every render.

use std::cmp::Ordering;

use super::params::ViewParams;
use crate::entity::Entity;
use crate::types::SortDirection;

/// One rendered page of a filtered, sorted collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<E> {
    pub items: Vec<E>,
    /// Clamped 1-based page actually shown.
    pub page: usize,
    /// Always at least 1, even when there are no matches.
    pub page_count: usize,
    pub page_size: usize,
    /// Records matching the search and facets.
    pub total: usize,
    /// 1-based index of the first item shown, 0 when empty.
    pub first: usize,
    /// 1-based index of the last item shown, 0 when empty.
    pub last: usize,
}

impl<E> Page<E> {
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.page_count
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<E: Entity> Page<E> {
    pub fn ids(&self) -> Vec<&str> {
        self.items.iter().map(Entity::id).collect()
    }
}

/// Compute the visible page of `records` for `params`.
pub fn apply<E: Entity>(records: &[E], params: &ViewParams<E::SortColumn>) -> Page<E> {
    let mut matched = filter(records, params);
    if let Some((column, direction)) = params.sort {
        sort(&mut matched, column, direction);
    }

    let total = matched.len();
    let page_size = params.page_size.max(1);
    let page_count = page_count(total, page_size);
    let page = clamp_page(params.page, page_count);
    let window = paginate(&matched, page, page_size);

    let first = if window.is_empty() { 0 } else { (page - 1) * page_size + 1 };
    Page {
        items: window.iter().map(|r| (*r).clone()).collect(),
        page,
        page_count,
        page_size,
        total,
        first,
        last: if window.is_empty() { 0 } else { first + window.len() - 1 },
    }
}

/// Records whose searchable fields contain the trimmed, case-folded search
/// text and whose facets equal every active facet filter. Input order is kept.
pub fn filter<'a, E: Entity>(records: &'a [E], params: &ViewParams<E::SortColumn>) -> Vec<&'a E> {
    let needle = params.search.trim().to_lowercase();
    records
        .iter()
        .filter(|r| matches_search(*r, &needle))
        .filter(|r| {
            params
                .facets
                .iter()
                .all(|(field, value)| r.facet(field) == Some(value.as_str()))
        })
        .collect()
}

/// Literal substring match; `needle` must already be trimmed and lower-cased.
pub fn matches_search<E: Entity>(record: &E, needle: &str) -> bool {
    needle.is_empty()
        || record
            .search_fields()
            .iter()
            .any(|field| field.to_lowercase().contains(needle))
}

/// Stable sort by one column.
pub fn sort<E: Entity>(records: &mut [&E], column: E::SortColumn, direction: SortDirection) {
    records.sort_by(|a, b| {
        direction.apply(locale_compare(&a.sort_value(column), &b.sort_value(column)))
    });
}

pub fn page_count(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1)).max(1)
}

/// Clamp a requested page into `1..=page_count`.
pub fn clamp_page(page: usize, page_count: usize) -> usize {
    page.clamp(1, page_count.max(1))
}

/// The `page`-th window of `page_size` items (1-based); empty past the end.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    let page_size = page_size.max(1);
    let start = page.saturating_sub(1).saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = (start + page_size).min(items.len());
    &items[start..end]
}

// ============================================================================
// Collation
// ============================================================================

/// Locale-style string ordering.
///
/// Primary: letters compared without case or accents ("é" == "e", "B" == "b").
/// Ties are broken by accents (unaccented first), then case (lower first),
/// then code points, so distinct strings never compare equal.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    let primary = a
        .chars()
        .map(|c| fold(c).0)
        .cmp(b.chars().map(|c| fold(c).0));
    primary
        .then_with(|| {
            a.chars()
                .map(|c| fold(c).1)
                .cmp(b.chars().map(|c| fold(c).1))
        })
        .then_with(|| {
            a.chars()
                .map(char::is_uppercase)
                .cmp(b.chars().map(char::is_uppercase))
        })
        .then_with(|| a.cmp(b))
}

/// (base letter, accented?) for one character.
fn fold(c: char) -> (char, bool) {
    let lower = c.to_lowercase().next().unwrap_or(c);
    let base = match lower {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => return (other, false),
    };
    (base, true)
}
