//! Tests for `ViewParams` state transitions.

use stockflow_admin::entity::supplier::SupplierColumn;
use stockflow_admin::types::SortDirection;
use stockflow_admin::view::{ViewParams, ALL};

#[test]
fn starts_on_page_one_without_sort_or_filters() {
    let p: ViewParams<SupplierColumn> = ViewParams::new(12);
    assert_eq!(p.page, 1);
    assert_eq!(p.page_size, 12);
    assert!(p.sort.is_none());
    assert!(p.search.is_empty());
    assert_eq!(p.facet("group"), ALL);
}

#[test]
fn toggling_another_column_starts_ascending() {
    let mut p = ViewParams::new(12);
    p.toggle_sort(SupplierColumn::Name);
    p.toggle_sort(SupplierColumn::Name);
    assert_eq!(p.sort, Some((SupplierColumn::Name, SortDirection::Desc)));

    p.toggle_sort(SupplierColumn::Email);
    assert_eq!(p.sort, Some((SupplierColumn::Email, SortDirection::Asc)));

    p.clear_sort();
    assert!(p.sort.is_none());
}

#[test]
fn page_size_change_returns_to_page_one() {
    let mut p: ViewParams<SupplierColumn> = ViewParams::new(12);
    p.set_page(4);
    p.set_page_size(24);
    assert_eq!(p.page, 1);
    assert_eq!(p.page_size, 24);
}

#[test]
fn page_never_drops_below_one() {
    let mut p: ViewParams<SupplierColumn> = ViewParams::new(12);
    p.prev_page();
    assert_eq!(p.page, 1);
    p.set_page(0);
    assert_eq!(p.page, 1);
    p.next_page();
    p.next_page();
    assert_eq!(p.page, 3);
}

#[test]
fn empty_facet_value_clears_the_filter() {
    let mut p: ViewParams<SupplierColumn> = ViewParams::new(12);
    p.set_facet("group", "wholesale");
    assert_eq!(p.facet("group"), "wholesale");
    p.set_facet("group", "");
    assert_eq!(p.facet("group"), ALL);
    assert!(p.facets.is_empty());
}
