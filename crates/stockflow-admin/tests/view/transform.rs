//! Tests for the filter → sort → paginate transform.

use serde_json::json;
use stockflow_admin::entity::supplier::SupplierColumn;
use stockflow_admin::entity::Supplier;
use stockflow_admin::types::SortDirection;
use stockflow_admin::view::{apply, ViewParams};

// ============================================================================
// Helpers
// ============================================================================

fn supplier(id: &str, name: &str, company: Option<&str>, municipality: Option<&str>) -> Supplier {
    serde_json::from_value(json!({
        "id": id,
        "name": name,
        "company": company,
        "municipality": municipality,
    }))
    .unwrap()
}

fn numbered(count: usize) -> Vec<Supplier> {
    (1..=count)
        .map(|i| supplier(&format!("s-{i:02}"), &format!("Supplier {i:02}"), None, None))
        .collect()
}

fn names(items: &[Supplier]) -> Vec<&str> {
    items.iter().map(|s| s.name.as_str()).collect()
}

fn params() -> ViewParams<SupplierColumn> {
    ViewParams::new(12)
}

// ============================================================================
// Pagination
// ============================================================================

#[test]
fn second_page_of_fifteen_shows_the_last_three() {
    let records = numbered(15);
    let mut p = params();
    p.set_page(2);

    let page = apply(&records, &p);

    assert_eq!(names(&page.items), vec!["Supplier 13", "Supplier 14", "Supplier 15"]);
    assert_eq!(page.page, 2);
    assert_eq!(page.page_count, 2);
    assert_eq!(page.total, 15);
    assert_eq!((page.first, page.last), (13, 15));
    assert!(page.has_prev());
    assert!(!page.has_next());
}

#[test]
fn page_past_the_end_is_clamped_to_the_last_page() {
    let records = numbered(15);
    let mut p = params();
    p.set_page(7);

    let page = apply(&records, &p);

    assert_eq!(page.page, 2);
    assert_eq!(page.items.len(), 3);
}

#[test]
fn empty_collection_renders_page_one_of_one() {
    let page = apply::<Supplier>(&[], &params());

    assert_eq!(page.page, 1);
    assert_eq!(page.page_count, 1);
    assert!(page.is_empty());
    assert_eq!((page.first, page.last), (0, 0));
}

#[test]
fn exact_multiple_of_page_size_has_no_trailing_empty_page() {
    let records = numbered(24);
    let page = apply(&records, &params());
    assert_eq!(page.page_count, 2);
}

// ============================================================================
// Search and facets
// ============================================================================

#[test]
fn search_is_trimmed_case_insensitive_and_covers_all_search_fields() {
    let records = vec![
        supplier("1", "Acme Corp", None, None),
        supplier("2", "Bolt & Co", Some("ACME Holdings"), None),
        supplier("3", "Cobalt", None, Some("Acmeville")),
        supplier("4", "Delta", None, None),
    ];
    let mut p = params();
    p.set_search("  acme ");

    let page = apply(&records, &p);

    assert_eq!(names(&page.items), vec!["Acme Corp", "Bolt & Co", "Cobalt"]);
    assert_eq!(page.total, 3);
}

#[test]
fn search_is_a_literal_substring_match() {
    let records = vec![supplier("1", "A.B", None, None), supplier("2", "AxB", None, None)];
    let mut p = params();
    p.set_search("a.b");

    assert_eq!(names(&apply(&records, &p).items), vec!["A.B"]);
}

#[test]
fn search_does_not_reset_the_page() {
    let records = numbered(30);
    let mut p = params();
    p.set_page(3);
    p.set_search("supplier");

    assert_eq!(apply(&records, &p).page, 3);
}

#[test]
fn facet_filters_match_exactly_and_all_clears_them() {
    let records = vec![
        supplier("1", "A", None, Some("Gent")),
        supplier("2", "B", None, Some("Gentbrugge")),
        supplier("3", "C", None, None),
    ];
    let mut p = params();

    p.set_facet("municipality", "Gent");
    assert_eq!(names(&apply(&records, &p).items), vec!["A"]);

    p.set_facet("municipality", "all");
    assert_eq!(apply(&records, &p).total, 3);
}

// ============================================================================
// Sorting
// ============================================================================

#[test]
fn no_sort_keeps_server_order() {
    let records = vec![
        supplier("1", "Zulu", None, None),
        supplier("2", "alpha", None, None),
    ];
    assert_eq!(names(&apply(&records, &params()).items), vec!["Zulu", "alpha"]);
}

#[test]
fn sorting_uses_locale_order_and_toggles_direction() {
    let records = vec![
        supplier("1", "beta", None, None),
        supplier("2", "Alpha", None, None),
        supplier("3", "Émile", None, None),
        supplier("4", "delta", None, None),
    ];
    let mut p = params();

    p.toggle_sort(SupplierColumn::Name);
    assert_eq!(
        names(&apply(&records, &p).items),
        vec!["Alpha", "beta", "delta", "Émile"]
    );

    p.toggle_sort(SupplierColumn::Name);
    assert_eq!(p.sort, Some((SupplierColumn::Name, SortDirection::Desc)));
    assert_eq!(
        names(&apply(&records, &p).items),
        vec!["Émile", "delta", "beta", "Alpha"]
    );
}

#[test]
fn missing_values_sort_as_empty_text() {
    let records = vec![
        supplier("1", "A", Some("Zeta"), None),
        supplier("2", "B", None, None),
        supplier("3", "C", Some("Alpha"), None),
    ];
    let mut p = params();
    p.set_sort(SupplierColumn::Company, SortDirection::Asc);

    assert_eq!(names(&apply(&records, &p).items), vec!["B", "C", "A"]);
}

#[test]
fn sort_is_stable_for_equal_keys() {
    let records = vec![
        supplier("1", "First", Some("Same"), None),
        supplier("2", "Second", Some("Same"), None),
        supplier("3", "Third", Some("Same"), None),
    ];
    let mut p = params();
    p.set_sort(SupplierColumn::Company, SortDirection::Desc);

    assert_eq!(
        names(&apply(&records, &p).items),
        vec!["First", "Second", "Third"]
    );
}

#[test]
fn sort_applies_before_pagination() {
    let records = numbered(15);
    let mut p = params();
    p.set_sort(SupplierColumn::Name, SortDirection::Desc);

    let first = apply(&records, &p);
    assert_eq!(first.items[0].name, "Supplier 15");

    p.next_page();
    let second = apply(&records, &p);
    assert_eq!(names(&second.items), vec!["Supplier 03", "Supplier 02", "Supplier 01"]);
}
