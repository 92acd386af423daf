//! Tests for page-scoped `Selection`.

use stockflow_admin::view::Selection;

fn page(range: std::ops::RangeInclusive<usize>) -> Vec<String> {
    range.map(|i| format!("s-{i}")).collect()
}

fn refs(ids: &[String]) -> Vec<&str> {
    ids.iter().map(String::as_str).collect()
}

#[test]
fn toggle_flips_membership() {
    let mut sel = Selection::new();
    assert!(sel.toggle("a"));
    assert!(sel.contains("a"));
    assert!(!sel.toggle("a"));
    assert!(sel.is_empty());
}

#[test]
fn toggle_all_selects_only_the_visible_page() {
    // 20 records, page of 5 visible.
    let visible = page(6..=10);
    let visible = refs(&visible);
    let mut sel = Selection::new();
    sel.toggle("s-1");

    sel.toggle_all(&visible);

    assert_eq!(sel.len(), 5);
    assert_eq!(sel.ids(), vec!["s-10", "s-6", "s-7", "s-8", "s-9"]);
    assert!(sel.all_selected(&visible));

    sel.toggle_all(&visible);
    assert!(sel.is_empty());
}

#[test]
fn partially_selected_page_is_not_all_selected() {
    let visible = page(1..=3);
    let visible = refs(&visible);
    let mut sel = Selection::new();
    sel.toggle("s-1");
    sel.toggle("s-2");

    assert!(!sel.all_selected(&visible));
    sel.toggle_all(&visible);
    assert_eq!(sel.len(), 3);
}

#[test]
fn empty_page_is_never_all_selected() {
    let sel = Selection::new();
    assert!(!sel.all_selected(&[]));
}

#[test]
fn retain_visible_drops_ids_off_the_page() {
    let mut sel = Selection::new();
    for id in ["s-1", "s-2", "s-13"] {
        sel.toggle(id);
    }

    let dropped = sel.retain_visible(&["s-13", "s-14", "s-15"]);

    assert_eq!(dropped, 2);
    assert_eq!(sel.ids(), vec!["s-13"]);
}
