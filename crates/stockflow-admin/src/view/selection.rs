use std::collections::BTreeSet;

/// Ids marked for a bulk action. Select-all only ever covers the visible page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip one id. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    /// Clear when exactly the visible page is selected, otherwise select
    /// exactly the visible page.
    pub fn toggle_all(&mut self, visible: &[&str]) {
        if self.all_selected(visible) {
            self.ids.clear();
        } else {
            self.ids = visible.iter().map(|id| id.to_string()).collect();
        }
    }

    /// The selection equals the (non-empty) set of visible ids.
    pub fn all_selected(&self, visible: &[&str]) -> bool {
        !visible.is_empty()
            && self.ids.len() == visible.iter().collect::<BTreeSet<_>>().len()
            && visible.iter().all(|id| self.ids.contains(*id))
    }

    /// Drop ids that are not on the visible page. Returns how many were dropped.
    pub fn retain_visible(&mut self, visible: &[&str]) -> usize {
        self.retain(|id| visible.contains(&id))
    }

    /// Keep only ids for which `keep` holds. Returns how many were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let before = self.ids.len();
        self.ids.retain(|id| keep(id.as_str()));
        before - self.ids.len()
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.ids.remove(id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Selected ids in sorted order.
    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
