//! List screens: one store, one cache lease, one live listener, the view
//! parameters and the selection, wired together the way every back-office
//! list page uses them.

mod context;

pub use context::AdminContext;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::cache::CacheLease;
use crate::config::AdminConfig;
use crate::entity::onboarding::{OnboardingResponse, OnboardingStats};
use crate::entity::Entity;
use crate::error::{AdminError, MutationKind, Result};
use crate::live::LiveInvalidation;
use crate::notify::ToastQueue;
use crate::store::CollectionStore;
use crate::types::SortDirection;
use crate::view::{self, Page, Selection, ViewParams};

// ============================================================================
// ScreenState
// ============================================================================

/// Everything a list page needs to draw itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenState<E> {
    pub page: Page<E>,
    /// No data yet and a fetch is running.
    pub is_loading: bool,
    /// A fetch is running (initial or background).
    pub is_fetching: bool,
    /// Last fetch failure, kept until a fetch succeeds.
    pub error: Option<AdminError>,
    pub selected: Vec<String>,
    /// Every visible row is selected (false on an empty page).
    pub all_selected: bool,
}

impl<E> ScreenState<E> {
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(AdminError::user_message)
    }

    /// "Showing 13-15 of 15".
    pub fn summary(&self) -> String {
        format!(
            "Showing {}-{} of {}",
            self.page.first, self.page.last, self.page.total
        )
    }
}

// ============================================================================
// DeleteConfirmation
// ============================================================================

/// A pending delete awaiting the user's confirmation.
///
/// Only obtainable from [`CollectionScreen::request_delete`] or
/// [`CollectionScreen::request_delete_selected`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfirmation {
    ids: Vec<String>,
    prompt: String,
}

impl DeleteConfirmation {
    fn new(ids: Vec<String>, label: &str) -> Self {
        let prompt = match ids.len() {
            1 => format!("Are you sure you want to delete this {label}?"),
            n => format!("Are you sure you want to delete {n} {label}s?"),
        };
        Self { ids, prompt }
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }
}

// ============================================================================
// CollectionScreen
// ============================================================================

pub struct CollectionScreen<E: Entity> {
    store: CollectionStore<E>,
    live: LiveInvalidation<E>,
    params: ViewParams<E::SortColumn>,
    selection: Selection,
    toasts: Arc<ToastQueue>,
    page_sizes: Vec<usize>,
    _lease: CacheLease,
}

impl<E: Entity> CollectionScreen<E> {
    pub(crate) fn mount(
        store: CollectionStore<E>,
        notifier: &dyn crate::remote::ChangeNotifier,
        config: &AdminConfig,
        toasts: Arc<ToastQueue>,
    ) -> Self {
        let lease = store.cache().lease(store.key());
        let mut live = LiveInvalidation::attach(store.clone(), notifier);
        if let Some(every) = config.refetch_interval {
            live = live.with_refetch_interval(every);
        }
        debug!(table = E::TABLE, key = %lease.key(), "screen mounted");

        Self {
            store,
            live,
            params: ViewParams::new(config.default_page_size),
            selection: Selection::new(),
            toasts,
            page_sizes: config.page_size_options.clone(),
            _lease: lease,
        }
    }

    /// Also refetch every `every` while mounted, regardless of configuration.
    pub fn with_refetch_interval(mut self, every: Duration) -> Self {
        self.live = self.live.with_refetch_interval(every);
        self
    }

    pub fn store(&self) -> &CollectionStore<E> {
        &self.store
    }

    pub fn params(&self) -> &ViewParams<E::SortColumn> {
        &self.params
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn page_sizes(&self) -> &[usize] {
        &self.page_sizes
    }

    pub fn is_live(&self) -> bool {
        self.live.is_active()
    }

    // -----------------------------------------------------------------------
    // Loading and rendering
    // -----------------------------------------------------------------------

    /// Load the collection unless the cached copy is still fresh. A failure is
    /// kept on the cache entry and shown by [`render`](Self::render).
    pub async fn load(&self) -> Result<()> {
        self.store.ensure_loaded().await.map(|_| ()).map_err(|err| {
            warn!(table = E::TABLE, error = %err, "load failed");
            err
        })
    }

    /// Refetch regardless of freshness (the refresh button).
    pub async fn refresh(&self) -> Result<()> {
        self.store.invalidate().await.map(|_| ())
    }

    /// Recompute the visible page. Stores the clamped page number and drops
    /// selected ids that are no longer visible.
    pub fn render(&mut self) -> ScreenState<E> {
        let snapshot = self.store.snapshot();
        let page = view::apply(snapshot.records(), &self.params);
        self.params.page = page.page;

        let ids = page.ids();
        let pruned = self.selection.retain_visible(&ids);
        if pruned > 0 {
            debug!(table = E::TABLE, pruned, "selection pruned to visible page");
        }
        let all_selected = self.selection.all_selected(&ids);

        ScreenState {
            is_loading: snapshot.is_loading(),
            is_fetching: snapshot.is_fetching,
            error: snapshot.error,
            selected: self.selection.ids(),
            all_selected,
            page,
        }
    }

    /// Distinct non-empty values of a facet across the loaded collection,
    /// sorted, for a filter dropdown.
    pub fn facet_values(&self, field: &str) -> Vec<String> {
        let snapshot = self.store.snapshot();
        let values: BTreeSet<&str> = snapshot
            .records()
            .iter()
            .filter_map(|r| r.facet(field))
            .filter(|v| !v.is_empty())
            .collect();
        values.into_iter().map(str::to_string).collect()
    }

    // -----------------------------------------------------------------------
    // View parameters
    // -----------------------------------------------------------------------

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.params.set_search(search);
    }

    pub fn toggle_sort(&mut self, column: E::SortColumn) {
        self.params.toggle_sort(column);
    }

    pub fn set_sort(&mut self, column: E::SortColumn, direction: SortDirection) {
        self.params.set_sort(column, direction);
    }

    pub fn set_page(&mut self, page: usize) {
        self.params.set_page(page);
    }

    pub fn next_page(&mut self) {
        self.params.next_page();
    }

    pub fn prev_page(&mut self) {
        self.params.prev_page();
    }

    /// Switch page size and go back to page 1. Sizes not offered by the
    /// configuration are ignored; returns whether the size was applied.
    pub fn set_page_size(&mut self, page_size: usize) -> bool {
        if !self.page_sizes.contains(&page_size) {
            warn!(table = E::TABLE, page_size, "page size not offered");
            return false;
        }
        self.params.set_page_size(page_size);
        true
    }

    pub fn set_facet(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.params.set_facet(field, value);
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Flip one id. Only ids on the visible page can be selected; an id that
    /// is already selected can always be cleared.
    pub fn toggle(&mut self, id: &str) -> bool {
        if !self.selection.contains(id) {
            let page = view::apply(self.store.snapshot().records(), &self.params);
            if !page.ids().contains(&id) {
                debug!(table = E::TABLE, id, "ignoring selection of a row that is not shown");
                return false;
            }
        }
        self.selection.toggle(id)
    }

    /// Select or clear the whole visible page.
    pub fn toggle_all(&mut self) {
        let page = view::apply(self.store.snapshot().records(), &self.params);
        self.selection.toggle_all(&page.ids());
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    pub async fn create(&self, draft: E::Draft) -> Option<E> {
        let outcome = self.store.create(draft).await;
        self.report(MutationKind::Create, outcome)
    }

    pub async fn update(&self, id: &str, patch: E::Patch) -> Option<E> {
        let outcome = self.store.update(id, patch).await;
        self.report(MutationKind::Update, outcome)
    }

    pub fn request_delete(&self, id: &str) -> DeleteConfirmation {
        DeleteConfirmation::new(vec![id.to_string()], E::LABEL)
    }

    /// Ask to delete every selected record; `None` when nothing is selected.
    /// Ids whose rows have left the collection since the last render are
    /// dropped first.
    pub fn request_delete_selected(&mut self) -> Option<DeleteConfirmation> {
        self.prune_to_loaded();
        if self.selection.is_empty() {
            return None;
        }
        Some(DeleteConfirmation::new(self.selection.ids(), E::LABEL))
    }

    /// Carry out a confirmed delete. Records are deleted one at a time; each
    /// failure gets its own error toast. Returns how many were deleted.
    /// Ids that are no longer in the loaded collection are skipped.
    pub async fn confirm_delete(&mut self, confirmation: DeleteConfirmation) -> usize {
        let loaded = self.prune_to_loaded();
        let mut deleted = 0;
        for id in &confirmation.ids {
            if loaded.as_ref().is_some_and(|ids| !ids.contains(id)) {
                debug!(table = E::TABLE, id = %id, "skipping delete of a row already gone");
                continue;
            }
            let selection = &mut self.selection;
            let outcome = self
                .store
                .delete_with(id, |id| {
                    selection.remove(id);
                })
                .await;
            match outcome {
                Ok(()) => deleted += 1,
                Err(err) => {
                    warn!(table = E::TABLE, id = %id, error = %err, "delete failed");
                    let message = failure_message(MutationKind::Delete, E::LABEL, &err);
                    self.toasts.error(message, Instant::now());
                }
            }
        }

        if deleted > 0 {
            let message = match deleted {
                1 => format!("{} successfully deleted!", capitalize(E::LABEL)),
                n => format!("{n} {}s successfully deleted!", E::LABEL),
            };
            info!(table = E::TABLE, deleted, "delete confirmed");
            self.toasts.success(message, Instant::now());
        }
        deleted
    }

    /// Drop selected ids that are not in the loaded collection. Returns the
    /// loaded ids, or `None` before the first successful fetch.
    fn prune_to_loaded(&mut self) -> Option<BTreeSet<String>> {
        let data = self.store.snapshot().data?;
        let loaded: BTreeSet<String> = data.iter().map(|r| r.id().to_string()).collect();
        let pruned = self.selection.retain(|id| loaded.contains(id));
        if pruned > 0 {
            debug!(table = E::TABLE, pruned, "selection pruned to loaded rows");
        }
        Some(loaded)
    }

    fn report(&self, op: MutationKind, outcome: Result<E>) -> Option<E> {
        match outcome {
            Ok(record) => {
                let verb = match op {
                    MutationKind::Create => "added",
                    MutationKind::Update => "updated",
                    MutationKind::Delete => "deleted",
                };
                self.toasts.success(
                    format!("{} successfully {verb}!", capitalize(E::LABEL)),
                    Instant::now(),
                );
                Some(record)
            }
            Err(err) => {
                warn!(table = E::TABLE, %op, error = %err, "mutation failed");
                self.toasts
                    .error(failure_message(op, E::LABEL, &err), Instant::now());
                None
            }
        }
    }
}

impl CollectionScreen<OnboardingResponse> {
    /// Dashboard counters over the loaded responses.
    pub fn stats(&self, now: chrono::DateTime<chrono::Utc>) -> OnboardingStats {
        OnboardingStats::compute(self.store.snapshot().records(), now)
    }
}

impl<E: Entity> std::fmt::Debug for CollectionScreen<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionScreen")
            .field("table", &E::TABLE)
            .field("params", &self.params)
            .field("selection", &self.selection)
            .finish()
    }
}

/// Toast text for a failed mutation. Remote failures are prefixed with what
/// was being attempted; local failures (sign-in, validation, blocked delete)
/// are shown as they are.
fn failure_message(op: MutationKind, label: &str, err: &AdminError) -> String {
    match err {
        AdminError::RemoteMutation { source, .. } | AdminError::RemoteFetch { source, .. } => {
            let doing = match op {
                MutationKind::Create => "adding",
                MutationKind::Update => "updating",
                MutationKind::Delete => "deleting",
            };
            format!("Error {doing} {label}: {}", source.message)
        }
        other => other.user_message(),
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
