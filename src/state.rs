//! Client-side UI state shared between sibling views.
//!
//! `UiStore` holds the current filter criteria for the leads and campaigns
//! views, the lead under inspection, and two layout flags. It never performs
//! I/O and no setter can fail. Views subscribe to it to learn that their
//! query key changed.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::error::DashboardError;

/// Filter criteria for the leads table.
///
/// `status` is kept as the raw tag the caller supplied; an unknown tag is
/// passed through to the query and simply matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadFilters {
    pub status: Option<String>,
    pub search: String,
    pub campaign: Option<String>,
}

/// Filter criteria for the campaigns table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignFilters {
    pub status: Option<String>,
    pub search: String,
}

/// Partial update for [`LeadFilters`].
///
/// A `None` field is left untouched. For the optional filters, `Some(None)`
/// clears the filter and `Some(Some(v))` sets it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadFiltersPatch {
    pub status: Option<Option<String>>,
    pub search: Option<String>,
    pub campaign: Option<Option<String>>,
}

impl LeadFiltersPatch {
    pub fn status(mut self, status: Option<&str>) -> Self {
        self.status = Some(status.map(str::to_string));
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn campaign(mut self, campaign: Option<&str>) -> Self {
        self.campaign = Some(campaign.map(str::to_string));
        self
    }

    fn apply(self, filters: &mut LeadFilters) {
        if let Some(status) = self.status {
            filters.status = status;
        }
        if let Some(search) = self.search {
            filters.search = search;
        }
        if let Some(campaign) = self.campaign {
            filters.campaign = campaign;
        }
    }
}

/// Partial update for [`CampaignFilters`]. Same merge rules as
/// [`LeadFiltersPatch`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignFiltersPatch {
    pub status: Option<Option<String>>,
    pub search: Option<String>,
}

impl CampaignFiltersPatch {
    pub fn status(mut self, status: Option<&str>) -> Self {
        self.status = Some(status.map(str::to_string));
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    fn apply(self, filters: &mut CampaignFilters) {
        if let Some(status) = self.status {
            filters.status = status;
        }
        if let Some(search) = self.search {
            filters.search = search;
        }
    }
}

/// Snapshot of everything the store holds.
///
/// `selected_lead` and `lead_sheet_open` are independent: the sheet may be
/// open with nothing selected and a lead may stay selected after the sheet
/// closes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiState {
    pub sidebar_collapsed: bool,
    pub selected_lead: Option<String>,
    pub lead_sheet_open: bool,
    pub campaign_filters: CampaignFilters,
    pub lead_filters: LeadFilters,
}

/// Which part of the state a write touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiChange {
    SidebarCollapsed,
    SelectedLead,
    LeadSheetOpen,
    CampaignFilters,
    LeadFilters,
    /// Whole state replaced by `restore`.
    Restored,
}

pub type Listener = Arc<dyn Fn(&UiState, UiChange) + Send + Sync>;

/// Handle returned by [`UiStore::subscribe`]; pass it to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

#[derive(Default)]
struct Notifications {
    queue: VecDeque<(UiState, UiChange)>,
    draining: bool,
}

/// Observable container for [`UiState`].
///
/// Every setter is synchronous. Listeners run after the state lock is
/// released, in subscription order, so they may read or write the store.
/// A write made from inside a listener is delivered once the current round
/// of listeners has finished, so every listener sees writes in order and
/// the last state it is handed is the store's current state.
pub struct UiStore {
    state: RwLock<UiState>,
    listeners: Mutex<Vec<(Subscription, Listener)>>,
    notifications: Mutex<Notifications>,
    next_id: AtomicU64,
}

impl UiStore {
    pub fn new() -> Self {
        Self::with_state(UiState::default())
    }

    pub fn with_state(state: UiState) -> Self {
        Self {
            state: RwLock::new(state),
            listeners: Mutex::new(Vec::new()),
            notifications: Mutex::new(Notifications::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Current state, cloned.
    pub fn state(&self) -> UiState {
        self.state.read().clone()
    }

    pub fn lead_filters(&self) -> LeadFilters {
        self.state.read().lead_filters.clone()
    }

    pub fn campaign_filters(&self) -> CampaignFilters {
        self.state.read().campaign_filters.clone()
    }

    pub fn selected_lead(&self) -> Option<String> {
        self.state.read().selected_lead.clone()
    }

    pub fn lead_sheet_open(&self) -> bool {
        self.state.read().lead_sheet_open
    }

    pub fn sidebar_collapsed(&self) -> bool {
        self.state.read().sidebar_collapsed
    }

    pub fn set_sidebar_collapsed(&self, collapsed: bool) {
        self.update(UiChange::SidebarCollapsed, |s| s.sidebar_collapsed = collapsed);
    }

    pub fn set_selected_lead(&self, lead_id: Option<String>) {
        self.update(UiChange::SelectedLead, |s| s.selected_lead = lead_id);
    }

    pub fn set_lead_sheet_open(&self, open: bool) {
        self.update(UiChange::LeadSheetOpen, |s| s.lead_sheet_open = open);
    }

    pub fn set_campaign_filters(&self, patch: CampaignFiltersPatch) {
        self.update(UiChange::CampaignFilters, |s| {
            patch.apply(&mut s.campaign_filters)
        });
    }

    pub fn set_lead_filters(&self, patch: LeadFiltersPatch) {
        self.update(UiChange::LeadFilters, |s| patch.apply(&mut s.lead_filters));
    }

    /// Select a lead and open its detail sheet.
    pub fn open_lead(&self, lead_id: &str) {
        self.set_selected_lead(Some(lead_id.to_string()));
        self.set_lead_sheet_open(true);
    }

    /// Close the detail sheet and forget the selection.
    pub fn close_lead_sheet(&self) {
        self.set_lead_sheet_open(false);
        self.set_selected_lead(None);
    }

    /// Register a listener called after every state-changing write.
    pub fn subscribe(
        &self,
        listener: impl Fn(&UiState, UiChange) + Send + Sync + 'static,
    ) -> Subscription {
        let id = Subscription(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(id, _)| *id != subscription);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn snapshot(&self) -> UiState {
        self.state()
    }

    /// Replace the whole state, e.g. from a saved snapshot.
    pub fn restore(&self, state: UiState) {
        self.update(UiChange::Restored, |s| *s = state);
    }

    /// Write the current state to `path` as JSON.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), DashboardError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(path, content)?;
        log::debug!("Saved UI state snapshot to {}", path.display());
        Ok(())
    }

    /// Read a JSON snapshot from `path` into a fresh store.
    pub fn load_snapshot(path: &Path) -> Result<Self, DashboardError> {
        let content = fs::read_to_string(path)?;
        let state: UiState = serde_json::from_str(&content)?;
        Ok(Self::with_state(state))
    }

    fn update(&self, change: UiChange, mutate: impl FnOnce(&mut UiState)) {
        {
            let mut guard = self.state.write();
            let before = guard.clone();
            mutate(&mut guard);
            if *guard == before {
                return;
            }
            // queued under the state lock so concurrent writes keep their order
            let mut pending = self.notifications.lock();
            pending.queue.push_back((guard.clone(), change));
            if pending.draining {
                return;
            }
            pending.draining = true;
        }
        self.drain_notifications();
    }

    fn drain_notifications(&self) {
        loop {
            let (state, change) = {
                let mut pending = self.notifications.lock();
                match pending.queue.pop_front() {
                    Some(next) => next,
                    None => {
                        pending.draining = false;
                        return;
                    }
                }
            };
            let listeners: Vec<Listener> = self
                .listeners
                .lock()
                .iter()
                .map(|(_, l)| Arc::clone(l))
                .collect();
            for listener in listeners {
                listener(&state, change);
            }
        }
    }
}

impl Default for UiStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_initial_view_state() {
        let store = UiStore::new();
        let state = store.state();
        assert_eq!(
            state.lead_filters,
            LeadFilters {
                status: None,
                search: String::new(),
                campaign: None,
            }
        );
        assert_eq!(state.campaign_filters, CampaignFilters::default());
        assert_eq!(state.selected_lead, None);
        assert!(!state.lead_sheet_open);
        assert!(!state.sidebar_collapsed);
    }

    #[test]
    fn lead_filter_patches_merge_in_order() {
        let store = UiStore::new();

        store.set_lead_filters(LeadFiltersPatch::default().search("acme"));
        assert_eq!(
            store.lead_filters(),
            LeadFilters {
                status: None,
                search: "acme".into(),
                campaign: None,
            }
        );

        store.set_lead_filters(LeadFiltersPatch::default().status(Some("converted")));
        assert_eq!(
            store.lead_filters(),
            LeadFilters {
                status: Some("converted".into()),
                search: "acme".into(),
                campaign: None,
            }
        );
    }

    #[test]
    fn explicit_clear_differs_from_omission() {
        let store = UiStore::new();
        store.set_lead_filters(LeadFiltersPatch::default().status(Some("pending")));

        store.set_lead_filters(LeadFiltersPatch::default().search("x"));
        assert_eq!(store.lead_filters().status.as_deref(), Some("pending"));

        store.set_lead_filters(LeadFiltersPatch::default().status(None));
        assert_eq!(store.lead_filters().status, None);
        assert_eq!(store.lead_filters().search, "x");
    }

    #[test]
    fn last_write_wins_per_field() {
        let store = UiStore::new();
        let patches = vec![
            LeadFiltersPatch::default().campaign(Some("c1")).search("a"),
            LeadFiltersPatch::default().search("ab"),
            LeadFiltersPatch::default().status(Some("contacted")),
            LeadFiltersPatch::default().campaign(Some("c2")),
            LeadFiltersPatch::default().search(""),
        ];
        for p in patches {
            store.set_lead_filters(p);
        }
        assert_eq!(
            store.lead_filters(),
            LeadFilters {
                status: Some("contacted".into()),
                search: String::new(),
                campaign: Some("c2".into()),
            }
        );
    }

    #[test]
    fn unknown_status_passes_through() {
        let store = UiStore::new();
        store.set_lead_filters(LeadFiltersPatch::default().status(Some("archived")));
        assert_eq!(store.lead_filters().status.as_deref(), Some("archived"));
    }

    #[test]
    fn campaign_filters_merge_preserves_prior_field() {
        let store = UiStore::new();
        store.set_campaign_filters(CampaignFiltersPatch::default().status(Some("active")));
        store.set_campaign_filters(CampaignFiltersPatch::default().search("Q1"));
        assert_eq!(
            store.campaign_filters(),
            CampaignFilters {
                status: Some("active".into()),
                search: "Q1".into(),
            }
        );
    }

    #[test]
    fn selection_does_not_touch_sheet_flag() {
        let store = UiStore::new();
        store.set_lead_sheet_open(true);
        store.set_selected_lead(Some("L1".into()));
        store.set_selected_lead(None);
        assert_eq!(store.selected_lead(), None);
        assert!(store.lead_sheet_open());

        let other = UiStore::new();
        other.set_selected_lead(Some("L1".into()));
        other.set_selected_lead(None);
        assert!(!other.lead_sheet_open());
    }

    #[test]
    fn open_and_close_lead_pair_both_fields() {
        let store = UiStore::new();
        store.open_lead("L7");
        assert_eq!(store.selected_lead().as_deref(), Some("L7"));
        assert!(store.lead_sheet_open());
        store.close_lead_sheet();
        assert_eq!(store.selected_lead(), None);
        assert!(!store.lead_sheet_open());
    }

    #[test]
    fn listeners_see_new_state_synchronously() {
        let store = UiStore::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.subscribe(move |state, change| {
            sink.lock().push((change, state.lead_filters.search.clone()));
        });

        store.set_lead_filters(LeadFiltersPatch::default().search("acme"));
        store.set_sidebar_collapsed(true);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (UiChange::LeadFilters, "acme".to_string()));
        assert_eq!(seen[1].0, UiChange::SidebarCollapsed);
    }

    #[test]
    fn identical_write_does_not_notify() {
        let store = UiStore::new();
        let count = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&count);
        store.subscribe(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        store.set_lead_filters(LeadFiltersPatch::default().search(""));
        store.set_lead_sheet_open(false);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        store.set_lead_sheet_open(true);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_write_back_into_store() {
        let store = Arc::new(UiStore::new());
        let inner = Arc::clone(&store);
        store.subscribe(move |state, change| {
            if change == UiChange::SelectedLead && state.selected_lead.is_some() {
                inner.set_lead_sheet_open(true);
            }
        });

        store.set_selected_lead(Some("L2".into()));
        assert!(store.lead_sheet_open());
    }

    #[test]
    fn nested_write_reaches_later_listeners_last() {
        let store = Arc::new(UiStore::new());
        let inner = Arc::clone(&store);
        store.subscribe(move |state, change| {
            let search = &state.lead_filters.search;
            if change == UiChange::LeadFilters && *search != search.to_lowercase() {
                inner.set_lead_filters(LeadFiltersPatch::default().search(search.to_lowercase()));
            }
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.subscribe(move |state, _| sink.lock().push(state.lead_filters.search.clone()));

        store.set_lead_filters(LeadFiltersPatch::default().search("ACME"));

        assert_eq!(store.lead_filters().search, "acme");
        assert_eq!(*seen.lock(), vec!["ACME".to_string(), "acme".to_string()]);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let store = UiStore::new();
        let count = Arc::new(AtomicU64::new(0));
        let c = Arc::clone(&count);
        let sub = store.subscribe(move |_, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        store.set_sidebar_collapsed(true);
        assert!(store.unsubscribe(sub));
        assert!(!store.unsubscribe(sub));
        store.set_sidebar_collapsed(false);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn independent_instances_do_not_share_state() {
        let a = UiStore::new();
        let b = UiStore::new();
        a.set_lead_filters(LeadFiltersPatch::default().search("only-a"));
        assert_eq!(b.lead_filters().search, "");
    }

    #[test]
    fn snapshot_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ui").join("state.json");

        let store = UiStore::new();
        store.set_lead_filters(
            LeadFiltersPatch::default()
                .search("acme")
                .status(Some("responded"))
                .campaign(Some("c9")),
        );
        store.set_campaign_filters(CampaignFiltersPatch::default().status(Some("paused")));
        store.open_lead("L3");
        store.save_snapshot(&path).unwrap();

        let restored = UiStore::load_snapshot(&path).unwrap();
        assert_eq!(restored.state(), store.state());
    }

    #[test]
    fn restore_notifies_once() {
        let store = UiStore::new();
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        store.subscribe(move |_, change| sink.lock().push(change));

        let mut next = UiState::default();
        next.lead_filters.search = "restored".into();
        store.restore(next.clone());

        assert_eq!(store.state(), next);
        assert_eq!(*changes.lock(), vec![UiChange::Restored]);
    }
}
