//! Page controllers that join the UI store, the query cache and services.
//!
//! A view owns no data of its own beyond what it needs to tell a current
//! fetch from a superseded one. Rendering is left to the caller; views
//! expose a [`ViewState`] describing what the page should show.

pub mod campaigns;
pub mod dashboard;
pub mod lead_detail;
pub mod leads;

use std::sync::Arc;

use serde::Serialize;

use crate::notification::Toaster;
use crate::queries::{Invalidation, QueryClient, QueryKey, PAGE_SIZE};
use crate::state::UiStore;
use crate::supabase::{AuthProvider, DataService};

pub use campaigns::CampaignsView;
pub use dashboard::DashboardView;
pub use lead_detail::LeadDetailView;
pub use leads::LeadsView;

/// What a page body shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "lowercase")]
pub enum ViewState<T> {
    Loading,
    Error(String),
    Empty(String),
    Ready(T),
}

impl<T> ViewState<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, ViewState::Ready(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            ViewState::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Shared handles every view is built from.
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<UiStore>,
    pub queries: Arc<QueryClient>,
    pub data: Arc<dyn DataService>,
    pub auth: Arc<dyn AuthProvider>,
    pub toaster: Arc<Toaster>,
    pub page_size: usize,
}

impl AppContext {
    pub fn new(data: Arc<dyn DataService>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            store: Arc::new(UiStore::new()),
            queries: Arc::new(QueryClient::new()),
            data,
            auth,
            toaster: Arc::new(Toaster::new()),
            page_size: PAGE_SIZE,
        }
    }

    pub fn with_store(mut self, store: Arc<UiStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Mark cached queries stale after a successful write.
    pub fn apply_invalidations(&self, invalidations: &[Invalidation]) -> Vec<QueryKey> {
        self.queries.invalidate_all(invalidations)
    }
}
