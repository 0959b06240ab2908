//! Dashboard home page.

use std::sync::Arc;

use super::{AppContext, ViewState};
use crate::error::DashboardError;
use crate::queries::{QueryKey, QueryStatus};
use crate::services::dashboard::{fetch_dashboard_stats, DashboardStats};

pub struct DashboardView {
    ctx: AppContext,
}

impl DashboardView {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub async fn load(&self) -> Result<Arc<DashboardStats>, DashboardError> {
        let data = Arc::clone(&self.ctx.data);
        self.ctx
            .queries
            .fetch(&QueryKey::DashboardStats, || async move {
                fetch_dashboard_stats(data.as_ref()).await
            })
            .await
    }

    pub fn view_state(&self) -> ViewState<Arc<DashboardStats>> {
        let key = QueryKey::DashboardStats;
        match self.ctx.queries.status(&key) {
            QueryStatus::Error(_) => {
                ViewState::Error("Error loading dashboard. Please try again.".to_string())
            }
            _ => match self.ctx.queries.data::<DashboardStats>(&key) {
                Some(stats) => ViewState::Ready(stats),
                None => ViewState::Loading,
            },
        }
    }

    /// Stats were invalidated by a write since they were last loaded.
    pub fn is_stale(&self) -> bool {
        !self.ctx.queries.is_fresh(&QueryKey::DashboardStats)
    }
}
