//! Lead detail sheet: the selected lead, status changes and outreach.

use std::sync::Arc;

use super::{AppContext, ViewState};
use crate::error::DashboardError;
use crate::notification::Toast;
use crate::queries::{QueryKey, QueryStatus};
use crate::services::leads::{contact_lead, fetch_lead_detail, mailto_link, update_lead_status};
use crate::types::{Lead, LeadDetail, LeadStatus};

pub struct LeadDetailView {
    ctx: AppContext,
}

impl LeadDetailView {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    /// Key for the current selection. Disabled when nothing is selected.
    pub fn key(&self) -> QueryKey {
        QueryKey::Lead(self.ctx.store.selected_lead())
    }

    pub fn is_open(&self) -> bool {
        self.ctx.store.lead_sheet_open()
    }

    /// Fetch the selected lead. `None` without a selection; no request is
    /// made in that case.
    pub async fn load(&self) -> Result<Option<Arc<LeadDetail>>, DashboardError> {
        let key = self.key();
        let QueryKey::Lead(Some(lead_id)) = &key else {
            return Ok(None);
        };
        let data = Arc::clone(&self.ctx.data);
        let lead_id = lead_id.clone();
        self.ctx
            .queries
            .fetch(&key, || async move {
                fetch_lead_detail(data.as_ref(), &lead_id).await
            })
            .await
            .map(Some)
    }

    pub fn view_state(&self) -> ViewState<Arc<LeadDetail>> {
        let key = self.key();
        if !key.is_enabled() {
            return ViewState::Empty("No lead selected".to_string());
        }
        match self.ctx.queries.status(&key) {
            QueryStatus::Error(_) => ViewState::Error("Failed to load lead details".to_string()),
            _ => match self.ctx.queries.data::<LeadDetail>(&key) {
                Some(detail) => ViewState::Ready(detail),
                None => ViewState::Loading,
            },
        }
    }

    /// Change the lead's status, optionally replacing its notes.
    pub async fn update_status(
        &self,
        lead_id: &str,
        status: LeadStatus,
        notes: Option<&str>,
    ) -> Result<Lead, DashboardError> {
        match update_lead_status(self.ctx.data.as_ref(), lead_id, status, notes).await {
            Ok(outcome) => {
                self.ctx.apply_invalidations(&outcome.invalidations);
                self.ctx.toaster.push(Toast::success(
                    "Lead updated",
                    "Lead status has been updated successfully.",
                ));
                Ok(outcome.value)
            }
            Err(e) => {
                self.ctx.toaster.push(Toast::error(
                    "Update failed",
                    "Failed to update lead status. Please try again.",
                ));
                Err(e)
            }
        }
    }

    /// Link to email the lead, moving a pending lead to contacted first.
    pub async fn contact(&self, lead: &Lead) -> Result<String, DashboardError> {
        match contact_lead(self.ctx.data.as_ref(), lead).await {
            Ok(Some(outcome)) => {
                self.ctx.apply_invalidations(&outcome.invalidations);
                self.ctx.toaster.push(Toast::success(
                    "Lead updated",
                    "Lead status has been updated successfully.",
                ));
            }
            Ok(None) => {}
            Err(e) => {
                self.ctx.toaster.push(Toast::error(
                    "Update failed",
                    "Failed to update lead status. Please try again.",
                ));
                return Err(e);
            }
        }
        Ok(mailto_link(&lead.email))
    }

    /// Close the sheet and clear the selection.
    pub fn close(&self) {
        self.ctx.store.close_lead_sheet();
    }
}
