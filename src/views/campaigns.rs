//! Campaigns page and campaign detail page.

use std::sync::Arc;

use serde::Serialize;

use super::{AppContext, ViewState};
use crate::error::DashboardError;
use crate::notification::Toast;
use crate::queries::{QueryKey, QueryStatus};
use crate::services::campaigns::{
    create_campaign, fetch_campaign, fetch_campaign_leads, fetch_campaigns, summarize,
    toggle_campaign_status, CampaignLeadStats, CampaignSummary, CampaignWithStats,
    NewCampaignForm,
};
use crate::state::CampaignFiltersPatch;
use crate::types::{Campaign, Lead};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignList {
    pub campaigns: Vec<CampaignWithStats>,
    pub summary: CampaignSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignDetail {
    pub campaign: Campaign,
    pub leads: Vec<Lead>,
    pub stats: CampaignLeadStats,
}

pub struct CampaignsView {
    ctx: AppContext,
}

impl CampaignsView {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub fn key(&self) -> QueryKey {
        QueryKey::Campaigns(self.ctx.store.campaign_filters())
    }

    pub async fn load(&self) -> Result<Arc<CampaignList>, DashboardError> {
        let filters = self.ctx.store.campaign_filters();
        let data = Arc::clone(&self.ctx.data);
        self.ctx
            .queries
            .fetch(&QueryKey::Campaigns(filters.clone()), || async move {
                let campaigns = fetch_campaigns(data.as_ref(), &filters).await?;
                let summary = summarize(&campaigns);
                Ok::<_, DashboardError>(CampaignList { campaigns, summary })
            })
            .await
    }

    pub fn view_state(&self) -> ViewState<Arc<CampaignList>> {
        let key = self.key();
        match self.ctx.queries.status(&key) {
            QueryStatus::Error(_) => {
                ViewState::Error("Error loading campaigns. Please try again.".to_string())
            }
            _ => match self.ctx.queries.data::<CampaignList>(&key) {
                Some(list) if list.campaigns.is_empty() => {
                    ViewState::Empty("No campaigns found.".to_string())
                }
                Some(list) => ViewState::Ready(list),
                None => ViewState::Loading,
            },
        }
    }

    pub fn set_search(&self, search: &str) {
        self.ctx
            .store
            .set_campaign_filters(CampaignFiltersPatch::default().search(search));
    }

    pub fn set_status_filter(&self, status: Option<&str>) {
        self.ctx
            .store
            .set_campaign_filters(CampaignFiltersPatch::default().status(status));
    }

    /// Campaign, its leads and funnel counts for the detail page.
    pub async fn load_detail(&self, campaign_id: &str) -> Result<CampaignDetail, DashboardError> {
        let data = Arc::clone(&self.ctx.data);
        let id = campaign_id.to_string();
        let campaign = self
            .ctx
            .queries
            .fetch(&QueryKey::Campaign(id.clone()), || async move {
                fetch_campaign(data.as_ref(), &id).await
            })
            .await?;

        let data = Arc::clone(&self.ctx.data);
        let id = campaign_id.to_string();
        let leads = self
            .ctx
            .queries
            .fetch(&QueryKey::CampaignLeads(id.clone()), || async move {
                fetch_campaign_leads(data.as_ref(), &id).await
            })
            .await?;

        Ok(CampaignDetail {
            campaign: (*campaign).clone(),
            stats: CampaignLeadStats::from_leads(&leads),
            leads: (*leads).clone(),
        })
    }

    pub async fn create(&self, form: &NewCampaignForm) -> Result<Campaign, DashboardError> {
        match create_campaign(self.ctx.data.as_ref(), self.ctx.auth.as_ref(), form).await {
            Ok(outcome) => {
                self.ctx.apply_invalidations(&outcome.invalidations);
                self.ctx
                    .toaster
                    .push(Toast::success("Success", "Campaign created successfully"));
                Ok(outcome.value)
            }
            Err(e) => {
                self.ctx
                    .toaster
                    .push(Toast::from_error("Error", "Failed to create campaign", &e));
                Err(e)
            }
        }
    }

    /// Start or pause a campaign. Completed campaigns are left as they are
    /// and `None` is returned.
    pub async fn toggle(&self, campaign: &Campaign) -> Result<Option<Campaign>, DashboardError> {
        match toggle_campaign_status(self.ctx.data.as_ref(), campaign).await {
            Ok(Some(outcome)) => {
                self.ctx.apply_invalidations(&outcome.invalidations);
                let message = format!("Campaign is now {}", outcome.value.status);
                self.ctx
                    .toaster
                    .push(Toast::success("Campaign updated", &message));
                Ok(Some(outcome.value))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.ctx.toaster.push(Toast::from_error(
                    "Error",
                    "Failed to update campaign",
                    &e,
                ));
                Err(e)
            }
        }
    }
}
