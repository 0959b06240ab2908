//! Overview numbers and recent activity for the dashboard home page.

use serde::{Deserialize, Serialize};

use super::leads::lead_list_query;
use super::percent;
use crate::error::DashboardError;
use crate::state::LeadFilters;
use crate::supabase::{decode_rows, DataService, TableQuery};
use crate::types::{Campaign, CampaignStatus, LeadRow, LeadStatus};

/// Rows shown in each recent-activity list.
const RECENT_LIMIT: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_campaigns: usize,
    pub active_campaigns: usize,
    pub total_leads: usize,
    pub contacted_leads: usize,
    pub responded_leads: usize,
    /// Responded plus converted leads over every lead past pending,
    /// rounded. Leads with an unrecognised status are left out.
    pub response_rate: u32,
    pub recent_campaigns: Vec<Campaign>,
    pub recent_leads: Vec<LeadRow>,
}

#[derive(Deserialize)]
struct StatusRow<S> {
    status: S,
}

pub async fn fetch_dashboard_stats(
    data: &dyn DataService,
) -> Result<DashboardStats, DashboardError> {
    let campaign_statuses: Vec<StatusRow<CampaignStatus>> = decode_rows(
        data.select(&TableQuery::from("campaigns").select(&["id", "status"]))
            .await?,
    )?;
    let lead_statuses: Vec<StatusRow<LeadStatus>> = decode_rows(
        data.select(&TableQuery::from("leads").select(&["id", "status"]))
            .await?,
    )?;

    let recent_campaigns: Vec<Campaign> = decode_rows(
        data.select(
            &TableQuery::from("campaigns")
                .order("created_at", false)
                .limit(RECENT_LIMIT),
        )
        .await?,
    )?;
    let recent_leads: Vec<LeadRow> = decode_rows(
        data.select(&lead_list_query(&LeadFilters::default(), 0, RECENT_LIMIT))
            .await?,
    )?;

    let count = |status: LeadStatus| lead_statuses.iter().filter(|r| r.status == status).count();
    let responded = count(LeadStatus::Responded);
    // A converted lead was contacted and answered on the way there.
    let reached = lead_statuses
        .iter()
        .filter(|r| r.status.is_known() && r.status != LeadStatus::Pending)
        .count();

    let stats = DashboardStats {
        total_campaigns: campaign_statuses.len(),
        active_campaigns: campaign_statuses
            .iter()
            .filter(|r| r.status == CampaignStatus::Active)
            .count(),
        total_leads: lead_statuses.len(),
        contacted_leads: count(LeadStatus::Contacted),
        responded_leads: responded,
        response_rate: percent(responded + count(LeadStatus::Converted), reached),
        recent_campaigns,
        recent_leads,
    };
    log::debug!(
        "Dashboard stats: {} campaigns, {} leads",
        stats.total_campaigns,
        stats.total_leads
    );
    Ok(stats)
}
