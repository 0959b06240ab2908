//! Campaign list with lead statistics, campaign detail, and campaign writes.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};

use super::{percent, MutationOutcome};
use crate::error::DashboardError;
use crate::queries::{Invalidation, QueryKey};
use crate::state::CampaignFilters;
use crate::supabase::auth::{require_user, AuthProvider};
use crate::supabase::{decode_row, decode_rows, DataService, Embed, TableQuery};
use crate::types::{Campaign, CampaignOption, CampaignStatus, Lead, LeadStatus};

/// A campaign row with counts derived from its embedded leads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignWithStats {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub lead_count: usize,
    pub converted_count: usize,
}

impl CampaignWithStats {
    fn from_row(mut row: Value) -> Result<Self, DashboardError> {
        let leads = row
            .as_object_mut()
            .and_then(|obj| obj.remove("leads"))
            .unwrap_or(Value::Null);
        let leads = leads.as_array().map(Vec::as_slice).unwrap_or(&[]);
        let converted_count = leads
            .iter()
            .filter(|l| l.get("status").and_then(Value::as_str) == Some(LeadStatus::Converted.as_str()))
            .count();

        Ok(Self {
            campaign: decode_row(row)?,
            lead_count: leads.len(),
            converted_count,
        })
    }

    /// Share of this campaign's leads that converted.
    pub fn progress_percentage(&self) -> u32 {
        percent(self.converted_count, self.lead_count)
    }
}

pub fn campaign_list_query(filters: &CampaignFilters) -> TableQuery {
    let mut query = TableQuery::from("campaigns")
        .embed(Embed::to_many("leads", "leads", "campaign_id", &["id", "status"]))
        .order("created_at", false);
    if !filters.search.is_empty() {
        query = query.ilike("name", filters.search.as_str());
    }
    if let Some(status) = &filters.status {
        query = query.eq("status", status.as_str());
    }
    query
}

pub async fn fetch_campaigns(
    data: &dyn DataService,
    filters: &CampaignFilters,
) -> Result<Vec<CampaignWithStats>, DashboardError> {
    data.select(&campaign_list_query(filters))
        .await?
        .into_iter()
        .map(CampaignWithStats::from_row)
        .collect()
}

/// Header cards above the campaigns table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSummary {
    pub total_campaigns: usize,
    pub active_campaigns: usize,
    pub total_leads: usize,
    /// Mean of each campaign's conversion rate, rounded.
    pub avg_conversion_rate: u32,
}

pub fn summarize(campaigns: &[CampaignWithStats]) -> CampaignSummary {
    if campaigns.is_empty() {
        return CampaignSummary::default();
    }
    let rate_sum: f64 = campaigns
        .iter()
        .map(|c| {
            if c.lead_count == 0 {
                0.0
            } else {
                c.converted_count as f64 / c.lead_count as f64 * 100.0
            }
        })
        .sum();

    CampaignSummary {
        total_campaigns: campaigns.len(),
        active_campaigns: campaigns
            .iter()
            .filter(|c| c.campaign.status == CampaignStatus::Active)
            .count(),
        total_leads: campaigns.iter().map(|c| c.lead_count).sum(),
        avg_conversion_rate: (rate_sum / campaigns.len() as f64).round() as u32,
    }
}

/// Every campaign by name, for the leads view's campaign filter.
pub async fn campaigns_for_filter(
    data: &dyn DataService,
) -> Result<Vec<CampaignOption>, DashboardError> {
    let query = TableQuery::from("campaigns")
        .select(&["id", "name"])
        .order("name", true);
    decode_rows(data.select(&query).await?)
}

/// Active campaigns by name, for the new-lead form.
pub async fn active_campaigns_for_lead(
    data: &dyn DataService,
) -> Result<Vec<CampaignOption>, DashboardError> {
    let query = TableQuery::from("campaigns")
        .select(&["id", "name"])
        .eq("status", CampaignStatus::Active.as_str())
        .order("name", true);
    decode_rows(data.select(&query).await?)
}

pub async fn fetch_campaign(
    data: &dyn DataService,
    campaign_id: &str,
) -> Result<Campaign, DashboardError> {
    let query = TableQuery::from("campaigns").eq("id", campaign_id).single();
    decode_row(data.select_single(&query).await?)
}

pub async fn fetch_campaign_leads(
    data: &dyn DataService,
    campaign_id: &str,
) -> Result<Vec<Lead>, DashboardError> {
    let query = TableQuery::from("leads").eq("campaign_id", campaign_id);
    decode_rows(data.select(&query).await?)
}

/// Funnel counts on the campaign detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignLeadStats {
    pub total: usize,
    pub contacted: usize,
    pub responded: usize,
    pub converted: usize,
    /// Contacted leads over all leads.
    pub acceptance_rate: u32,
    /// Responded leads over all leads.
    pub response_rate: u32,
}

impl CampaignLeadStats {
    pub fn from_leads(leads: &[Lead]) -> Self {
        let count = |status: LeadStatus| leads.iter().filter(|l| l.status == status).count();
        let contacted = count(LeadStatus::Contacted);
        let responded = count(LeadStatus::Responded);
        Self {
            total: leads.len(),
            contacted,
            responded,
            converted: count(LeadStatus::Converted),
            acceptance_rate: percent(contacted, leads.len()),
            response_rate: percent(responded, leads.len()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCampaignForm {
    pub name: String,
    pub description: String,
    pub budget: Option<f64>,
    /// `YYYY-MM-DD`, blank for none.
    pub start_date: String,
    pub end_date: String,
}

fn parse_date(field: &'static str, value: &str) -> Result<Option<NaiveDate>, DashboardError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map(Some)
        .map_err(|_| DashboardError::validation(field, "must be YYYY-MM-DD"))
}

impl NewCampaignForm {
    pub fn validate(&self) -> Result<(), DashboardError> {
        if self.name.trim().is_empty() {
            return Err(DashboardError::validation("name", "is required"));
        }
        if matches!(self.budget, Some(b) if b < 0.0 || !b.is_finite()) {
            return Err(DashboardError::validation("budget", "must be a positive amount"));
        }
        let start = parse_date("start_date", &self.start_date)?;
        let end = parse_date("end_date", &self.end_date)?;
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                return Err(DashboardError::validation("end_date", "is before start_date"));
            }
        }
        Ok(())
    }
}

fn campaign_write_invalidations(campaign_id: Option<&str>) -> Vec<Invalidation> {
    let mut invalidations = vec![
        Invalidation::Root("campaigns"),
        Invalidation::Root("campaigns-for-filter"),
        Invalidation::Root("campaigns-for-lead"),
        Invalidation::Root("dashboard-stats"),
    ];
    if let Some(id) = campaign_id {
        invalidations.push(Invalidation::Exact(QueryKey::Campaign(id.to_string())));
    }
    invalidations
}

/// Insert a draft campaign owned by the signed-in user.
pub async fn create_campaign(
    data: &dyn DataService,
    auth: &dyn AuthProvider,
    form: &NewCampaignForm,
) -> Result<MutationOutcome<Campaign>, DashboardError> {
    form.validate()?;
    let user = require_user(auth).await?;

    let optional = |v: &str| {
        if v.trim().is_empty() {
            Value::Null
        } else {
            Value::String(v.trim().to_string())
        }
    };
    let row = json!({
        "name": form.name.trim(),
        "description": optional(&form.description),
        "budget": form.budget,
        "start_date": optional(&form.start_date),
        "end_date": optional(&form.end_date),
        "status": CampaignStatus::Draft,
        "user_id": user.id,
    });

    let campaign: Campaign = decode_row(data.insert("campaigns", row).await?)?;
    log::info!("Created campaign {} ({})", campaign.id, campaign.name);
    Ok(MutationOutcome::new(campaign, campaign_write_invalidations(None)))
}

pub async fn set_campaign_status(
    data: &dyn DataService,
    campaign_id: &str,
    status: CampaignStatus,
) -> Result<MutationOutcome<Campaign>, DashboardError> {
    let rows = data
        .update(
            &TableQuery::from("campaigns").eq("id", campaign_id),
            json!({ "status": status }),
        )
        .await?;
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| DashboardError::NotFound(format!("campaign {}", campaign_id)))?;
    log::info!("Campaign {} now {}", campaign_id, status);
    Ok(MutationOutcome::new(
        decode_row(row)?,
        campaign_write_invalidations(Some(campaign_id)),
    ))
}

/// Status the Start/Pause button moves a campaign to. Completed campaigns
/// are not restarted.
pub fn toggle_target(status: CampaignStatus) -> Option<CampaignStatus> {
    match status {
        CampaignStatus::Active => Some(CampaignStatus::Paused),
        CampaignStatus::Draft | CampaignStatus::Paused => Some(CampaignStatus::Active),
        CampaignStatus::Completed => None,
    }
}

pub async fn toggle_campaign_status(
    data: &dyn DataService,
    campaign: &Campaign,
) -> Result<Option<MutationOutcome<Campaign>>, DashboardError> {
    match toggle_target(campaign.status) {
        Some(next) => set_campaign_status(data, &campaign.id, next).await.map(Some),
        None => Ok(None),
    }
}
