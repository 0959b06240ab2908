//! Query keys: the identity of a cached fetch.
//!
//! A key is derived from view identity plus whatever store state the fetch
//! depends on, so a filter change yields a different key and a fresh fetch.

use std::fmt;

use crate::state::{CampaignFilters, LeadFilters};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// Paginated lead list under the given filters.
    Leads(LeadFilters),
    /// Lead detail sheet; `None` when nothing is selected (fetch disabled).
    Lead(Option<String>),
    CampaignsForFilter,
    CampaignsForLead,
    Campaigns(CampaignFilters),
    Campaign(String),
    CampaignLeads(String),
    DashboardStats,
}

impl QueryKey {
    pub fn root(&self) -> &'static str {
        match self {
            QueryKey::Leads(_) => "leads",
            QueryKey::Lead(_) => "lead",
            QueryKey::CampaignsForFilter => "campaigns-for-filter",
            QueryKey::CampaignsForLead => "campaigns-for-lead",
            QueryKey::Campaigns(_) => "campaigns",
            QueryKey::Campaign(_) => "campaign",
            QueryKey::CampaignLeads(_) => "campaign-leads",
            QueryKey::DashboardStats => "dashboard-stats",
        }
    }

    /// Whether a fetch under this key should run at all.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, QueryKey::Lead(None))
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::Leads(filters) => write!(
                f,
                "leads[status={},search={:?},campaign={}]",
                filters.status.as_deref().unwrap_or("*"),
                filters.search,
                filters.campaign.as_deref().unwrap_or("*"),
            ),
            QueryKey::Lead(id) => write!(f, "lead[{}]", id.as_deref().unwrap_or("-")),
            QueryKey::Campaigns(filters) => write!(
                f,
                "campaigns[status={},search={:?}]",
                filters.status.as_deref().unwrap_or("*"),
                filters.search,
            ),
            QueryKey::Campaign(id) => write!(f, "campaign[{}]", id),
            QueryKey::CampaignLeads(id) => write!(f, "campaign-leads[{}]", id),
            other => f.write_str(other.root()),
        }
    }
}

/// Which cached entries a write makes stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    Exact(QueryKey),
    /// Every key whose root matches, whatever its parameters.
    Root(&'static str),
}

impl Invalidation {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Invalidation::Exact(k) => k == key,
            Invalidation::Root(root) => key.root() == *root,
        }
    }
}
