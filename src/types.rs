//! Shared domain types for leads, campaigns and the signed-in user.
//!
//! Rows are shaped like the data service returns them (snake_case columns),
//! so they deserialize straight from the table API without renames.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle of a lead: pending -> contacted -> responded -> converted.
///
/// The table is owned by the hosted service and may hold other values
/// (older rows use `connected`, `replied`). Those read as `Unknown` so one
/// odd row does not fail a whole page; they are shown but never counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    Pending,
    Contacted,
    Responded,
    Converted,
    #[serde(other)]
    Unknown,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 4] = [
        LeadStatus::Pending,
        LeadStatus::Contacted,
        LeadStatus::Responded,
        LeadStatus::Converted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Pending => "pending",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Responded => "responded",
            LeadStatus::Converted => "converted",
            LeadStatus::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != LeadStatus::Unknown
    }

    /// Capitalized label used in badges ("Pending", "Converted", ...).
    pub fn label(&self) -> &'static str {
        match self {
            LeadStatus::Pending => "Pending",
            LeadStatus::Contacted => "Contacted",
            LeadStatus::Responded => "Responded",
            LeadStatus::Converted => "Converted",
            LeadStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LeadStatus::Pending),
            "contacted" => Ok(LeadStatus::Contacted),
            "responded" => Ok(LeadStatus::Responded),
            "converted" => Ok(LeadStatus::Converted),
            other => Err(format!("Unknown lead status: {}", other)),
        }
    }
}

/// Lifecycle of a campaign: draft -> active -> paused/completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
}

impl CampaignStatus {
    pub const ALL: [CampaignStatus; 4] = [
        CampaignStatus::Draft,
        CampaignStatus::Active,
        CampaignStatus::Paused,
        CampaignStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "active" => Ok(CampaignStatus::Active),
            "paused" => Ok(CampaignStatus::Paused),
            "completed" => Ok(CampaignStatus::Completed),
            other => Err(format!("Unknown campaign status: {}", other)),
        }
    }
}

/// A row from the `leads` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    pub status: LeadStatus,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub last_contact_date: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Lead {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Embedded `campaigns:campaign_id(name)` relation on a lead list row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignName {
    pub name: String,
}

/// Lead list projection: the columns the leads table shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRow {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    pub status: LeadStatus,
    #[serde(default)]
    pub last_contact_date: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub campaigns: Option<CampaignName>,
}

impl LeadRow {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn campaign_name(&self) -> Option<&str> {
        self.campaigns.as_ref().map(|c| c.name.as_str())
    }
}

/// Embedded campaign summary on the lead detail sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadCampaign {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: CampaignStatus,
}

/// A full lead with its campaign, as shown on the detail sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadDetail {
    #[serde(flatten)]
    pub lead: Lead,
    #[serde(default)]
    pub campaigns: Option<LeadCampaign>,
}

/// A row from the `campaigns` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub status: CampaignStatus,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// `id, name` projection used by campaign pickers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignOption {
    pub id: String,
    pub name: String,
}

/// Signed-in user as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    /// First letter of the email, uppercased; "U" when unknown.
    pub fn initials(&self) -> String {
        self.email
            .as_deref()
            .and_then(|e| e.chars().next())
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_else(|| "U".to_string())
    }
}
