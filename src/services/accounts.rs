//! Connected LinkedIn sender accounts and their weekly request quota.

use serde::Serialize;

use super::{name_initials, percent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Paused,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedInAccount {
    pub id: String,
    pub name: String,
    pub profile_url: String,
    pub status: AccountStatus,
    pub connections: u32,
    pub weekly_requests: u32,
    pub max_weekly_requests: u32,
}

impl LinkedInAccount {
    pub fn initials(&self) -> String {
        name_initials(&self.name)
    }

    /// Weekly connection requests used, as a percentage capped at 100.
    pub fn quota_percent(&self) -> u32 {
        percent(
            self.weekly_requests as usize,
            self.max_weekly_requests as usize,
        )
        .min(100)
    }

    pub fn remaining_requests(&self) -> u32 {
        self.max_weekly_requests.saturating_sub(self.weekly_requests)
    }

    /// Whether another request can be sent this week.
    pub fn can_send(&self) -> bool {
        self.status == AccountStatus::Active && self.remaining_requests() > 0
    }
}

pub fn sample_accounts() -> Vec<LinkedInAccount> {
    vec![LinkedInAccount {
        id: "1".to_string(),
        name: "John Doe".to_string(),
        profile_url: "https://linkedin.com/in/johndoe".to_string(),
        status: AccountStatus::Active,
        connections: 1250,
        weekly_requests: 45,
        max_weekly_requests: 100,
    }]
}
