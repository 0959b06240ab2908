//! Lead list, lead detail, and lead mutations.

use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use serde_json::{json, Map, Value};

use super::MutationOutcome;
use crate::error::DashboardError;
use crate::queries::{page_range, Invalidation, QueryKey};
use crate::state::LeadFilters;
use crate::supabase::auth::{require_user, AuthProvider};
use crate::supabase::{decode_row, decode_rows, DataService, Embed, TableQuery};
use crate::types::{Lead, LeadDetail, LeadRow, LeadStatus};

/// Columns the free-text search matches against.
pub const LEAD_SEARCH_COLUMNS: [&str; 4] = ["first_name", "last_name", "email", "company"];

const LEAD_LIST_COLUMNS: [&str; 8] = [
    "id",
    "first_name",
    "last_name",
    "email",
    "company",
    "status",
    "last_contact_date",
    "created_at",
];

/// Query for one page of the leads table, newest first.
pub fn lead_list_query(filters: &LeadFilters, page: usize, page_size: usize) -> TableQuery {
    let (from, to) = page_range(page, page_size);
    let mut query = TableQuery::from("leads")
        .select(&LEAD_LIST_COLUMNS)
        .embed(Embed::to_one("campaigns", "campaigns", "campaign_id", &["name"]))
        .order("created_at", false)
        .range(from, to);

    if !filters.search.is_empty() {
        query = query.or_ilike(&LEAD_SEARCH_COLUMNS, filters.search.as_str());
    }
    if let Some(status) = &filters.status {
        query = query.eq("status", status.as_str());
    }
    if let Some(campaign) = &filters.campaign {
        query = query.eq("campaign_id", campaign.as_str());
    }
    query
}

pub async fn fetch_lead_page(
    data: &dyn DataService,
    filters: &LeadFilters,
    page: usize,
    page_size: usize,
) -> Result<Vec<LeadRow>, DashboardError> {
    let rows = data.select(&lead_list_query(filters, page, page_size)).await?;
    decode_rows(rows)
}

pub fn lead_detail_query(lead_id: &str) -> TableQuery {
    TableQuery::from("leads")
        .embed(Embed::to_one(
            "campaigns",
            "campaigns",
            "campaign_id",
            &["id", "name", "description", "status"],
        ))
        .eq("id", lead_id)
        .single()
}

pub async fn fetch_lead_detail(
    data: &dyn DataService,
    lead_id: &str,
) -> Result<LeadDetail, DashboardError> {
    let row = data.select_single(&lead_detail_query(lead_id)).await?;
    decode_row(row)
}

/// Field values from the "Add New Lead" form. Blank optional fields are
/// stored as null.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewLeadForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub campaign_id: String,
    pub notes: String,
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email regex"))
}

fn blank_to_null(value: &str) -> Value {
    if value.trim().is_empty() {
        Value::Null
    } else {
        Value::String(value.to_string())
    }
}

impl NewLeadForm {
    pub fn validate(&self) -> Result<(), DashboardError> {
        let required = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
            ("campaign_id", &self.campaign_id),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DashboardError::validation(field, "is required"));
            }
        }
        if !email_pattern().is_match(self.email.trim()) {
            return Err(DashboardError::validation("email", "is not a valid address"));
        }
        Ok(())
    }

    fn to_row(&self, user_id: &str) -> Value {
        json!({
            "first_name": self.first_name,
            "last_name": self.last_name,
            "email": self.email,
            "phone": blank_to_null(&self.phone),
            "company": blank_to_null(&self.company),
            "campaign_id": self.campaign_id,
            "notes": blank_to_null(&self.notes),
            "status": LeadStatus::Pending,
            "user_id": user_id,
        })
    }
}

/// Insert a pending lead owned by the signed-in user.
pub async fn create_lead(
    data: &dyn DataService,
    auth: &dyn AuthProvider,
    form: &NewLeadForm,
) -> Result<MutationOutcome<Lead>, DashboardError> {
    form.validate()?;
    let user = require_user(auth).await?;

    let row = data.insert("leads", form.to_row(&user.id)).await?;
    let lead: Lead = decode_row(row)?;
    log::info!("Created lead {} in campaign {}", lead.id, form.campaign_id);

    Ok(MutationOutcome::new(lead, vec![Invalidation::Root("leads")]))
}

/// Invalidations after any write to a single lead.
pub fn lead_write_invalidations(lead_id: &str) -> Vec<Invalidation> {
    vec![
        Invalidation::Root("leads"),
        Invalidation::Exact(QueryKey::Lead(Some(lead_id.to_string()))),
        Invalidation::Root("dashboard-stats"),
    ]
}

/// Set a lead's status and stamp `last_contact_date`. Notes replace the
/// stored notes only when non-empty.
pub async fn update_lead_status(
    data: &dyn DataService,
    lead_id: &str,
    status: LeadStatus,
    notes: Option<&str>,
) -> Result<MutationOutcome<Lead>, DashboardError> {
    if !status.is_known() {
        return Err(DashboardError::validation("status", "is not a lead status"));
    }
    let mut patch = Map::new();
    patch.insert("status".to_string(), json!(status));
    patch.insert(
        "last_contact_date".to_string(),
        Value::String(Utc::now().to_rfc3339()),
    );
    if let Some(notes) = notes.filter(|n| !n.is_empty()) {
        patch.insert("notes".to_string(), Value::String(notes.to_string()));
    }

    let rows = data
        .update(&TableQuery::from("leads").eq("id", lead_id), Value::Object(patch))
        .await?;
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| DashboardError::NotFound(format!("lead {}", lead_id)))?;
    let lead: Lead = decode_row(row)?;
    log::info!("Lead {} moved to {}", lead_id, status);

    Ok(MutationOutcome::new(lead, lead_write_invalidations(lead_id)))
}

/// `mailto:` link for reaching out to a lead.
pub fn mailto_link(email: &str) -> String {
    format!("mailto:{}", email)
}

/// Record outreach: a pending lead becomes contacted. Leads further along
/// are left alone and `None` is returned.
pub async fn contact_lead(
    data: &dyn DataService,
    lead: &Lead,
) -> Result<Option<MutationOutcome<Lead>>, DashboardError> {
    if lead.status != LeadStatus::Pending {
        return Ok(None);
    }
    update_lead_status(data, &lead.id, LeadStatus::Contacted, None)
        .await
        .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supabase::{MemoryDataService, StaticAuth};
    use crate::types::User;

    fn param<'a>(q: &'a TableQuery, key: &str) -> Option<String> {
        q.to_params()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    fn seeded() -> MemoryDataService {
        let svc = MemoryDataService::new();
        svc.seed("campaigns", json!({"id": "c1", "name": "Q1 Push", "description": null, "status": "active"}));
        for (i, (first, company, status)) in [
            ("Ada", "Acme", "pending"),
            ("Bob", "Globex", "contacted"),
            ("Cy", "acme labs", "converted"),
        ]
        .iter()
        .enumerate()
        {
            svc.seed(
                "leads",
                json!({
                    "id": format!("l{}", i + 1),
                    "first_name": first,
                    "last_name": "Doe",
                    "email": format!("{}@example.com", first.to_lowercase()),
                    "company": company,
                    "status": status,
                    "campaign_id": "c1",
                    "notes": null,
                    "last_contact_date": null,
                    "created_at": format!("2026-01-0{}T00:00:00Z", i + 1),
                }),
            );
        }
        svc
    }

    fn valid_form() -> NewLeadForm {
        NewLeadForm {
            first_name: "Dee".into(),
            last_name: "Ray".into(),
            email: "dee@ray.io".into(),
            campaign_id: "c1".into(),
            ..NewLeadForm::default()
        }
    }

    #[test]
    fn list_query_applies_every_filter() {
        let filters = LeadFilters {
            status: Some("converted".into()),
            search: "acme".into(),
            campaign: Some("c1".into()),
        };
        let q = lead_list_query(&filters, 1, 50);
        assert_eq!(
            param(&q, "or").as_deref(),
            Some("(first_name.ilike.*acme*,last_name.ilike.*acme*,email.ilike.*acme*,company.ilike.*acme*)")
        );
        assert_eq!(param(&q, "status").as_deref(), Some("eq.converted"));
        assert_eq!(param(&q, "campaign_id").as_deref(), Some("eq.c1"));
        assert_eq!(param(&q, "order").as_deref(), Some("created_at.desc"));
        assert_eq!(param(&q, "offset").as_deref(), Some("50"));
        assert_eq!(param(&q, "limit").as_deref(), Some("50"));
    }

    #[test]
    fn empty_filters_add_no_conditions() {
        let q = lead_list_query(&LeadFilters::default(), 0, 50);
        assert!(!q.has_filters());
        assert_eq!(
            param(&q, "select").as_deref(),
            Some("id,first_name,last_name,email,company,status,last_contact_date,created_at,campaigns:campaign_id(name)")
        );
    }

    #[tokio::test]
    async fn page_fetch_filters_newest_first() {
        let svc = seeded();
        let filters = LeadFilters {
            search: "ACME".into(),
            ..LeadFilters::default()
        };
        let rows = fetch_lead_page(&svc, &filters, 0, 50).await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["l3", "l1"]);
        assert_eq!(rows[0].campaign_name(), Some("Q1 Push"));
    }

    #[tokio::test]
    async fn detail_includes_campaign() {
        let svc = seeded();
        let detail = fetch_lead_detail(&svc, "l2").await.unwrap();
        assert_eq!(detail.lead.first_name, "Bob");
        assert_eq!(detail.campaigns.unwrap().name, "Q1 Push");
    }

    #[test]
    fn form_requires_core_fields() {
        let mut form = valid_form();
        assert!(form.validate().is_ok());

        form.campaign_id.clear();
        let err = form.validate().unwrap_err();
        assert_eq!(err.to_string(), "campaign_id: is required");

        let mut form = valid_form();
        form.email = "not-an-email".into();
        assert!(matches!(
            form.validate(),
            Err(DashboardError::Validation { field: "email", .. })
        ));
    }

    #[tokio::test]
    async fn create_lead_records_owner_and_pending_status() {
        let svc = seeded();
        let auth = StaticAuth::signed_in(User {
            id: "u1".into(),
            email: Some("me@linkbird.io".into()),
        });
        let outcome = create_lead(&svc, &auth, &valid_form()).await.unwrap();

        assert_eq!(outcome.value.status, LeadStatus::Pending);
        assert_eq!(outcome.value.user_id.as_deref(), Some("u1"));
        assert_eq!(outcome.value.phone, None);
        assert_eq!(outcome.invalidations, vec![Invalidation::Root("leads")]);
        assert_eq!(svc.rows("leads").len(), 4);
    }

    #[tokio::test]
    async fn create_lead_requires_sign_in() {
        let svc = seeded();
        let auth = StaticAuth::anonymous();
        let err = create_lead(&svc, &auth, &valid_form()).await.unwrap_err();
        assert!(matches!(err, DashboardError::NotAuthenticated));
        assert_eq!(svc.rows("leads").len(), 3);
    }

    #[tokio::test]
    async fn status_update_stamps_contact_and_keeps_notes_when_blank() {
        let svc = seeded();
        let outcome = update_lead_status(&svc, "l1", LeadStatus::Responded, Some(""))
            .await
            .unwrap();
        assert_eq!(outcome.value.status, LeadStatus::Responded);
        assert!(outcome.value.last_contact_date.is_some());
        assert_eq!(outcome.value.notes, None);
        assert_eq!(outcome.invalidations, lead_write_invalidations("l1"));

        let outcome = update_lead_status(&svc, "l1", LeadStatus::Converted, Some("signed"))
            .await
            .unwrap();
        assert_eq!(outcome.value.notes.as_deref(), Some("signed"));
    }

    #[tokio::test]
    async fn status_update_on_missing_lead_is_not_found() {
        let svc = seeded();
        let err = update_lead_status(&svc, "ghost", LeadStatus::Contacted, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::NotFound(_)));
    }

    #[tokio::test]
    async fn status_update_refuses_unknown_status() {
        let svc = seeded();
        let err = update_lead_status(&svc, "l1", LeadStatus::Unknown, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::Validation { field: "status", .. }));
        assert_eq!(svc.rows("leads")[0]["status"], "pending");
    }

    #[tokio::test]
    async fn contacting_only_advances_pending_leads() {
        let svc = seeded();
        let pending = fetch_lead_detail(&svc, "l1").await.unwrap().lead;
        let outcome = contact_lead(&svc, &pending).await.unwrap().unwrap();
        assert_eq!(outcome.value.status, LeadStatus::Contacted);

        let converted = fetch_lead_detail(&svc, "l3").await.unwrap().lead;
        assert!(contact_lead(&svc, &converted).await.unwrap().is_none());
        assert_eq!(mailto_link(&converted.email), "mailto:cy@example.com");
    }
}
