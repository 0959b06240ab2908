//! HTTP client for the hosted PostgREST table API.
//!
//! Uses reqwest with the project's anon key as `apikey` and the signed-in
//! user's access token (or the anon key) as Bearer auth. All tables live
//! under `{supabase_url}/rest/v1/`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::Value;
use url::Url;

use super::query::TableQuery;
use super::DataService;
use crate::error::DashboardError;

/// Shared slot for the current access token; written by the auth provider.
pub type AccessToken = Arc<RwLock<Option<String>>>;

const SINGLE_OBJECT_ACCEPT: &str = "application/vnd.pgrst.object+json";

pub struct RestDataService {
    client: reqwest::Client,
    rest_url: Url,
    anon_key: String,
    access_token: AccessToken,
    timeout_secs: u64,
}

impl RestDataService {
    pub fn new(
        supabase_url: &str,
        anon_key: &str,
        timeout_secs: u64,
        access_token: AccessToken,
    ) -> Result<Self, DashboardError> {
        let base = Url::parse(supabase_url)
            .map_err(|e| DashboardError::Configuration(format!("Invalid supabase URL: {}", e)))?;
        let rest_url = base
            .join("rest/v1/")
            .map_err(|e| DashboardError::Configuration(format!("Invalid supabase URL: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DashboardError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rest_url,
            anon_key: anon_key.to_string(),
            access_token,
            timeout_secs,
        })
    }

    fn table_url(&self, table: &str) -> Result<Url, DashboardError> {
        self.rest_url
            .join(table)
            .map_err(|e| DashboardError::Configuration(format!("Invalid table name {}: {}", table, e)))
    }

    fn request(&self, method: Method, table: &str) -> Result<RequestBuilder, DashboardError> {
        let bearer = self
            .access_token
            .read()
            .clone()
            .unwrap_or_else(|| self.anon_key.clone());
        Ok(self
            .client
            .request(method, self.table_url(table)?)
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", bearer)))
    }

    async fn send(&self, builder: RequestBuilder, table: &str) -> Result<Value, DashboardError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| DashboardError::from_request(e, self.timeout_secs))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status, table, &text));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| DashboardError::from_request(e, self.timeout_secs))?;
        if text.trim().is_empty() {
            return Ok(Value::Array(Vec::new()));
        }
        Ok(serde_json::from_str(&text)?)
    }
}

/// Map a non-2xx response to an error, preferring the service's own message.
fn status_error(status: StatusCode, table: &str, body: &str) -> DashboardError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string());

    match status {
        StatusCode::UNAUTHORIZED => DashboardError::NotAuthenticated,
        StatusCode::TOO_MANY_REQUESTS => DashboardError::RateLimited,
        // PostgREST answers 406 when a single-object request matched no rows
        StatusCode::NOT_FOUND | StatusCode::NOT_ACCEPTABLE => {
            DashboardError::NotFound(format!("{}: {}", table, message))
        }
        _ => DashboardError::Service {
            status: status.as_u16(),
            message,
        },
    }
}

fn into_rows(value: Value) -> Result<Vec<Value>, DashboardError> {
    match value {
        Value::Array(rows) => Ok(rows),
        Value::Object(_) => Ok(vec![value]),
        other => Err(DashboardError::Parse(format!(
            "Expected rows, got {}",
            other
        ))),
    }
}

#[async_trait]
impl DataService for RestDataService {
    async fn select(&self, query: &TableQuery) -> Result<Vec<Value>, DashboardError> {
        log::debug!("GET {} {:?}", query.table, query.to_params());
        let builder = self
            .request(Method::GET, &query.table)?
            .query(&query.to_params());
        into_rows(self.send(builder, &query.table).await?)
    }

    async fn select_single(&self, query: &TableQuery) -> Result<Value, DashboardError> {
        let builder = self
            .request(Method::GET, &query.table)?
            .header("Accept", SINGLE_OBJECT_ACCEPT)
            .query(&query.to_params());
        self.send(builder, &query.table).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, DashboardError> {
        log::info!("Inserting row into {}", table);
        let builder = self
            .request(Method::POST, table)?
            .header("Prefer", "return=representation")
            .header("Accept", SINGLE_OBJECT_ACCEPT)
            .json(&row);
        self.send(builder, table).await
    }

    async fn update(&self, query: &TableQuery, patch: Value) -> Result<Vec<Value>, DashboardError> {
        if !query.has_filters() {
            return Err(DashboardError::validation(
                "filters",
                "refusing to update every row of a table",
            ));
        }
        log::info!("Updating rows in {}", query.table);
        let builder = self
            .request(Method::PATCH, &query.table)?
            .header("Prefer", "return=representation")
            .query(&query.to_params())
            .json(&patch);
        into_rows(self.send(builder, &query.table).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_use_service_message() {
        let err = status_error(
            StatusCode::BAD_REQUEST,
            "leads",
            r#"{"code":"23502","message":"null value in column \"email\""}"#,
        );
        match err {
            DashboardError::Service { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("email"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn auth_and_missing_rows_are_classified() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "leads", ""),
            DashboardError::NotAuthenticated
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_ACCEPTABLE, "leads", "{}"),
            DashboardError::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "leads", ""),
            DashboardError::RateLimited
        ));
    }

    #[test]
    fn table_urls_sit_under_rest_v1() {
        let svc = RestDataService::new(
            "https://project.supabase.co",
            "anon",
            30,
            AccessToken::default(),
        )
        .unwrap();
        assert_eq!(
            svc.table_url("leads").unwrap().as_str(),
            "https://project.supabase.co/rest/v1/leads"
        );
    }

    #[test]
    fn invalid_base_url_is_configuration_error() {
        let err = RestDataService::new("not a url", "anon", 30, AccessToken::default())
            .err()
            .unwrap();
        assert!(matches!(err, DashboardError::Configuration(_)));
    }
}
