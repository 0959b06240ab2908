//! Authentication provider: who is signed in, sign-in and sign-out.
//!
//! `SupabaseAuth` speaks to the hosted GoTrue endpoints under
//! `{supabase_url}/auth/v1/` and publishes the access token into the shared
//! slot the table client reads. `StaticAuth` holds a fixed user for tests
//! and offline runs.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use super::rest::AccessToken;
use crate::error::DashboardError;
use crate::types::User;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The signed-in user, or `None` when signed out or the session expired.
    async fn current_user(&self) -> Result<Option<User>, DashboardError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, DashboardError>;

    async fn sign_out(&self) -> Result<(), DashboardError>;

    async fn is_authenticated(&self) -> bool {
        matches!(self.current_user().await, Ok(Some(_)))
    }
}

/// Caller identity for writes that record ownership.
pub async fn require_user(auth: &dyn AuthProvider) -> Result<User, DashboardError> {
    auth.current_user()
        .await?
        .ok_or(DashboardError::NotAuthenticated)
}

#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: User,
}

#[derive(Debug, Clone)]
struct Session {
    refresh_token: Option<String>,
    user: User,
}

pub struct SupabaseAuth {
    client: reqwest::Client,
    auth_url: Url,
    anon_key: String,
    access_token: AccessToken,
    session: RwLock<Option<Session>>,
    timeout_secs: u64,
}

impl SupabaseAuth {
    pub fn new(
        supabase_url: &str,
        anon_key: &str,
        timeout_secs: u64,
        access_token: AccessToken,
    ) -> Result<Self, DashboardError> {
        let auth_url = Url::parse(supabase_url)
            .and_then(|u| u.join("auth/v1/"))
            .map_err(|e| DashboardError::Configuration(format!("Invalid supabase URL: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DashboardError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            auth_url,
            anon_key: anon_key.to_string(),
            access_token,
            session: RwLock::new(None),
            timeout_secs,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, DashboardError> {
        self.auth_url
            .join(path)
            .map_err(|e| DashboardError::Configuration(format!("Invalid auth path: {}", e)))
    }

    /// User from the last successful sign-in, without a network check.
    pub fn cached_user(&self) -> Option<User> {
        self.session.read().as_ref().map(|s| s.user.clone())
    }

    pub fn has_refresh_token(&self) -> bool {
        self.session
            .read()
            .as_ref()
            .map(|s| s.refresh_token.is_some())
            .unwrap_or(false)
    }

    fn clear_session(&self) {
        *self.session.write() = None;
        *self.access_token.write() = None;
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn current_user(&self) -> Result<Option<User>, DashboardError> {
        let Some(token) = self.access_token.read().clone() else {
            return Ok(None);
        };

        let resp = self
            .client
            .get(self.endpoint("user")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| DashboardError::from_request(e, self.timeout_secs))?;

        match resp.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                log::info!("Session expired; treating as signed out");
                self.clear_session();
                Ok(None)
            }
            status if status.is_success() => {
                let user: User = resp
                    .json()
                    .await
                    .map_err(|e| DashboardError::Parse(e.to_string()))?;
                Ok(Some(user))
            }
            status => Err(DashboardError::Service {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<User, DashboardError> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let resp = self
            .client
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| DashboardError::from_request(e, self.timeout_secs))?;

        let status = resp.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            log::warn!("Sign-in rejected for {}", email);
            return Err(DashboardError::NotAuthenticated);
        }
        if !status.is_success() {
            return Err(DashboardError::Service {
                status: status.as_u16(),
                message: resp.text().await.unwrap_or_default(),
            });
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| DashboardError::Parse(e.to_string()))?;
        *self.access_token.write() = Some(token.access_token);
        *self.session.write() = Some(Session {
            refresh_token: token.refresh_token,
            user: token.user.clone(),
        });
        log::info!("Signed in as {}", token.user.email.as_deref().unwrap_or(&token.user.id));
        Ok(token.user)
    }

    async fn sign_out(&self) -> Result<(), DashboardError> {
        let token = self.access_token.read().clone();
        if let Some(token) = token {
            let result = self
                .client
                .post(self.endpoint("logout")?)
                .header("apikey", &self.anon_key)
                .bearer_auth(&token)
                .send()
                .await;
            if let Err(e) = result {
                // local session is dropped regardless
                log::warn!("Sign-out request failed: {}", e);
            }
        }
        self.clear_session();
        Ok(())
    }
}

/// Auth provider with a fixed, locally held user.
#[derive(Default)]
pub struct StaticAuth {
    user: RwLock<Option<User>>,
}

impl StaticAuth {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(user: User) -> Self {
        Self {
            user: RwLock::new(Some(user)),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn current_user(&self) -> Result<Option<User>, DashboardError> {
        Ok(self.user.read().clone())
    }

    async fn sign_in(&self, email: &str, _password: &str) -> Result<User, DashboardError> {
        if email.trim().is_empty() {
            return Err(DashboardError::validation("email", "is required"));
        }
        let user = User {
            id: format!("local-{}", email),
            email: Some(email.to_string()),
        };
        *self.user.write() = Some(user.clone());
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), DashboardError> {
        *self.user.write() = None;
        Ok(())
    }
}
