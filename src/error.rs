//! Error types for dashboard data access
//!
//! Errors are classified by recoverability:
//! - Retryable: Network issues, timeouts, rate limits, 5xx from the service
//! - NonRetryable: Validation failures, missing rows, bad configuration
//! - RequiresUserAction: Not signed in

use thiserror::Error;

/// Errors surfaced by the data service, the auth provider and local config.
///
/// The UI store never produces these; every store setter is total.
#[derive(Debug, Error)]
pub enum DashboardError {
    // Retryable errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Data service rate limit exceeded")]
    RateLimited,

    // Requires user action
    #[error("User not authenticated")]
    NotAuthenticated,

    // Non-retryable errors
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Data service error {status}: {message}")]
    Service { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl DashboardError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        DashboardError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            DashboardError::Network(_)
            | DashboardError::Timeout(_)
            | DashboardError::RateLimited => true,
            DashboardError::Service { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if this error requires user action to resolve
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            DashboardError::NotAuthenticated | DashboardError::Configuration(_)
        )
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            DashboardError::Network(_) => "Check your internet connection and try again.",
            DashboardError::Timeout(_) => "The request took too long. Try again.",
            DashboardError::RateLimited => "Wait a moment and try again.",
            DashboardError::NotAuthenticated => "Sign in to continue.",
            DashboardError::Validation { .. } => "Please fill in all required fields.",
            DashboardError::NotFound(_) => "The record may have been deleted.",
            DashboardError::Service { .. } => "Please try again.",
            DashboardError::Parse(_) => "The data service returned an unexpected response.",
            DashboardError::Configuration(_) => "Check your configuration in ~/.linkbird/config.json",
            DashboardError::Io(_) => "Check file permissions and disk space.",
        }
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(err: std::io::Error) -> Self {
        DashboardError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(err: serde_json::Error) -> Self {
        DashboardError::Parse(err.to_string())
    }
}

impl DashboardError {
    /// Classify a transport failure. `timeout_secs` is the configured client
    /// timeout, reported back when the request hit it.
    pub fn from_request(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            DashboardError::Timeout(timeout_secs)
        } else if err.is_decode() {
            DashboardError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            DashboardError::Service {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            DashboardError::Network(err.to_string())
        }
    }
}

/// Serializable error representation for presentation layers
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    Retryable,
    NonRetryable,
    RequiresUserAction,
}

impl From<&DashboardError> for ErrorPayload {
    fn from(err: &DashboardError) -> Self {
        let error_type = if err.requires_user_action() {
            ErrorType::RequiresUserAction
        } else if err.is_retryable() {
            ErrorType::Retryable
        } else {
            ErrorType::NonRetryable
        };

        ErrorPayload {
            message: err.to_string(),
            error_type,
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}
