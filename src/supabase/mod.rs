//! Backend-as-a-service integration: table API and auth.
//!
//! `DataService` is the seam every view and mutation goes through.
//! `RestDataService` talks to the hosted PostgREST endpoint;
//! `MemoryDataService` evaluates the same queries over in-memory rows.

pub mod auth;
pub mod memory;
pub mod query;
pub mod rest;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::DashboardError;

pub use auth::{AuthProvider, StaticAuth, SupabaseAuth};
pub use memory::MemoryDataService;
pub use query::{Embed, EmbedKind, Filter, Order, TableQuery};
pub use rest::RestDataService;

#[async_trait]
pub trait DataService: Send + Sync {
    /// Rows matching `query`, projected and ordered as it asks.
    async fn select(&self, query: &TableQuery) -> Result<Vec<Value>, DashboardError>;

    /// Exactly one row; `NotFound` when nothing matches.
    async fn select_single(&self, query: &TableQuery) -> Result<Value, DashboardError>;

    /// Insert one row and return it as stored.
    async fn insert(&self, table: &str, row: Value) -> Result<Value, DashboardError>;

    /// Apply `patch` to every row matching `query`'s filters; returns the
    /// updated rows.
    async fn update(&self, query: &TableQuery, patch: Value) -> Result<Vec<Value>, DashboardError>;
}

/// Deserialize service rows into typed records.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, DashboardError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(DashboardError::from))
        .collect()
}

pub fn decode_row<T: DeserializeOwned>(row: Value) -> Result<T, DashboardError> {
    serde_json::from_value(row).map_err(DashboardError::from)
}
