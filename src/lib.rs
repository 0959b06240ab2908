//! LinkBird outreach dashboard core.
//!
//! The UI state store ([`state::UiStore`]) holds view state shared across
//! pages. Views derive query keys from it, fetch through the
//! [`queries::QueryClient`] cache, and talk to Supabase through the
//! [`supabase::DataService`] and [`supabase::AuthProvider`] traits.

pub mod config;
pub mod error;
pub mod notification;
pub mod queries;
pub mod routes;
pub mod services;
pub mod state;
pub mod supabase;
pub mod types;
pub mod views;

pub use error::DashboardError;
pub use state::UiStore;
