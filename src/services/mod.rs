//! Per-view query construction and mutations against the data service.
//!
//! Services never touch the UI store or the query cache directly. Reads
//! return typed rows; writes return a [`MutationOutcome`] naming the cached
//! queries the caller must invalidate.

pub mod accounts;
pub mod campaigns;
pub mod dashboard;
pub mod leads;
pub mod messages;

use crate::queries::Invalidation;

/// Result of a successful write plus the cache entries it made stale.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationOutcome<T> {
    pub value: T,
    pub invalidations: Vec<Invalidation>,
}

impl<T> MutationOutcome<T> {
    pub fn new(value: T, invalidations: Vec<Invalidation>) -> Self {
        Self {
            value,
            invalidations,
        }
    }
}

/// Whole-number percentage, 0 when the denominator is 0.
pub fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round() as u32
}

/// First letter of each word in a display name.
pub fn name_initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}
