//! Transient toast notifications
//!
//! Mutations report their outcome here. Query failures do not toast; they
//! render inline in place of the table.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::DashboardError;

/// Toasts kept before the oldest is dropped.
const TOAST_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    Default,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub variant: ToastVariant,
}

impl Toast {
    pub fn success(title: &str, description: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            variant: ToastVariant::Default,
        }
    }

    pub fn error(title: &str, description: &str) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            variant: ToastVariant::Destructive,
        }
    }

    /// Destructive toast for a failed mutation. Validation failures get
    /// their own title; everything else uses `title` and falls back to
    /// `fallback` when the error has nothing useful to say.
    pub fn from_error(title: &str, fallback: &str, err: &DashboardError) -> Self {
        match err {
            DashboardError::Validation { .. } => {
                Self::error("Validation Error", "Please fill in all required fields")
            }
            _ => {
                let message = err.to_string();
                if message.trim().is_empty() {
                    Self::error(title, fallback)
                } else {
                    Self::error(title, &message)
                }
            }
        }
    }
}

#[derive(Default)]
pub struct Toaster {
    queue: Mutex<VecDeque<Toast>>,
}

impl Toaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, toast: Toast) {
        match toast.variant {
            ToastVariant::Destructive => log::warn!("{}: {}", toast.title, toast.description),
            ToastVariant::Default => log::info!("{}: {}", toast.title, toast.description),
        }
        let mut queue = self.queue.lock();
        if queue.len() >= TOAST_LIMIT {
            queue.pop_front();
        }
        queue.push_back(toast);
    }

    /// Take every pending toast, oldest first.
    pub fn drain(&self) -> Vec<Toast> {
        self.queue.lock().drain(..).collect()
    }

    pub fn pending(&self) -> Vec<Toast> {
        self.queue.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_drops_oldest_past_limit() {
        let toaster = Toaster::new();
        for i in 0..7 {
            toaster.push(Toast::success(&format!("t{}", i), ""));
        }
        let titles: Vec<String> = toaster.drain().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["t2", "t3", "t4", "t5", "t6"]);
        assert!(toaster.is_empty());
    }

    #[test]
    fn validation_errors_get_validation_title() {
        let toast = Toast::from_error(
            "Error",
            "Failed to create lead",
            &DashboardError::validation("email", "is required"),
        );
        assert_eq!(toast.title, "Validation Error");
        assert_eq!(toast.variant, ToastVariant::Destructive);
    }

    #[test]
    fn other_errors_carry_message() {
        let toast = Toast::from_error(
            "Error",
            "Failed to create lead",
            &DashboardError::NotAuthenticated,
        );
        assert_eq!(toast.title, "Error");
        assert_eq!(toast.description, "User not authenticated");
    }
}
