//! LinkedIn conversation inbox.
//!
//! Conversations are not stored in the data service yet; the inbox is fed
//! from [`sample_conversations`].

use serde::Serialize;

use super::name_initials;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Sent,
    Connected,
    Replied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub lead_name: String,
    pub last_message: String,
    /// Relative time as shown, e.g. "2 hours ago".
    pub timestamp: String,
    pub status: ConversationStatus,
    pub unread: bool,
}

impl Conversation {
    pub fn initials(&self) -> String {
        name_initials(&self.lead_name)
    }
}

pub fn sample_conversations() -> Vec<Conversation> {
    let conversation = |id: &str, name: &str, message: &str, when: &str, status, unread| {
        Conversation {
            id: id.to_string(),
            lead_name: name.to_string(),
            last_message: message.to_string(),
            timestamp: when.to_string(),
            status,
            unread,
        }
    };
    vec![
        conversation(
            "1",
            "John Smith",
            "Thanks for connecting! I'd love to learn more about your services.",
            "2 hours ago",
            ConversationStatus::Replied,
            false,
        ),
        conversation(
            "2",
            "Sarah Johnson",
            "Initial connection request sent",
            "1 day ago",
            ConversationStatus::Sent,
            false,
        ),
        conversation(
            "3",
            "Mike Davis",
            "Connection accepted",
            "3 days ago",
            ConversationStatus::Connected,
            true,
        ),
    ]
}

/// Case-insensitive substring match on lead name or last message. A blank
/// term keeps everything.
pub fn search_conversations<'a>(
    conversations: &'a [Conversation],
    term: &str,
) -> Vec<&'a Conversation> {
    let term = term.trim().to_lowercase();
    conversations
        .iter()
        .filter(|c| {
            term.is_empty()
                || c.lead_name.to_lowercase().contains(&term)
                || c.last_message.to_lowercase().contains(&term)
        })
        .collect()
}

pub fn unread_count(conversations: &[Conversation]) -> usize {
    conversations.iter().filter(|c| c.unread).count()
}
