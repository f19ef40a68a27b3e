use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{ConversationRow, Message, Participant, User};

/// Identifies an entry of the conversation list.
///
/// A `Virtual` entry stands for "no conversation with this user yet" and is
/// keyed by the counterpart's user id. It becomes `Real` once the first
/// message is sent to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversationKey {
    Virtual { counterpart_user_id: String },
    Real { conversation_id: String },
}

impl ConversationKey {
    pub fn real(conversation_id: impl Into<String>) -> Self {
        ConversationKey::Real {
            conversation_id: conversation_id.into(),
        }
    }

    pub fn virtual_with(counterpart_user_id: impl Into<String>) -> Self {
        ConversationKey::Virtual {
            counterpart_user_id: counterpart_user_id.into(),
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            ConversationKey::Real { conversation_id } => Some(conversation_id),
            ConversationKey::Virtual { .. } => None,
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self, ConversationKey::Real { .. })
    }
}

/// One row of the conversation list, enriched for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationEntry {
    pub key: ConversationKey,
    pub name: Option<String>,
    pub is_group: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub avatar_url: Option<String>,
    pub participants: Vec<Participant>,
    pub last_message: Option<Message>,
    pub unread_count: u64,
}

impl ConversationEntry {
    pub fn from_row(row: ConversationRow, last_message: Option<Message>, unread_count: u64) -> Self {
        Self {
            key: ConversationKey::real(row.id),
            name: row.name,
            is_group: row.is_group,
            created_at: Some(row.created_at),
            updated_at: Some(row.updated_at),
            avatar_url: row.avatar_url,
            participants: row.participants,
            last_message,
            unread_count,
        }
    }

    /// Placeholder for a user the current user has never talked to.
    pub fn placeholder_for(user: User) -> Self {
        Self {
            key: ConversationKey::virtual_with(user.id),
            name: Some(user.name),
            is_group: false,
            created_at: None,
            updated_at: None,
            avatar_url: user.avatar_url,
            participants: Vec::new(),
            last_message: None,
            unread_count: 0,
        }
    }

    pub fn participant_for(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    /// First participant that is not `current_user_id`.
    pub fn counterpart(&self, current_user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id != current_user_id)
    }

    pub fn display_name(&self, current_user_id: &str) -> String {
        if let Some(name) = self.name.as_deref().filter(|name| !name.is_empty()) {
            return name.to_string();
        }

        self.counterpart(current_user_id)
            .and_then(|p| p.user.as_ref())
            .map(|user| user.name.clone())
            .unwrap_or_else(|| "Unknown User".to_string())
    }

    pub fn counterpart_status(&self, current_user_id: &str) -> String {
        self.counterpart(current_user_id)
            .and_then(|p| p.user.as_ref())
            .and_then(|user| user.status.clone())
            .unwrap_or_else(|| "last seen recently".to_string())
    }

    pub fn last_message_preview(&self) -> String {
        match &self.last_message {
            None => String::new(),
            Some(message) => match message.text.as_deref() {
                Some(text) if !text.is_empty() => text.to_string(),
                _ => format!("[{}]", message.kind.as_str()),
            },
        }
    }

    /// Case-insensitive match on the entry name or any other participant's name.
    pub fn matches_search(&self, term: &str, current_user_id: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }

        let name_hit = self
            .name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().contains(&term));

        name_hit
            || self.participants.iter().any(|p| {
                p.user_id != current_user_id
                    && p
                        .user
                        .as_ref()
                        .is_some_and(|user| user.name.to_lowercase().contains(&term))
            })
    }
}
