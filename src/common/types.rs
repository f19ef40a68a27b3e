use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Profile row from the `users` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
            avatar_url: None,
            phone: None,
            status: None,
            created_at: None,
            last_seen: None,
        }
    }
}

/// Tag stored in the `type` column of `messages`. Tags this client does not
/// know are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Voice,
    Client,
    Other(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::Text => "TEXT",
            MessageKind::Image => "IMAGE",
            MessageKind::Voice => "VOICE",
            MessageKind::Client => "CLIENT",
            MessageKind::Other(tag) => tag,
        }
    }
}

impl From<String> for MessageKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "TEXT" => MessageKind::Text,
            "IMAGE" => MessageKind::Image,
            "VOICE" => MessageKind::Voice,
            "CLIENT" => MessageKind::Client,
            _ => MessageKind::Other(tag),
        }
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

/// Row from the `messages` table. Messages are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read_by: Vec<String>,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub is_pinned: bool,
}

/// Payload for inserting into `messages`; the backend assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessage {
    pub conversation_id: String,
    pub sender_id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

/// Row from `participants`, optionally joined with its user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_read_message_id: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewParticipant {
    pub user_id: String,
    pub conversation_id: String,
}

/// Row from `conversations` with its participants embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRow {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub is_group: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub last_message_id: Option<String>,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

/// A participation of one user in a conversation shared with the current user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SharedConversation {
    pub conversation_id: String,
    #[serde(default)]
    pub conversation: Option<SharedConversationFlags>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SharedConversationFlags {
    pub is_group: bool,
}

impl SharedConversation {
    pub fn is_direct(&self) -> bool {
        matches!(self.conversation, Some(SharedConversationFlags { is_group: false }))
    }
}

/// Identity of the signed-in account as reported by the auth API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

/// Tokens plus identity for an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    pub user: AuthUser,
}

/// Result of a sign-up call. `session` is absent when the backend requires
/// email confirmation before the first sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpResponse {
    pub user: Option<AuthUser>,
    pub session: Option<AuthSession>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_kind_keeps_unrecognised_tags_verbatim() {
        let json = r#"{
            "id": "m1",
            "conversation_id": "c1",
            "sender_id": "u1",
            "text": null,
            "created_at": "2025-03-01T10:00:00Z",
            "type": "STICKER"
        }"#;
        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.kind, MessageKind::Other("STICKER".into()));
        assert_eq!(message.kind.as_str(), "STICKER");
        assert!(message.read_by.is_empty());
        assert!(!message.is_pinned);
    }

    #[test]
    fn new_message_serializes_type_column() {
        let payload = NewMessage {
            conversation_id: "c1".into(),
            sender_id: "u1".into(),
            text: "hello".into(),
            kind: MessageKind::Text,
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "TEXT");
        assert_eq!(value["text"], "hello");
    }

    #[test]
    fn shared_conversation_with_missing_join_is_not_direct() {
        let shared: SharedConversation =
            serde_json::from_str(r#"{"conversation_id":"c1","conversation":null}"#).unwrap();
        assert!(!shared.is_direct());

        let shared: SharedConversation = serde_json::from_str(
            r#"{"conversation_id":"c1","conversation":{"is_group":false}}"#,
        )
        .unwrap();
        assert!(shared.is_direct());
    }
}
