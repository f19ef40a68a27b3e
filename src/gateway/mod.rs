//! Access to the hosted backend: table reads/writes and the auth API.
//!
//! Everything the client persists goes through these two traits. The REST
//! implementation talks to a PostgREST-style service; the in-memory one backs
//! tests and the `--demo` mode.

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::common::{
    AuthSession, ConversationRow, Message, NewMessage, NewParticipant, SharedConversation,
    SignUpResponse, User,
};
use crate::error::GatewayResult;

pub use memory::InMemoryGateway;
pub use rest::RestGateway;

/// Row-level operations on `users`, `conversations`, `participants`, `messages`.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Ids of conversations `user_id` participates in.
    async fn participant_conversation_ids(&self, user_id: &str) -> GatewayResult<Vec<String>>;

    /// Conversations with the given ids, participants and their users embedded,
    /// most recently updated first.
    async fn conversations_with_participants(
        &self,
        conversation_ids: &[String],
    ) -> GatewayResult<Vec<ConversationRow>>;

    async fn message(&self, message_id: &str) -> GatewayResult<Option<Message>>;

    /// Messages of a conversation created strictly after `after`.
    async fn count_messages_after(
        &self,
        conversation_id: &str,
        after: DateTime<Utc>,
    ) -> GatewayResult<u64>;

    async fn users_except(&self, user_id: &str) -> GatewayResult<Vec<User>>;

    /// Whole history of a conversation, oldest first.
    async fn messages(&self, conversation_id: &str) -> GatewayResult<Vec<Message>>;

    async fn insert_message(&self, message: &NewMessage) -> GatewayResult<Message>;

    /// Point the conversation at its newest message and bump `updated_at`.
    async fn touch_conversation(
        &self,
        conversation_id: &str,
        last_message_id: &str,
        updated_at: DateTime<Utc>,
    ) -> GatewayResult<()>;

    async fn mark_read(&self, participant_id: &str, message_id: &str) -> GatewayResult<()>;

    /// Participations of `user_id` restricted to `conversation_ids`, joined
    /// with the conversation's group flag.
    async fn shared_conversations(
        &self,
        user_id: &str,
        conversation_ids: &[String],
    ) -> GatewayResult<Vec<SharedConversation>>;

    async fn insert_conversation(
        &self,
        is_group: bool,
        updated_at: DateTime<Utc>,
    ) -> GatewayResult<ConversationRow>;

    async fn insert_participants(&self, rows: &[NewParticipant]) -> GatewayResult<()>;

    async fn insert_user(&self, user: &User) -> GatewayResult<()>;
}

/// Password auth. Implementations keep the access token of the latest
/// session and use it for subsequent table calls.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str)
    -> GatewayResult<AuthSession>;

    async fn sign_up(&self, email: &str, password: &str, name: &str)
    -> GatewayResult<SignUpResponse>;

    async fn sign_out(&self) -> GatewayResult<()>;

    async fn refresh_session(&self, refresh_token: &str) -> GatewayResult<AuthSession>;
}
