use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::common::{
    AuthSession, AuthUser, ConversationRow, Message, NewMessage, NewParticipant, Participant,
    SharedConversation, SignUpResponse, User,
};
use crate::common::types::SharedConversationFlags;
use crate::error::{GatewayError, GatewayResult};

use super::{AuthApi, Gateway};

/// Gateway operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    ParticipantConversationIds,
    ConversationsWithParticipants,
    Message,
    CountMessagesAfter,
    UsersExcept,
    Messages,
    InsertMessage,
    TouchConversation,
    MarkRead,
    SharedConversations,
    InsertConversation,
    InsertParticipants,
    InsertUser,
    RefreshSession,
}

#[derive(Debug, Clone)]
struct Account {
    email: String,
    password: String,
    user_id: String,
    name: String,
}

#[derive(Default)]
struct Tables {
    accounts: Vec<Account>,
    users: Vec<User>,
    conversations: Vec<ConversationRow>,
    participants: Vec<Participant>,
    messages: Vec<Message>,
    refresh_tokens: Vec<(String, String)>,
    failing: HashSet<GatewayOp>,
    mark_read_calls: usize,
    refresh_calls: usize,
    session_ttl: Option<Duration>,
    last_created_at: Option<DateTime<Utc>>,
}

impl Tables {
    fn check(&self, op: GatewayOp) -> GatewayResult<()> {
        if self.failing.contains(&op) {
            return Err(GatewayError::Api {
                status: 503,
                message: format!("{op:?} unavailable"),
            });
        }
        Ok(())
    }

    /// Strictly increasing timestamps so ordering by `created_at` is total.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_created_at
            && now <= last
        {
            now = last + Duration::microseconds(1);
        }
        self.last_created_at = Some(now);
        now
    }

    fn conversation_ids_of(&self, user_id: &str) -> Vec<String> {
        self.participants
            .iter()
            .filter(|p| p.user_id == user_id)
            .filter_map(|p| p.conversation_id.clone())
            .collect()
    }

    fn issue_session(&mut self, account: &Account) -> AuthSession {
        let refresh_token = Uuid::new_v4().to_string();
        self.refresh_tokens
            .push((refresh_token.clone(), account.user_id.clone()));
        AuthSession {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Some(refresh_token),
            expires_at: Some(Utc::now() + self.session_ttl.unwrap_or(Duration::hours(1))),
            user: AuthUser {
                id: account.user_id.clone(),
                email: account.email.clone(),
                name: account.name.clone(),
            },
        }
    }
}

/// Process-local stand-in for the hosted backend.
#[derive(Default)]
pub struct InMemoryGateway {
    tables: Mutex<Tables>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small seeded world for `--demo` runs.
    pub fn demo() -> Self {
        let gateway = Self::new();
        let alice = gateway.register_account("alice@example.com", "password", "Alice");
        let bob = gateway.register_account("bob@example.com", "password", "Bob");
        gateway.register_account("carol@example.com", "password", "Carol");

        let conversation_id = gateway.add_conversation(false, &[&alice.id, &bob.id]);
        let now = Utc::now();
        gateway.add_message_at(&conversation_id, &bob.id, "Hi Alice!", now - Duration::minutes(5));
        let last = gateway.add_message_at(
            &conversation_id,
            &alice.id,
            "Hey Bob, how are you?",
            now - Duration::minutes(4),
        );
        gateway.set_last_message(&conversation_id, &last.id);
        gateway
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn fail(&self, op: GatewayOp) {
        self.tables().failing.insert(op);
    }

    pub fn recover(&self, op: GatewayOp) {
        self.tables().failing.remove(&op);
    }

    /// Creates an auth account and its profile row.
    pub fn register_account(&self, email: &str, password: &str, name: &str) -> User {
        let mut tables = self.tables();
        let mut user = User::new(Uuid::new_v4().to_string(), name);
        user.email = Some(email.to_string());
        tables.accounts.push(Account {
            email: email.to_string(),
            password: password.to_string(),
            user_id: user.id.clone(),
            name: name.to_string(),
        });
        tables.users.push(user.clone());
        user
    }

    pub fn add_user(&self, user: User) {
        self.tables().users.push(user);
    }

    pub fn add_conversation(&self, is_group: bool, members: &[&str]) -> String {
        let mut tables = self.tables();
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        tables.conversations.push(ConversationRow {
            id: id.clone(),
            name: None,
            is_group,
            created_at: now,
            updated_at: now,
            avatar_url: None,
            last_message_id: None,
            participants: Vec::new(),
        });
        for member in members {
            tables.participants.push(Participant {
                id: Uuid::new_v4().to_string(),
                user_id: member.to_string(),
                conversation_id: Some(id.clone()),
                joined_at: Some(now),
                last_read_message_id: None,
                user: None,
            });
        }
        id
    }

    pub fn add_message_at(
        &self,
        conversation_id: &str,
        sender_id: &str,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Message {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            text: Some(text.to_string()),
            created_at,
            read_by: Vec::new(),
            kind: Default::default(),
            is_pinned: false,
        };
        let mut tables = self.tables();
        if tables.last_created_at.is_none_or(|last| last < created_at) {
            tables.last_created_at = Some(created_at);
        }
        tables.messages.push(message.clone());
        message
    }

    pub fn set_last_message(&self, conversation_id: &str, message_id: &str) {
        let mut tables = self.tables();
        if let Some(row) = tables
            .conversations
            .iter_mut()
            .find(|row| row.id == conversation_id)
        {
            row.last_message_id = Some(message_id.to_string());
        }
    }

    pub fn set_last_read(&self, conversation_id: &str, user_id: &str, message_id: &str) {
        let mut tables = self.tables();
        if let Some(p) = tables.participants.iter_mut().find(|p| {
            p.user_id == user_id && p.conversation_id.as_deref() == Some(conversation_id)
        }) {
            p.last_read_message_id = Some(message_id.to_string());
        }
    }

    pub fn participant(&self, conversation_id: &str, user_id: &str) -> Option<Participant> {
        self.tables()
            .participants
            .iter()
            .find(|p| p.user_id == user_id && p.conversation_id.as_deref() == Some(conversation_id))
            .cloned()
    }

    pub fn conversation(&self, conversation_id: &str) -> Option<ConversationRow> {
        self.tables()
            .conversations
            .iter()
            .find(|row| row.id == conversation_id)
            .cloned()
    }

    pub fn conversation_count(&self) -> usize {
        self.tables().conversations.len()
    }

    pub fn messages_in(&self, conversation_id: &str) -> Vec<Message> {
        self.tables()
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    pub fn user(&self, user_id: &str) -> Option<User> {
        self.tables().users.iter().find(|u| u.id == user_id).cloned()
    }

    pub fn mark_read_calls(&self) -> usize {
        self.tables().mark_read_calls
    }

    /// Lifetime of sessions issued from now on (one hour by default).
    pub fn set_session_ttl(&self, ttl: Duration) {
        self.tables().session_ttl = Some(ttl);
    }

    pub fn refresh_calls(&self) -> usize {
        self.tables().refresh_calls
    }
}

#[async_trait]
impl Gateway for InMemoryGateway {
    async fn participant_conversation_ids(&self, user_id: &str) -> GatewayResult<Vec<String>> {
        let tables = self.tables();
        tables.check(GatewayOp::ParticipantConversationIds)?;
        Ok(tables.conversation_ids_of(user_id))
    }

    async fn conversations_with_participants(
        &self,
        conversation_ids: &[String],
    ) -> GatewayResult<Vec<ConversationRow>> {
        let tables = self.tables();
        tables.check(GatewayOp::ConversationsWithParticipants)?;

        let mut rows: Vec<ConversationRow> = tables
            .conversations
            .iter()
            .filter(|row| conversation_ids.contains(&row.id))
            .cloned()
            .map(|mut row| {
                row.participants = tables
                    .participants
                    .iter()
                    .filter(|p| p.conversation_id.as_deref() == Some(row.id.as_str()))
                    .cloned()
                    .map(|mut p| {
                        p.user = tables.users.iter().find(|u| u.id == p.user_id).cloned();
                        p
                    })
                    .collect();
                row
            })
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows)
    }

    async fn message(&self, message_id: &str) -> GatewayResult<Option<Message>> {
        let tables = self.tables();
        tables.check(GatewayOp::Message)?;
        Ok(tables.messages.iter().find(|m| m.id == message_id).cloned())
    }

    async fn count_messages_after(
        &self,
        conversation_id: &str,
        after: DateTime<Utc>,
    ) -> GatewayResult<u64> {
        let tables = self.tables();
        tables.check(GatewayOp::CountMessagesAfter)?;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id && m.created_at > after)
            .count() as u64)
    }

    async fn users_except(&self, user_id: &str) -> GatewayResult<Vec<User>> {
        let tables = self.tables();
        tables.check(GatewayOp::UsersExcept)?;
        Ok(tables
            .users
            .iter()
            .filter(|u| u.id != user_id)
            .cloned()
            .collect())
    }

    async fn messages(&self, conversation_id: &str) -> GatewayResult<Vec<Message>> {
        let tables = self.tables();
        tables.check(GatewayOp::Messages)?;
        let mut messages: Vec<Message> = tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    async fn insert_message(&self, message: &NewMessage) -> GatewayResult<Message> {
        let mut tables = self.tables();
        tables.check(GatewayOp::InsertMessage)?;
        let created_at = tables.next_timestamp();
        let row = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: message.conversation_id.clone(),
            sender_id: message.sender_id.clone(),
            text: Some(message.text.clone()),
            created_at,
            read_by: Vec::new(),
            kind: message.kind.clone(),
            is_pinned: false,
        };
        tables.messages.push(row.clone());
        Ok(row)
    }

    async fn touch_conversation(
        &self,
        conversation_id: &str,
        last_message_id: &str,
        updated_at: DateTime<Utc>,
    ) -> GatewayResult<()> {
        let mut tables = self.tables();
        tables.check(GatewayOp::TouchConversation)?;
        let row = tables
            .conversations
            .iter_mut()
            .find(|row| row.id == conversation_id)
            .ok_or(GatewayError::NotFound { table: "conversations" })?;
        row.last_message_id = Some(last_message_id.to_string());
        row.updated_at = updated_at;
        Ok(())
    }

    async fn mark_read(&self, participant_id: &str, message_id: &str) -> GatewayResult<()> {
        let mut tables = self.tables();
        tables.check(GatewayOp::MarkRead)?;
        tables.mark_read_calls += 1;
        let participant = tables
            .participants
            .iter_mut()
            .find(|p| p.id == participant_id)
            .ok_or(GatewayError::NotFound { table: "participants" })?;
        participant.last_read_message_id = Some(message_id.to_string());
        Ok(())
    }

    async fn shared_conversations(
        &self,
        user_id: &str,
        conversation_ids: &[String],
    ) -> GatewayResult<Vec<SharedConversation>> {
        let tables = self.tables();
        tables.check(GatewayOp::SharedConversations)?;
        Ok(tables
            .participants
            .iter()
            .filter(|p| p.user_id == user_id)
            .filter_map(|p| p.conversation_id.clone())
            .filter(|id| conversation_ids.contains(id))
            .map(|conversation_id| {
                let conversation = tables
                    .conversations
                    .iter()
                    .find(|row| row.id == conversation_id)
                    .map(|row| SharedConversationFlags {
                        is_group: row.is_group,
                    });
                SharedConversation {
                    conversation_id,
                    conversation,
                }
            })
            .collect())
    }

    async fn insert_conversation(
        &self,
        is_group: bool,
        updated_at: DateTime<Utc>,
    ) -> GatewayResult<ConversationRow> {
        let mut tables = self.tables();
        tables.check(GatewayOp::InsertConversation)?;
        let row = ConversationRow {
            id: Uuid::new_v4().to_string(),
            name: None,
            is_group,
            created_at: Utc::now(),
            updated_at,
            avatar_url: None,
            last_message_id: None,
            participants: Vec::new(),
        };
        tables.conversations.push(row.clone());
        Ok(row)
    }

    async fn insert_participants(&self, rows: &[NewParticipant]) -> GatewayResult<()> {
        let mut tables = self.tables();
        tables.check(GatewayOp::InsertParticipants)?;
        let now = Utc::now();
        for row in rows {
            tables.participants.push(Participant {
                id: Uuid::new_v4().to_string(),
                user_id: row.user_id.clone(),
                conversation_id: Some(row.conversation_id.clone()),
                joined_at: Some(now),
                last_read_message_id: None,
                user: None,
            });
        }
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> GatewayResult<()> {
        let mut tables = self.tables();
        tables.check(GatewayOp::InsertUser)?;
        if tables.users.iter().any(|u| u.id == user.id) {
            return Err(GatewayError::Api {
                status: 409,
                message: "duplicate key value violates unique constraint \"users_pkey\"".into(),
            });
        }
        tables.users.push(user.clone());
        Ok(())
    }
}

#[async_trait]
impl AuthApi for InMemoryGateway {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> GatewayResult<AuthSession> {
        let mut tables = self.tables();
        let account = tables
            .accounts
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email) && a.password == password)
            .cloned()
            .ok_or_else(|| GatewayError::Auth("Invalid login credentials".to_string()))?;
        Ok(tables.issue_session(&account))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> GatewayResult<SignUpResponse> {
        let mut tables = self.tables();
        if tables.accounts.iter().any(|a| a.email.eq_ignore_ascii_case(email)) {
            return Err(GatewayError::Auth("User already registered".to_string()));
        }
        if password.len() < 6 {
            return Err(GatewayError::Auth(
                "Password should be at least 6 characters.".to_string(),
            ));
        }
        let account = Account {
            email: email.to_string(),
            password: password.to_string(),
            user_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        tables.accounts.push(account.clone());
        let session = tables.issue_session(&account);
        Ok(SignUpResponse {
            user: Some(session.user.clone()),
            session: Some(session),
        })
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        Ok(())
    }

    async fn refresh_session(&self, refresh_token: &str) -> GatewayResult<AuthSession> {
        let mut tables = self.tables();
        tables.refresh_calls += 1;
        tables.check(GatewayOp::RefreshSession)?;
        let user_id = tables
            .refresh_tokens
            .iter()
            .find(|(token, _)| token == refresh_token)
            .map(|(_, user_id)| user_id.clone())
            .ok_or_else(|| GatewayError::Auth("Invalid Refresh Token".to_string()))?;
        let account = tables
            .accounts
            .iter()
            .find(|a| a.user_id == user_id)
            .cloned()
            .ok_or_else(|| GatewayError::Auth("User not found".to_string()))?;
        tables.refresh_tokens.retain(|(token, _)| token != refresh_token);
        Ok(tables.issue_session(&account))
    }
}
