//! Builds the conversation list shown in the sidebar.

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;

use crate::common::{ConversationEntry, ConversationRow, Message, Participant};
use crate::gateway::Gateway;

/// Derives the conversation list from the backend.
///
/// Every fetch degrades to an empty/default contribution on failure, so a
/// partial list is returned rather than none.
pub struct ConversationSynchronizer {
    gateway: Arc<dyn Gateway>,
}

impl ConversationSynchronizer {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// Real conversations (most recently updated first) followed by one
    /// virtual entry per user without a shared conversation.
    pub async fn load(&self, user_id: &str) -> Vec<ConversationEntry> {
        let conversation_ids = match self.gateway.participant_conversation_ids(user_id).await {
            Ok(ids) => ids,
            Err(err) => {
                log::error!("Error fetching conversations: {err}");
                Vec::new()
            }
        };

        let rows = if conversation_ids.is_empty() {
            Vec::new()
        } else {
            match self
                .gateway
                .conversations_with_participants(&conversation_ids)
                .await
            {
                Ok(rows) => rows,
                Err(err) => {
                    log::error!("Error fetching conversation details: {err}");
                    Vec::new()
                }
            }
        };

        let mut entries = join_all(rows.into_iter().map(|row| self.enrich(row, user_id))).await;

        let others = match self.gateway.users_except(user_id).await {
            Ok(users) => users,
            Err(err) => {
                log::error!("Error fetching users: {err}");
                return entries;
            }
        };

        let shared: HashSet<&str> = entries
            .iter()
            .flat_map(|entry| entry.participants.iter())
            .map(|p| p.user_id.as_str())
            .filter(|id| *id != user_id)
            .collect();

        let placeholders: Vec<ConversationEntry> = others
            .into_iter()
            .filter(|user| !shared.contains(user.id.as_str()))
            .map(ConversationEntry::placeholder_for)
            .collect();

        log::debug!(
            "Loaded {} conversations and {} placeholders for {user_id}",
            entries.len(),
            placeholders.len()
        );
        entries.extend(placeholders);
        entries
    }

    async fn enrich(&self, row: ConversationRow, user_id: &str) -> ConversationEntry {
        let Some(last_message_id) = row.last_message_id.clone() else {
            return ConversationEntry::from_row(row, None, 0);
        };

        let last_message = self.fetch_message(&last_message_id).await;
        let own = row.participants.iter().find(|p| p.user_id == user_id);
        let unread = self.unread_count(&row.id, own).await;

        ConversationEntry::from_row(row, last_message, unread)
    }

    /// Messages in `conversation_id` newer than the participant's last-read
    /// message; 0 when there is no pointer or it cannot be resolved.
    pub async fn unread_count(&self, conversation_id: &str, participant: Option<&Participant>) -> u64 {
        let Some(last_read_id) = participant.and_then(|p| p.last_read_message_id.as_deref()) else {
            return 0;
        };

        let Some(last_read) = self.fetch_message(last_read_id).await else {
            return 0;
        };

        match self
            .gateway
            .count_messages_after(conversation_id, last_read.created_at)
            .await
        {
            Ok(count) => count,
            Err(err) => {
                log::warn!("Error counting unread messages in {conversation_id}: {err}");
                0
            }
        }
    }

    async fn fetch_message(&self, message_id: &str) -> Option<Message> {
        match self.gateway.message(message_id).await {
            Ok(message) => message,
            Err(err) => {
                log::warn!("Error fetching message {message_id}: {err}");
                None
            }
        }
    }
}
