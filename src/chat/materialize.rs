use chrono::Utc;

use crate::common::NewParticipant;
use crate::error::ChatError;
use crate::gateway::Gateway;

/// Id of a direct conversation between `user_id` and `target_user_id`,
/// creating it (with both participants) when none exists.
///
/// Two concurrent calls for the same pair can both miss the lookup and each
/// create a conversation; nothing here prevents that.
pub async fn open_direct_conversation(
    gateway: &dyn Gateway,
    user_id: &str,
    target_user_id: &str,
) -> Result<String, ChatError> {
    if target_user_id.is_empty() {
        return Err(ChatError::MissingTarget);
    }

    if let Some(existing) = find_direct_conversation(gateway, user_id, target_user_id).await {
        log::debug!("Reusing conversation {existing} with {target_user_id}");
        return Ok(existing);
    }

    let conversation = gateway
        .insert_conversation(false, Utc::now())
        .await
        .map_err(ChatError::ConversationCreate)?;

    gateway
        .insert_participants(&[
            NewParticipant {
                user_id: user_id.to_string(),
                conversation_id: conversation.id.clone(),
            },
            NewParticipant {
                user_id: target_user_id.to_string(),
                conversation_id: conversation.id.clone(),
            },
        ])
        .await
        .map_err(ChatError::Participants)?;

    log::info!(
        "Created conversation {} between {user_id} and {target_user_id}",
        conversation.id
    );
    Ok(conversation.id)
}

async fn find_direct_conversation(
    gateway: &dyn Gateway,
    user_id: &str,
    target_user_id: &str,
) -> Option<String> {
    let own = match gateway.participant_conversation_ids(user_id).await {
        Ok(ids) => ids,
        Err(err) => {
            log::error!("Error looking up existing conversations: {err}");
            return None;
        }
    };
    if own.is_empty() {
        return None;
    }

    match gateway.shared_conversations(target_user_id, &own).await {
        Ok(shared) => shared
            .into_iter()
            .find(|s| s.is_direct())
            .map(|s| s.conversation_id),
        Err(err) => {
            log::error!("Error looking up shared conversations: {err}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::InMemoryGateway;
    use crate::gateway::memory::GatewayOp;

    #[tokio::test]
    async fn empty_target_is_rejected() {
        let gateway = InMemoryGateway::new();
        let result = open_direct_conversation(&gateway, "u1", "").await;
        assert!(matches!(result, Err(ChatError::MissingTarget)));
        assert_eq!(gateway.conversation_count(), 0);
    }

    #[tokio::test]
    async fn creates_conversation_with_both_participants() {
        let gateway = InMemoryGateway::new();
        let id = open_direct_conversation(&gateway, "u1", "u2").await.unwrap();

        let row = gateway.conversation(&id).unwrap();
        assert!(!row.is_group);
        assert!(gateway.participant(&id, "u1").is_some());
        assert!(gateway.participant(&id, "u2").is_some());
    }

    #[tokio::test]
    async fn reuses_existing_direct_conversation() {
        let gateway = InMemoryGateway::new();
        let existing = gateway.add_conversation(false, &["u1", "u2"]);

        let id = open_direct_conversation(&gateway, "u1", "u2").await.unwrap();
        assert_eq!(id, existing);
        assert_eq!(gateway.conversation_count(), 1);
    }

    #[tokio::test]
    async fn group_membership_does_not_count_as_direct() {
        let gateway = InMemoryGateway::new();
        let group = gateway.add_conversation(true, &["u1", "u2", "u3"]);

        let id = open_direct_conversation(&gateway, "u1", "u2").await.unwrap();
        assert_ne!(id, group);
        assert_eq!(gateway.conversation_count(), 2);
    }

    #[tokio::test]
    async fn creation_failure_maps_to_conversation_error() {
        let gateway = InMemoryGateway::new();
        gateway.fail(GatewayOp::InsertConversation);

        let err = open_direct_conversation(&gateway, "u1", "u2").await.unwrap_err();
        assert!(matches!(err, ChatError::ConversationCreate(_)));
        assert_eq!(err.to_string(), "Failed to create conversation");
    }

    #[tokio::test]
    async fn participant_failure_is_distinct() {
        let gateway = InMemoryGateway::new();
        gateway.fail(GatewayOp::InsertParticipants);

        let err = open_direct_conversation(&gateway, "u1", "u2").await.unwrap_err();
        assert!(matches!(err, ChatError::Participants(_)));
    }
}
