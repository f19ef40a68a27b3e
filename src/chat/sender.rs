use chrono::Utc;

use crate::common::{Message, MessageKind, NewMessage};
use crate::error::ChatError;
use crate::gateway::Gateway;

/// Append a text message, then point the conversation at it.
///
/// The pointer update is best-effort: if it fails the message still exists
/// and the list preview/order catches up on the next successful update.
pub async fn send_message(
    gateway: &dyn Gateway,
    sender_id: &str,
    conversation_id: &str,
    text: &str,
) -> Result<Message, ChatError> {
    if text.trim().is_empty() {
        return Err(ChatError::EmptyMessage);
    }

    let message = gateway
        .insert_message(&NewMessage {
            conversation_id: conversation_id.to_string(),
            sender_id: sender_id.to_string(),
            text: text.to_string(),
            kind: MessageKind::Text,
        })
        .await?;
    log::info!("Message {} sent to {conversation_id}", message.id);

    if let Err(err) = gateway
        .touch_conversation(conversation_id, &message.id, Utc::now())
        .await
    {
        log::error!("Error updating conversation {conversation_id}: {err}");
    }

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::InMemoryGateway;
    use crate::gateway::memory::GatewayOp;

    #[tokio::test]
    async fn blank_text_is_rejected_without_writing() {
        let gateway = InMemoryGateway::new();
        let conversation_id = gateway.add_conversation(false, &["u1", "u2"]);

        let result = send_message(&gateway, "u1", &conversation_id, "   ").await;
        assert!(matches!(result, Err(ChatError::EmptyMessage)));
        assert!(gateway.messages_in(&conversation_id).is_empty());
    }

    #[tokio::test]
    async fn sent_message_becomes_the_last_message() {
        let gateway = InMemoryGateway::new();
        let conversation_id = gateway.add_conversation(false, &["u1", "u2"]);

        let message = send_message(&gateway, "u1", &conversation_id, "hello")
            .await
            .unwrap();

        assert_eq!(message.text.as_deref(), Some("hello"));
        assert_eq!(message.kind, MessageKind::Text);
        let row = gateway.conversation(&conversation_id).unwrap();
        assert_eq!(row.last_message_id, Some(message.id));
    }

    #[tokio::test]
    async fn pointer_failure_still_returns_the_message() {
        let gateway = InMemoryGateway::new();
        let conversation_id = gateway.add_conversation(false, &["u1", "u2"]);
        gateway.fail(GatewayOp::TouchConversation);

        let message = send_message(&gateway, "u1", &conversation_id, "hello").await;
        assert!(message.is_ok());
        assert_eq!(gateway.messages_in(&conversation_id).len(), 1);
        assert_eq!(gateway.conversation(&conversation_id).unwrap().last_message_id, None);
    }

    #[tokio::test]
    async fn insert_failure_is_reported() {
        let gateway = InMemoryGateway::new();
        let conversation_id = gateway.add_conversation(false, &["u1", "u2"]);
        gateway.fail(GatewayOp::InsertMessage);

        let result = send_message(&gateway, "u1", &conversation_id, "hello").await;
        assert!(matches!(result, Err(ChatError::Gateway(_))));
    }
}
