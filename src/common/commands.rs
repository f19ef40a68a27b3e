use super::conversation::ConversationKey;

/// Lệnh UI gửi xuống worker.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    SignIn {
        email: String,
        password: String,
    },
    SignUp {
        name: String,
        email: String,
        password: String,
    },
    SignOut,
    /// Re-derive the conversation list from the backend.
    RefreshConversations,
    /// Change the active conversation; `None` closes the chat window.
    SelectConversation(Option<ConversationKey>),
    /// Send text to the active conversation, creating it first if it is virtual.
    SendMessage {
        text: String,
    },
}
