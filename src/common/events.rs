use super::conversation::{ConversationEntry, ConversationKey};
use super::types::{AuthUser, Message};

/// Which auth form an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthForm {
    SignIn,
    SignUp,
}

/// Sự kiện từ worker gửi lên UI.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    SessionChanged(Option<AuthUser>),
    AuthFailed {
        form: AuthForm,
        message: String,
    },
    /// Sign-up succeeded but the backend wants the address confirmed first.
    ConfirmationRequired {
        email: String,
    },
    ConversationsLoading,
    ConversationsLoaded(Vec<ConversationEntry>),
    ActiveConversationChanged(Option<ConversationKey>),
    /// Full snapshot of one conversation, ascending by creation time.
    MessagesUpdated {
        conversation_id: String,
        messages: Vec<Message>,
    },
    ConversationMaterialized {
        counterpart_user_id: String,
        conversation_id: String,
    },
    SendFailed(String),
}
