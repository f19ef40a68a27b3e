pub mod commands;
pub mod conversation;
pub mod events;
pub mod types;

pub use commands::ChatCommand;
pub use conversation::{ConversationEntry, ConversationKey};
pub use events::{AuthForm, ChatEvent};
pub use types::{
    AuthSession, AuthUser, ConversationRow, Message, MessageKind, NewMessage, NewParticipant,
    Participant, SharedConversation, SignUpResponse, User,
};
