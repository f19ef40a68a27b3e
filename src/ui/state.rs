use crate::common::{
    AuthForm, AuthUser, ChatEvent, ConversationEntry, ConversationKey, Message,
};

use super::forms::{SignInForm, SignUpForm};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Loading,
    SignIn,
    SignUp,
    Main,
}

/// Trạng thái cục bộ của UI.
pub struct AppState {
    pub screen: Screen,
    pub user: Option<AuthUser>,
    pub sign_in: SignInForm,
    pub sign_up: SignUpForm,
    /// Informational banner on the sign-in screen.
    pub notice: Option<String>,
    pub conversations: Vec<ConversationEntry>,
    pub loading_conversations: bool,
    pub active: Option<ConversationKey>,
    pub messages: Vec<Message>,
    pub loading_messages: bool,
    pub search: String,
    pub input_text: String,
    /// Last text handed to the worker, put back if the send fails.
    pending_text: Option<String>,
    pub last_error: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            screen: Screen::Loading,
            user: None,
            sign_in: SignInForm::default(),
            sign_up: SignUpForm::default(),
            notice: None,
            conversations: Vec::new(),
            loading_conversations: false,
            active: None,
            messages: Vec::new(),
            loading_messages: false,
            search: String::new(),
            input_text: String::new(),
            pending_text: None,
            last_error: None,
        }
    }

    pub fn user_id(&self) -> &str {
        self.user.as_ref().map(|u| u.id.as_str()).unwrap_or_default()
    }

    pub fn apply(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::SessionChanged(Some(user)) => {
                self.user = Some(user);
                self.screen = Screen::Main;
                self.sign_in = SignInForm::default();
                self.sign_up = SignUpForm::default();
                self.notice = None;
            }
            ChatEvent::SessionChanged(None) => {
                self.user = None;
                if self.screen != Screen::SignUp {
                    self.screen = Screen::SignIn;
                }
                self.sign_in.submitting = false;
                self.sign_up.submitting = false;
                self.conversations.clear();
                self.active = None;
                self.messages.clear();
                self.search.clear();
                self.input_text.clear();
                self.pending_text = None;
            }
            ChatEvent::AuthFailed { form, message } => match form {
                AuthForm::SignIn => self.sign_in.fail(message),
                AuthForm::SignUp => self.sign_up.fail(message),
            },
            ChatEvent::ConfirmationRequired { email } => {
                self.sign_up = SignUpForm::default();
                self.sign_in = SignInForm {
                    email: email.clone(),
                    ..SignInForm::default()
                };
                self.notice = Some(format!(
                    "Check {email} for a confirmation link, then sign in."
                ));
                self.screen = Screen::SignIn;
            }
            ChatEvent::ConversationsLoading => self.loading_conversations = true,
            ChatEvent::ConversationsLoaded(conversations) => {
                self.conversations = conversations;
                self.loading_conversations = false;
            }
            ChatEvent::ActiveConversationChanged(key) => {
                if key != self.active {
                    self.messages.clear();
                }
                self.loading_messages = key.as_ref().is_some_and(ConversationKey::is_real);
                self.active = key;
            }
            ChatEvent::MessagesUpdated {
                conversation_id,
                messages,
            } => {
                let current = self.active.as_ref().and_then(ConversationKey::conversation_id);
                if current == Some(conversation_id.as_str()) {
                    self.messages = messages;
                    self.loading_messages = false;
                } else {
                    log::trace!("Dropping stale snapshot for {conversation_id}");
                }
            }
            ChatEvent::ConversationMaterialized {
                counterpart_user_id,
                conversation_id,
            } => {
                if self.active == Some(ConversationKey::virtual_with(counterpart_user_id)) {
                    self.active = Some(ConversationKey::real(conversation_id));
                }
            }
            ChatEvent::SendFailed(message) => {
                if let Some(text) = self.pending_text.take()
                    && self.input_text.is_empty()
                {
                    self.input_text = text;
                }
                self.last_error = Some(message);
            }
        }
    }

    pub fn show_sign_up(&mut self) {
        self.sign_in.error = None;
        self.notice = None;
        self.screen = Screen::SignUp;
    }

    pub fn show_sign_in(&mut self) {
        self.sign_up.error = None;
        self.screen = Screen::SignIn;
    }

    /// Conversations matching the search box.
    pub fn visible_conversations(&self) -> impl Iterator<Item = &ConversationEntry> {
        let user_id = self.user_id();
        self.conversations
            .iter()
            .filter(move |entry| entry.matches_search(&self.search, user_id))
    }

    pub fn active_entry(&self) -> Option<&ConversationEntry> {
        let key = self.active.as_ref()?;
        self.conversations.iter().find(|entry| &entry.key == key)
    }

    pub fn is_own(&self, message: &Message) -> bool {
        message.sender_id == self.user_id()
    }

    /// Text to send, or `None` when the box is blank or nothing is selected.
    pub fn take_input(&mut self) -> Option<String> {
        if self.active.is_none() || self.input_text.trim().is_empty() {
            return None;
        }
        self.last_error = None;
        let text = std::mem::take(&mut self.input_text);
        self.pending_text = Some(text.clone());
        Some(text)
    }
}
