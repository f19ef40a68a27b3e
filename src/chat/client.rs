use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::common::{
    AuthForm, ChatCommand, ChatEvent, ConversationEntry, ConversationKey,
};
use crate::error::ChatError;
use crate::gateway::Gateway;
use crate::session::{SessionState, SessionStore, SignUpOutcome};

use super::materialize::open_direct_conversation;
use super::poller::{MessageFeed, MessagePoller, ReadMarker};
use super::sender::send_message;
use super::sync::ConversationSynchronizer;

/// Background worker: executes UI commands against the backend and reports
/// the results as [`ChatEvent`]s.
pub struct ChatClient {
    session: SessionStore,
    gateway: Arc<dyn Gateway>,
    synchronizer: ConversationSynchronizer,
    poller: MessagePoller,
    event_sender: mpsc::Sender<ChatEvent>,
    command_receiver: mpsc::Receiver<ChatCommand>,
    conversations: Vec<ConversationEntry>,
    active: Option<ConversationKey>,
}

impl ChatClient {
    pub fn new(
        session: SessionStore,
        gateway: Arc<dyn Gateway>,
        feed: Arc<dyn MessageFeed>,
        event_sender: mpsc::Sender<ChatEvent>,
        command_receiver: mpsc::Receiver<ChatCommand>,
    ) -> Self {
        Self {
            session,
            synchronizer: ConversationSynchronizer::new(gateway.clone()),
            poller: MessagePoller::new(feed, gateway.clone(), event_sender.clone()),
            gateway,
            event_sender,
            command_receiver,
            conversations: Vec::new(),
            active: None,
        }
    }

    /// Runs until the command channel closes.
    pub async fn run(mut self) {
        let mut session_changes = self.session.subscribe();

        self.session.restore().await;
        let initial = session_changes.borrow_and_update().clone();
        self.on_session_change(initial).await;
        log::info!("Chat worker started");

        loop {
            tokio::select! {
                command = self.command_receiver.recv() => {
                    if let Some(command) = command {
                        self.handle_command(command).await;
                    } else {
                        break;
                    }
                }
                changed = session_changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = session_changes.borrow_and_update().clone();
                    self.on_session_change(state).await;
                }
                _ = sleep_for(self.session.refresh_delay()) => {
                    // A failed refresh signs out; the session arm picks that up.
                    if let Err(err) = self.session.refresh().await {
                        log::warn!("Token refresh failed: {err}");
                    }
                }
            }
        }

        self.poller.stop();
        log::info!("Chat worker stopped");
    }

    async fn handle_command(&mut self, command: ChatCommand) {
        match command {
            ChatCommand::SignIn { email, password } => {
                if let Err(err) = self.session.sign_in(&email, &password).await {
                    log::warn!("Sign-in failed for {email}: {err}");
                    self.emit(ChatEvent::AuthFailed {
                        form: AuthForm::SignIn,
                        message: err.to_string(),
                    })
                    .await;
                }
            }
            ChatCommand::SignUp {
                name,
                email,
                password,
            } => match self.session.sign_up(&name, &email, &password).await {
                Ok(SignUpOutcome::SignedIn(_)) => {}
                Ok(SignUpOutcome::ConfirmationRequired(_)) => {
                    self.emit(ChatEvent::ConfirmationRequired { email }).await;
                }
                Err(err) => {
                    log::warn!("Sign-up failed for {email}: {err}");
                    self.emit(ChatEvent::AuthFailed {
                        form: AuthForm::SignUp,
                        message: err.to_string(),
                    })
                    .await;
                }
            },
            ChatCommand::SignOut => self.session.sign_out().await,
            ChatCommand::RefreshConversations => self.reload_conversations().await,
            ChatCommand::SelectConversation(key) => self.select(key).await,
            ChatCommand::SendMessage { text } => self.send(text).await,
        }
    }

    async fn on_session_change(&mut self, state: SessionState) {
        match state {
            SessionState::Loading => {}
            SessionState::SignedIn(user) => {
                self.emit(ChatEvent::SessionChanged(Some(user))).await;
                self.reload_conversations().await;
            }
            SessionState::SignedOut => {
                self.poller.stop();
                self.conversations.clear();
                self.active = None;
                self.emit(ChatEvent::SessionChanged(None)).await;
                self.emit(ChatEvent::ActiveConversationChanged(None)).await;
                self.emit(ChatEvent::ConversationsLoaded(Vec::new())).await;
            }
        }
    }

    async fn reload_conversations(&mut self) {
        let Some(user) = self.session.current_user() else {
            return;
        };

        self.emit(ChatEvent::ConversationsLoading).await;
        self.conversations = self.synchronizer.load(&user.id).await;
        self.emit(ChatEvent::ConversationsLoaded(self.conversations.clone()))
            .await;
    }

    async fn select(&mut self, key: Option<ConversationKey>) {
        let marker = self.read_marker_for(key.as_ref());
        // Stop the old cycle before announcing the switch.
        self.poller.stop();
        self.active = key.clone();
        self.emit(ChatEvent::ActiveConversationChanged(key.clone()))
            .await;
        self.poller.watch(key.as_ref(), marker);
    }

    fn read_marker_for(&self, key: Option<&ConversationKey>) -> Option<ReadMarker> {
        let user = self.session.current_user()?;
        let key = key?;
        let entry = self.conversations.iter().find(|entry| &entry.key == key)?;
        let participant = entry.participant_for(&user.id)?;
        Some(ReadMarker {
            participant_id: participant.id.clone(),
            last_read_message_id: participant.last_read_message_id.clone(),
        })
    }

    /// Sends to the active conversation. A virtual conversation is created
    /// first and replaces the placeholder as the active one.
    async fn send(&mut self, text: String) {
        let Some(user) = self.session.current_user() else {
            return;
        };

        // Checked before materializing: a placeholder only becomes real with a message.
        if text.trim().is_empty() {
            self.emit(ChatEvent::SendFailed(ChatError::EmptyMessage.to_string()))
                .await;
            return;
        }

        let (conversation_id, counterpart) = match self.active.clone() {
            None => {
                log::debug!("No active conversation; message dropped");
                return;
            }
            Some(ConversationKey::Real { conversation_id }) => (conversation_id, None),
            Some(ConversationKey::Virtual {
                counterpart_user_id,
            }) => {
                match open_direct_conversation(
                    self.gateway.as_ref(),
                    &user.id,
                    &counterpart_user_id,
                )
                .await
                {
                    Ok(conversation_id) => (conversation_id, Some(counterpart_user_id)),
                    Err(err) => {
                        log::error!("Create conversation error: {err}");
                        self.emit(ChatEvent::SendFailed(err.to_string())).await;
                        return;
                    }
                }
            }
        };

        let sent = send_message(self.gateway.as_ref(), &user.id, &conversation_id, &text).await;
        if let Err(err) = &sent {
            log::error!("Error sending message: {err}");
            self.emit(ChatEvent::SendFailed(err.to_string())).await;
        }

        self.reload_conversations().await;

        if let Some(counterpart_user_id) = counterpart {
            self.emit(ChatEvent::ConversationMaterialized {
                counterpart_user_id,
                conversation_id: conversation_id.clone(),
            })
            .await;
            self.select(Some(ConversationKey::real(conversation_id)))
                .await;
        }

        if let Ok(message) = sent {
            self.poller.remember(&message.id);
        }
    }

    async fn emit(&self, event: ChatEvent) {
        if let Err(err) = self.event_sender.send(event).await {
            log::warn!("Failed to notify UI: {err}");
        }
    }
}

async fn sleep_for(delay: Option<Duration>) {
    match delay {
        Some(delay) => tokio::time::sleep(delay).await,
        None => std::future::pending().await,
    }
}
