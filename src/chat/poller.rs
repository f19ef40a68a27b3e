//! Keeps the active conversation's messages fresh.
//!
//! [`MessageFeed`] hides how snapshots are produced; [`PollingFeed`] refetches
//! on a fixed interval. [`MessagePoller`] binds a feed to the currently
//! selected conversation and tears the previous cycle down on every switch.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::common::{ChatEvent, ConversationKey, Message};
use crate::gateway::Gateway;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Source of message-list snapshots for one conversation.
pub trait MessageFeed: Send + Sync {
    /// Infinite stream of full snapshots, oldest message first. Dropping the
    /// stream cancels it.
    fn observe(&self, conversation_id: String) -> BoxStream<'static, Vec<Message>>;
}

/// Refetches the whole history every `period`.
pub struct PollingFeed {
    gateway: Arc<dyn Gateway>,
    period: Duration,
}

impl PollingFeed {
    pub fn new(gateway: Arc<dyn Gateway>, period: Duration) -> Self {
        Self { gateway, period }
    }
}

impl MessageFeed for PollingFeed {
    fn observe(&self, conversation_id: String) -> BoxStream<'static, Vec<Message>> {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        stream::unfold(
            (self.gateway.clone(), ticker, conversation_id),
            |(gateway, mut ticker, conversation_id)| async move {
                loop {
                    ticker.tick().await;
                    match gateway.messages(&conversation_id).await {
                        Ok(messages) => return Some((messages, (gateway, ticker, conversation_id))),
                        Err(err) => log::error!("Error fetching messages: {err}"),
                    }
                }
            },
        )
        .boxed()
    }
}

/// Where the poller needs to advance the read marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadMarker {
    pub participant_id: String,
    pub last_read_message_id: Option<String>,
}

struct ActiveCycle {
    conversation_id: String,
    task: JoinHandle<()>,
}

impl Drop for ActiveCycle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct MessagePoller {
    feed: Arc<dyn MessageFeed>,
    gateway: Arc<dyn Gateway>,
    events: mpsc::Sender<ChatEvent>,
    seen: Arc<Mutex<HashSet<String>>>,
    active: Option<ActiveCycle>,
}

impl MessagePoller {
    pub fn new(
        feed: Arc<dyn MessageFeed>,
        gateway: Arc<dyn Gateway>,
        events: mpsc::Sender<ChatEvent>,
    ) -> Self {
        Self {
            feed,
            gateway,
            events,
            seen: Arc::new(Mutex::new(HashSet::new())),
            active: None,
        }
    }

    pub fn active_conversation(&self) -> Option<&str> {
        self.active.as_ref().map(|cycle| cycle.conversation_id.as_str())
    }

    /// Point the poller at `target`. The previous cycle is stopped first;
    /// nothing is polled for `None` or a virtual conversation.
    pub fn watch(&mut self, target: Option<&ConversationKey>, read_marker: Option<ReadMarker>) {
        self.stop();
        self.reset_seen();

        let Some(conversation_id) = target.and_then(ConversationKey::conversation_id) else {
            return;
        };

        log::debug!("Polling conversation {conversation_id}");
        let task = tokio::spawn(run_cycle(
            self.feed.observe(conversation_id.to_string()),
            self.gateway.clone(),
            self.events.clone(),
            self.seen.clone(),
            conversation_id.to_string(),
            read_marker,
        ));

        self.active = Some(ActiveCycle {
            conversation_id: conversation_id.to_string(),
            task,
        });
    }

    pub fn stop(&mut self) {
        if let Some(cycle) = self.active.take() {
            log::debug!("Stopped polling conversation {}", cycle.conversation_id);
        }
    }

    /// Record an id produced locally (e.g. by a send) as already seen.
    pub fn remember(&self, message_id: &str) {
        lock(&self.seen).insert(message_id.to_string());
    }

    pub fn has_seen(&self, message_id: &str) -> bool {
        lock(&self.seen).contains(message_id)
    }

    fn reset_seen(&mut self) {
        // Fresh set: an aborted cycle may still hold the old one.
        self.seen = Arc::new(Mutex::new(HashSet::new()));
    }
}

fn lock(seen: &Mutex<HashSet<String>>) -> std::sync::MutexGuard<'_, HashSet<String>> {
    match seen.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

async fn run_cycle(
    mut snapshots: BoxStream<'static, Vec<Message>>,
    gateway: Arc<dyn Gateway>,
    events: mpsc::Sender<ChatEvent>,
    seen: Arc<Mutex<HashSet<String>>>,
    conversation_id: String,
    mut read_marker: Option<ReadMarker>,
) {
    while let Some(messages) = snapshots.next().await {
        lock(&seen).extend(messages.iter().map(|m| m.id.clone()));

        let newest = messages.last().map(|m| m.id.clone());

        let event = ChatEvent::MessagesUpdated {
            conversation_id: conversation_id.clone(),
            messages,
        };
        if events.send(event).await.is_err() {
            break;
        }

        if let (Some(marker), Some(newest)) = (read_marker.as_mut(), newest)
            && marker.last_read_message_id.as_deref() != Some(newest.as_str())
        {
            marker.last_read_message_id = Some(newest.clone());
            let gateway = gateway.clone();
            let participant_id = marker.participant_id.clone();
            tokio::spawn(async move {
                if let Err(err) = gateway.mark_read(&participant_id, &newest).await {
                    log::error!("Error updating last read: {err}");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::InMemoryGateway;
    use chrono::Utc;
    use tokio::time::timeout;

    const PERIOD: Duration = Duration::from_millis(10);

    fn setup() -> (Arc<InMemoryGateway>, MessagePoller, mpsc::Receiver<ChatEvent>) {
        let gateway = Arc::new(InMemoryGateway::new());
        let shared: Arc<dyn Gateway> = gateway.clone();
        let feed: Arc<dyn MessageFeed> = Arc::new(PollingFeed::new(shared.clone(), PERIOD));
        let (tx, rx) = mpsc::channel(256);
        (gateway, MessagePoller::new(feed, shared, tx), rx)
    }

    #[tokio::test]
    async fn feed_yields_full_snapshots() {
        let gateway = Arc::new(InMemoryGateway::new());
        let conversation_id = gateway.add_conversation(false, &["u1", "u2"]);
        gateway.add_message_at(&conversation_id, "u2", "hi", Utc::now());
        let feed = PollingFeed::new(gateway.clone(), PERIOD);

        let mut snapshots = feed.observe(conversation_id);
        let first = timeout(Duration::from_secs(1), snapshots.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.len(), 1);
    }

    #[tokio::test]
    async fn virtual_target_starts_no_cycle() {
        let (_gateway, mut poller, _rx) = setup();
        poller.watch(Some(&ConversationKey::virtual_with("u2")), None);
        assert!(poller.active_conversation().is_none());
    }

    #[tokio::test]
    async fn switching_resets_seen_ids() {
        let (gateway, mut poller, mut rx) = setup();
        let first = gateway.add_conversation(false, &["u1", "u2"]);
        let second = gateway.add_conversation(false, &["u1", "u3"]);
        let message = gateway.add_message_at(&first, "u2", "hi", Utc::now());

        poller.watch(Some(&ConversationKey::real(first.clone())), None);
        assert_eq!(poller.active_conversation(), Some(first.as_str()));
        timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert!(poller.has_seen(&message.id));

        poller.watch(Some(&ConversationKey::real(second.clone())), None);
        assert_eq!(poller.active_conversation(), Some(second.as_str()));
        assert!(!poller.has_seen(&message.id));

        poller.stop();
        assert!(poller.active_conversation().is_none());
    }

    #[tokio::test]
    async fn unchanged_history_marks_read_once() {
        let (gateway, mut poller, mut rx) = setup();
        let conversation_id = gateway.add_conversation(false, &["u1", "u2"]);
        let message = gateway.add_message_at(&conversation_id, "u2", "hi", Utc::now());
        let participant = gateway.participant(&conversation_id, "u1").unwrap();

        poller.watch(
            Some(&ConversationKey::real(conversation_id.clone())),
            Some(ReadMarker {
                participant_id: participant.id,
                last_read_message_id: None,
            }),
        );
        for _ in 0..4 {
            timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        }
        tokio::task::yield_now().await;

        assert_eq!(gateway.mark_read_calls(), 1);
        assert_eq!(
            gateway
                .participant(&conversation_id, "u1")
                .unwrap()
                .last_read_message_id,
            Some(message.id)
        );
    }

    #[tokio::test]
    async fn up_to_date_marker_writes_nothing() {
        let (gateway, mut poller, mut rx) = setup();
        let conversation_id = gateway.add_conversation(false, &["u1", "u2"]);
        let message = gateway.add_message_at(&conversation_id, "u2", "hi", Utc::now());
        let participant = gateway.participant(&conversation_id, "u1").unwrap();

        poller.watch(
            Some(&ConversationKey::real(conversation_id)),
            Some(ReadMarker {
                participant_id: participant.id,
                last_read_message_id: Some(message.id),
            }),
        );
        for _ in 0..3 {
            timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        }
        assert_eq!(gateway.mark_read_calls(), 0);
    }
}
