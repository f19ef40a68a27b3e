pub mod client;
pub mod materialize;
pub mod poller;
pub mod sender;
pub mod sync;

pub use client::ChatClient;
pub use materialize::open_direct_conversation;
pub use poller::{MessageFeed, MessagePoller, PollingFeed, ReadMarker};
pub use sender::send_message;
pub use sync::ConversationSynchronizer;
