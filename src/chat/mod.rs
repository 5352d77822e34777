//! Real-time chat core.
//!
//! - [`MessageStore`]: durable, per-conversation ordered message log
//! - [`SessionManager`]: attached connections and their room states
//! - [`RoomBroadcaster`]: room subscriptions and fan-out
//! - [`ChatGateway`]: join/leave/send/history orchestration

mod broadcaster;
mod gateway;
mod message;
mod session;
mod store;

pub use broadcaster::{PublishReport, Push, PushSender, RoomBroadcaster};
pub use gateway::{ChatGateway, HistoryPage};
pub use message::{validate_body, Message, SenderRole};
pub use session::{
    Connection, ConnectionId, ConnectionInfo, JoinTicket, RoomState, SessionManager,
};
pub use store::{ClockGuard, ConversationClock, MessageStore};
