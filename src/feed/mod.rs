//! Live alert feed over a reconnecting WebSocket.

mod connector;
pub mod event;
pub mod reconnect;

pub use connector::{DEFAULT_KEEPALIVE, FeedHandle, FeedUpdate, LiveFeed};
pub use event::{FeedEvent, parse_frame};
pub use reconnect::{Reconnect, ReconnectPolicy};
