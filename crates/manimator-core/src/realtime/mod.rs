//! Server-push channel delivering job progress.
//!
//! The animation server speaks Socket.IO. `packet` is the frame codec,
//! `event` the typed job events, and `channel` the connection task that
//! ties them together.

pub mod channel;
pub mod event;
pub mod packet;

pub use channel::{websocket_url, ChannelEvent, RealtimeChannel, RealtimeHandle};
pub use event::{EventKind, RealtimeEvent};
