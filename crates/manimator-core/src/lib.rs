pub mod api;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod error;
pub mod realtime;
pub mod session;
pub mod state;

// Re-export main types for convenience
pub use api::{AnimationClient, JobAccepted, JobSubmitter, Reasoner, ReasoningClient};
pub use config::Config;
pub use controller::{Controller, Performer};
pub use conversation::Conversation;
pub use error::{ConfigError, PacketError, ReasoningError, RealtimeError, SubmitError};
pub use realtime::{ChannelEvent, EventKind, RealtimeChannel, RealtimeEvent, RealtimeHandle};
pub use session::{Disposition, Effect, Outcome, Session};
pub use state::{ChatEntry, JobId, Phase, Progress, Sender, Ticket};
