pub mod animation;
pub mod reasoning;

pub use animation::{AnimationClient, JobAccepted};
pub use reasoning::ReasoningClient;

use async_trait::async_trait;

use crate::error::{ReasoningError, SubmitError};

/// Starts animation jobs on the rendering server
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    async fn submit(&self, topic: &str) -> Result<JobAccepted, SubmitError>;
}

/// Answers free-form chat messages
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn ask(&self, message: &str) -> Result<String, ReasoningError>;
}
