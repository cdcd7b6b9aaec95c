//! Typed job events delivered over the realtime channel

use serde::Deserialize;
use serde_json::Value;

use crate::error::PacketError;
use crate::state::{JobId, Progress};

/// Names of the events a channel can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Progress,
    Completed,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Progress, EventKind::Completed, EventKind::Error];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Progress => "progress",
            EventKind::Completed => "completed",
            EventKind::Error => "error",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "progress" => Some(EventKind::Progress),
            "completed" => Some(EventKind::Completed),
            "error" => Some(EventKind::Error),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct ProgressPayload {
    progress: f64,
    #[serde(rename = "jobId", alias = "request_id")]
    job_id: String,
}

#[derive(Deserialize)]
struct CompletedPayload {
    #[serde(rename = "videoUrl")]
    video_url: String,
    topic: String,
    #[serde(rename = "jobId", alias = "request_id")]
    job_id: String,
}

#[derive(Deserialize)]
struct ErrorPayload {
    message: String,
    #[serde(rename = "jobId", alias = "request_id")]
    job_id: String,
}

/// One server-pushed event about an animation job
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    Progress {
        job_id: JobId,
        progress: Progress,
    },
    Completed {
        job_id: JobId,
        video_url: String,
        topic: String,
    },
    Error {
        job_id: JobId,
        message: String,
    },
}

impl RealtimeEvent {
    pub fn progress(job_id: &str, percent: f64) -> Self {
        RealtimeEvent::Progress {
            job_id: JobId::new(job_id),
            progress: Progress::from_reported(percent),
        }
    }

    pub fn completed(job_id: &str, video_url: &str, topic: &str) -> Self {
        RealtimeEvent::Completed {
            job_id: JobId::new(job_id),
            video_url: video_url.to_string(),
            topic: topic.to_string(),
        }
    }

    pub fn error(job_id: &str, message: &str) -> Self {
        RealtimeEvent::Error {
            job_id: JobId::new(job_id),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            RealtimeEvent::Progress { .. } => EventKind::Progress,
            RealtimeEvent::Completed { .. } => EventKind::Completed,
            RealtimeEvent::Error { .. } => EventKind::Error,
        }
    }

    pub fn job_id(&self) -> &JobId {
        match self {
            RealtimeEvent::Progress { job_id, .. }
            | RealtimeEvent::Completed { job_id, .. }
            | RealtimeEvent::Error { job_id, .. } => job_id,
        }
    }

    /// Decode the JSON payload of a named event
    pub fn from_payload(kind: EventKind, payload: Value) -> Result<Self, PacketError> {
        let invalid = |e: serde_json::Error| PacketError::InvalidPayload(format!("{}: {}", kind.as_str(), e));

        let event = match kind {
            EventKind::Progress => {
                let p: ProgressPayload = serde_json::from_value(payload).map_err(invalid)?;
                RealtimeEvent::Progress {
                    job_id: JobId::new(p.job_id),
                    progress: Progress::from_reported(p.progress),
                }
            }
            EventKind::Completed => {
                let p: CompletedPayload = serde_json::from_value(payload).map_err(invalid)?;
                RealtimeEvent::Completed {
                    job_id: JobId::new(p.job_id),
                    video_url: p.video_url,
                    topic: p.topic,
                }
            }
            EventKind::Error => {
                let p: ErrorPayload = serde_json::from_value(payload).map_err(invalid)?;
                RealtimeEvent::Error {
                    job_id: JobId::new(p.job_id),
                    message: p.message,
                }
            }
        };
        Ok(event)
    }
}
