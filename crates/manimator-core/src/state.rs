//! UI-agnostic conversation and job types
//!
//! These are shared by the state machine and any front end that renders it,
//! and don't depend on a specific UI framework.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single entry in the chat log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub text: String,
    pub sender: Sender,
    /// Set only on entries produced by a completed animation job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_reference: Option<String>,
}

impl ChatEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            video_reference: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::System,
            video_reference: None,
        }
    }

    pub fn with_video(mut self, url: impl Into<String>) -> Self {
        self.video_reference = Some(url.into());
        self
    }
}

/// Who produced a chat entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    System,
}

/// Server-issued identifier of one animation job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Sequence number of a submission request.
///
/// Lets the state machine tell the response to the latest `@visualize`
/// command apart from a response to one it has since superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub(crate) fn first() -> Self {
        Self(1)
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

/// Where the correlation state machine currently stands
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    /// No job is tracked
    #[default]
    Idle,
    /// A submission request is in flight
    Submitting { ticket: Ticket },
    /// Realtime events are filtered down to this job
    Tracking { job_id: JobId },
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Submitting { .. } => "submitting",
            Phase::Tracking { .. } => "tracking",
        }
    }
}

/// Generation progress of the tracked job, as a percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    percent: u8,
}

impl Progress {
    pub const COMPLETE: Progress = Progress { percent: 100 };

    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Convert a wire value, rounding and clamping into `0..=100`
    pub fn from_reported(value: f64) -> Self {
        let percent = if value.is_nan() {
            0
        } else {
            value.round().clamp(0.0, 100.0) as u8
        };
        Self { percent }
    }

    /// True while a job is partway through
    pub fn in_flight(&self) -> bool {
        self.percent > 0 && self.percent < 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_from_reported_clamps() {
        assert_eq!(Progress::from_reported(40.0).percent(), 40);
        assert_eq!(Progress::from_reported(39.6).percent(), 40);
        assert_eq!(Progress::from_reported(-5.0).percent(), 0);
        assert_eq!(Progress::from_reported(250.0).percent(), 100);
        assert_eq!(Progress::from_reported(f64::NAN).percent(), 0);
    }

    #[test]
    fn test_progress_in_flight_excludes_bounds() {
        assert!(!Progress::default().in_flight());
        assert!(Progress::from_reported(1.0).in_flight());
        assert!(!Progress::COMPLETE.in_flight());
    }

    #[test]
    fn test_chat_entry_serializes_without_empty_video() {
        let json = serde_json::to_string(&ChatEntry::user("hi")).unwrap();
        assert_eq!(json, r#"{"text":"hi","sender":"user"}"#);

        let entry = ChatEntry::system("done").with_video("https://x/v.mp4");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(r#""video_reference":"https://x/v.mp4""#));
    }
}
