//! Request/response correlation and progress state machine
//!
//! `Session` holds the one piece of state that decides which realtime events
//! matter: the job currently being tracked. It performs no I/O itself. User
//! input produces an [`Effect`] for the caller to run, and the result comes
//! back as an [`Outcome`]. Realtime events are offered one at a time and are
//! accepted only when they name the tracked job.

use tracing::{debug, info};

use crate::api::JobAccepted;
use crate::conversation::Conversation;
use crate::error::{ReasoningError, SubmitError};
use crate::realtime::RealtimeEvent;
use crate::state::{ChatEntry, JobId, Phase, Progress, Ticket};

/// Prefix that turns a chat message into an animation request
pub const VISUALIZE_COMMAND: &str = "@visualize";

pub const EMPTY_TOPIC_MESSAGE: &str = "Please specify a topic for visualization.";
pub const REASONING_FAILED_MESSAGE: &str = "Failed to get reasoning response.";

/// I/O the session needs performed on its behalf
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SubmitJob { ticket: Ticket, topic: String },
    AskReasoner { message: String },
}

/// Result of running an [`Effect`]
#[derive(Debug)]
pub enum Outcome {
    JobSubmitted {
        ticket: Ticket,
        topic: String,
        result: Result<JobAccepted, SubmitError>,
    },
    Answered {
        result: Result<String, ReasoningError>,
    },
}

/// Whether an offered realtime event changed anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Accepted,
    Discarded,
}

/// What a line of user input asks for
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Visualize { topic: &'a str },
    Chat,
}

impl<'a> Command<'a> {
    /// `@visualize` must be the first token; `@visualizer` is plain chat
    pub fn parse(text: &'a str) -> Self {
        match text.strip_prefix(VISUALIZE_COMMAND) {
            Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => {
                Command::Visualize { topic: rest.trim() }
            }
            _ => Command::Chat,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    conversation: Conversation,
    phase: Phase,
    progress: Progress,
    error: Option<String>,
    now_playing: Option<String>,
    last_ticket: Option<Ticket>,
    pending_answers: usize,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn tracked_job(&self) -> Option<&JobId> {
        match &self.phase {
            Phase::Tracking { job_id } => Some(job_id),
            _ => None,
        }
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn now_playing(&self) -> Option<&str> {
        self.now_playing.as_deref()
    }

    pub fn is_awaiting_answer(&self) -> bool {
        self.pending_answers > 0
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.phase, Phase::Submitting { .. })
    }

    /// The progress indicator is hidden once an error is shown or the job is at 0 or 100
    pub fn progress_visible(&self) -> bool {
        self.error.is_none() && self.progress.in_flight()
    }

    /// Take one line of user input.
    ///
    /// Blank input is ignored. Anything else is logged to the conversation and
    /// clears the error banner and the now-playing video before it is acted on.
    pub fn handle_user_input(&mut self, text: &str) -> Option<Effect> {
        if text.trim().is_empty() {
            return None;
        }

        self.conversation.append(ChatEntry::user(text));
        self.error = None;
        self.now_playing = None;

        match Command::parse(text) {
            Command::Visualize { topic } if topic.is_empty() => {
                self.error = Some(EMPTY_TOPIC_MESSAGE.to_string());
                None
            }
            Command::Visualize { topic } => {
                let ticket = self.last_ticket.map_or_else(Ticket::first, Ticket::next);
                self.last_ticket = Some(ticket);

                if let Some(previous) = self.tracked_job() {
                    info!(job_id = %previous, "superseding tracked job");
                }
                self.phase = Phase::Submitting { ticket };
                self.progress = Progress::default();

                Some(Effect::SubmitJob {
                    ticket,
                    topic: topic.to_string(),
                })
            }
            Command::Chat => {
                self.pending_answers += 1;
                Some(Effect::AskReasoner {
                    message: text.to_string(),
                })
            }
        }
    }

    /// Feed back the result of an [`Effect`]
    pub fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::JobSubmitted {
                ticket,
                topic,
                result,
            } => self.finish_submission(ticket, &topic, result),
            Outcome::Answered { result } => {
                self.pending_answers = self.pending_answers.saturating_sub(1);
                match result {
                    Ok(answer) => self.conversation.append(ChatEntry::system(answer)),
                    Err(err) => {
                        debug!(error = %err, "reasoning call failed");
                        self.error = Some(REASONING_FAILED_MESSAGE.to_string());
                    }
                }
            }
        }
    }

    fn finish_submission(&mut self, ticket: Ticket, topic: &str, result: Result<JobAccepted, SubmitError>) {
        if self.phase != (Phase::Submitting { ticket }) {
            debug!(ticket = ticket.value(), "discarding response for superseded submission");
            return;
        }

        match result {
            Ok(accepted) => {
                info!(job_id = %accepted.job_id, topic, "tracking animation job");
                self.phase = Phase::Tracking {
                    job_id: accepted.job_id,
                };
                self.progress = Progress::default();
                self.conversation.append(ChatEntry::system(format!(
                    "Animation generation started for: \"{}\"",
                    topic
                )));
            }
            Err(err) => {
                info!(error = %err, topic, "animation submission failed");
                self.phase = Phase::Idle;
                self.error = Some(format!("Failed to generate animation: {}", err));
            }
        }
    }

    /// Offer one event from the shared realtime channel.
    ///
    /// Only events for the tracked job are accepted; everything else,
    /// including events that arrive while idle or submitting, leaves the
    /// session untouched.
    pub fn handle_realtime_event(&mut self, event: RealtimeEvent) -> Disposition {
        if self.tracked_job() != Some(event.job_id()) {
            debug!(
                job_id = %event.job_id(),
                kind = event.kind().as_str(),
                phase = self.phase.label(),
                "discarding realtime event"
            );
            return Disposition::Discarded;
        }

        match event {
            RealtimeEvent::Progress { progress, .. } => {
                self.progress = progress;
            }
            RealtimeEvent::Completed {
                job_id,
                video_url,
                topic,
            } => {
                info!(%job_id, %video_url, "animation completed");
                self.progress = Progress::COMPLETE;
                self.conversation.append(
                    ChatEntry::system(format!("Animation for {} completed!", topic))
                        .with_video(video_url.clone()),
                );
                self.now_playing = Some(video_url);
                self.phase = Phase::Idle;
            }
            RealtimeEvent::Error { job_id, message } => {
                info!(%job_id, %message, "animation job failed");
                self.error = Some(message);
                self.phase = Phase::Idle;
            }
        }
        Disposition::Accepted
    }
}
