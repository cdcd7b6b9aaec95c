//! Async driver wiring the session to its collaborators

use std::sync::Arc;

use crate::api::{AnimationClient, JobSubmitter, Reasoner, ReasoningClient};
use crate::config::Config;
use crate::realtime::RealtimeEvent;
use crate::session::{Disposition, Effect, Outcome, Session};

/// Runs [`Effect`]s against the server clients.
///
/// Cheap to clone, so a UI can move one into a spawned task and send the
/// resulting [`Outcome`] back to the thread that owns the session.
#[derive(Clone)]
pub struct Performer {
    submitter: Arc<dyn JobSubmitter>,
    reasoner: Arc<dyn Reasoner>,
}

impl Performer {
    pub async fn perform(&self, effect: Effect) -> Outcome {
        match effect {
            Effect::SubmitJob { ticket, topic } => {
                let result = self.submitter.submit(&topic).await;
                Outcome::JobSubmitted {
                    ticket,
                    topic,
                    result,
                }
            }
            Effect::AskReasoner { message } => Outcome::Answered {
                result: self.reasoner.ask(&message).await,
            },
        }
    }
}

pub struct Controller {
    session: Session,
    performer: Performer,
}

impl Controller {
    pub fn new(submitter: Arc<dyn JobSubmitter>, reasoner: Arc<dyn Reasoner>) -> Self {
        Self {
            session: Session::new(),
            performer: Performer {
                submitter,
                reasoner,
            },
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let submitter = AnimationClient::new(&config.submission_endpoint);
        let reasoner = ReasoningClient::new(
            &config.reasoning_endpoint,
            &config.reasoning_model,
            config.credential.as_deref(),
        );
        Self::new(Arc::new(submitter), Arc::new(reasoner))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn performer(&self) -> Performer {
        self.performer.clone()
    }

    /// First half of [`Controller::handle_user_input`]: update state, return the I/O to run
    pub fn begin_input(&mut self, text: &str) -> Option<Effect> {
        self.session.handle_user_input(text)
    }

    /// Second half: fold the I/O result back in
    pub fn apply(&mut self, outcome: Outcome) {
        self.session.apply(outcome);
    }

    /// Handle one line of input end to end, awaiting any request it triggers
    pub async fn handle_user_input(&mut self, text: &str) {
        if let Some(effect) = self.begin_input(text) {
            let outcome = self.performer.perform(effect).await;
            self.apply(outcome);
        }
    }

    pub fn handle_realtime_event(&mut self, event: RealtimeEvent) -> Disposition {
        self.session.handle_realtime_event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::JobAccepted;
    use crate::error::{ReasoningError, SubmitError};
    use crate::session::{EMPTY_TOPIC_MESSAGE, REASONING_FAILED_MESSAGE};
    use crate::state::{JobId, Sender};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSubmitter {
        topics: Mutex<Vec<String>>,
        reject_with: Option<String>,
    }

    #[async_trait]
    impl JobSubmitter for FakeSubmitter {
        async fn submit(&self, topic: &str) -> Result<JobAccepted, SubmitError> {
            let mut topics = self.topics.lock().unwrap();
            topics.push(topic.to_string());
            match &self.reject_with {
                Some(message) => Err(SubmitError::Rejected(message.clone())),
                None => Ok(JobAccepted {
                    job_id: JobId::new(format!("job-{}", topics.len())),
                    status: "success".to_string(),
                    message: String::new(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct FakeReasoner {
        questions: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Reasoner for FakeReasoner {
        async fn ask(&self, message: &str) -> Result<String, ReasoningError> {
            self.questions.lock().unwrap().push(message.to_string());
            if self.fail {
                Err(ReasoningError::NotConfigured)
            } else {
                Ok(format!("answer to {}", message))
            }
        }
    }

    fn controller(
        submitter: FakeSubmitter,
        reasoner: FakeReasoner,
    ) -> (Controller, Arc<FakeSubmitter>, Arc<FakeReasoner>) {
        let submitter = Arc::new(submitter);
        let reasoner = Arc::new(reasoner);
        let controller = Controller::new(submitter.clone(), reasoner.clone());
        (controller, submitter, reasoner)
    }

    #[tokio::test]
    async fn test_empty_topic_never_submits() {
        let (mut controller, submitter, reasoner) = controller(FakeSubmitter::default(), FakeReasoner::default());

        controller.handle_user_input("@visualize ").await;

        assert!(submitter.topics.lock().unwrap().is_empty());
        assert!(reasoner.questions.lock().unwrap().is_empty());
        assert_eq!(controller.session().error(), Some(EMPTY_TOPIC_MESSAGE));
    }

    #[tokio::test]
    async fn test_plain_text_goes_to_reasoner_only() {
        let (mut controller, submitter, reasoner) = controller(FakeSubmitter::default(), FakeReasoner::default());

        controller.handle_user_input("hello").await;

        assert!(submitter.topics.lock().unwrap().is_empty());
        assert_eq!(*reasoner.questions.lock().unwrap(), vec!["hello".to_string()]);
        let entries = controller.session().conversation().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].sender, Sender::System);
        assert_eq!(entries[1].text, "answer to hello");
    }

    #[tokio::test]
    async fn test_reasoner_failure_sets_fixed_message() {
        let reasoner = FakeReasoner {
            fail: true,
            ..Default::default()
        };
        let (mut controller, _, _) = controller(FakeSubmitter::default(), reasoner);

        controller.handle_user_input("hello").await;

        assert_eq!(controller.session().error(), Some(REASONING_FAILED_MESSAGE));
        assert_eq!(controller.session().conversation().len(), 1);
    }

    #[tokio::test]
    async fn test_visualize_submits_trimmed_topic_and_tracks() {
        let (mut controller, submitter, _) = controller(FakeSubmitter::default(), FakeReasoner::default());

        controller.handle_user_input("@visualize   binary search tree  ").await;

        assert_eq!(
            *submitter.topics.lock().unwrap(),
            vec!["binary search tree".to_string()]
        );
        assert_eq!(controller.session().tracked_job(), Some(&JobId::new("job-1")));

        assert_eq!(
            controller.handle_realtime_event(RealtimeEvent::progress("job-1", 40.0)),
            Disposition::Accepted
        );
        assert_eq!(controller.session().progress().percent(), 40);
    }

    #[tokio::test]
    async fn test_submission_rejection_is_reported() {
        let submitter = FakeSubmitter {
            reject_with: Some("Topic is required".to_string()),
            ..Default::default()
        };
        let (mut controller, _, _) = controller(submitter, FakeReasoner::default());

        controller.handle_user_input("@visualize x").await;

        assert_eq!(
            controller.session().error(),
            Some("Failed to generate animation: Topic is required")
        );
        assert_eq!(controller.session().tracked_job(), None);
    }

    #[tokio::test]
    async fn test_split_steps_through_performer() {
        let (mut controller, _, _) = controller(FakeSubmitter::default(), FakeReasoner::default());

        let effect = controller.begin_input("@visualize stacks").expect("submission effect");
        let performer = controller.performer();
        let outcome = tokio::spawn(async move { performer.perform(effect).await })
            .await
            .unwrap();
        controller.apply(outcome);

        assert_eq!(controller.session().tracked_job(), Some(&JobId::new("job-1")));
    }
}
