use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::JobSubmitter;
use crate::error::SubmitError;
use crate::state::JobId;

#[derive(Serialize)]
struct VisualizeRequest<'a> {
    topic: &'a str,
}

#[derive(Deserialize)]
struct VisualizeResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    // Older servers call it request_id
    #[serde(default, rename = "jobId", alias = "request_id")]
    job_id: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
}

/// Server acknowledgement of a started job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobAccepted {
    pub job_id: JobId,
    pub status: String,
    pub message: String,
}

/// Client for the animation server's `/visualize` endpoint
#[derive(Clone)]
pub struct AnimationClient {
    client: Client,
    endpoint: String,
}

impl AnimationClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    /// Start one animation job. A single attempt; no retry.
    pub async fn submit(&self, topic: &str) -> Result<JobAccepted, SubmitError> {
        debug!(endpoint = %self.endpoint, topic, "submitting animation job");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&VisualizeRequest { topic })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "animation request could not be sent");
                SubmitError::RequestFailed(Some(e))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SubmitError::RequestFailed(Some(e)))?;

        if !status.is_success() {
            warn!(%status, "animation server rejected the request");
            return Err(parse_failure(&body));
        }

        parse_success(&body)
    }
}

#[async_trait::async_trait]
impl JobSubmitter for AnimationClient {
    async fn submit(&self, topic: &str) -> Result<JobAccepted, SubmitError> {
        AnimationClient::submit(self, topic).await
    }
}

fn parse_success(body: &str) -> Result<JobAccepted, SubmitError> {
    let response: VisualizeResponse =
        serde_json::from_str(body).map_err(|_| SubmitError::RequestFailed(None))?;

    let job_id = response
        .job_id
        .filter(|id| !id.is_empty())
        .ok_or(SubmitError::MissingJobId)?;

    Ok(JobAccepted {
        job_id: JobId::new(job_id),
        status: response.status.unwrap_or_default(),
        message: response.message.unwrap_or_default(),
    })
}

/// The server's `error` field when present, the generic failure otherwise
fn parse_failure(body: &str) -> SubmitError {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|r| r.error)
        .filter(|e| !e.is_empty())
        .map(SubmitError::Rejected)
        .unwrap_or(SubmitError::RequestFailed(None))
}
