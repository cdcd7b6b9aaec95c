use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Reasoner;
use crate::error::ReasoningError;

#[derive(Serialize)]
struct CompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<CompletionMessage<'a>>,
    temperature: f32,
    max_completion_tokens: u32,
    top_p: f32,
    stream: bool,
    reasoning_format: &'static str,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionResponseMessage,
}

#[derive(Deserialize)]
struct CompletionResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

/// Chat-completions client used for messages that are not commands
#[derive(Clone)]
pub struct ReasoningClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl ReasoningClient {
    pub fn new(endpoint: &str, model: &str, api_key: Option<&str>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key: api_key.map(str::to_string),
        }
    }

    pub async fn query(&self, message: &str) -> Result<String, ReasoningError> {
        let api_key = self.api_key.as_deref().ok_or(ReasoningError::NotConfigured)?;

        let request = CompletionRequest {
            model: &self.model,
            messages: vec![CompletionMessage {
                role: "user",
                content: message,
            }],
            temperature: 0.6,
            max_completion_tokens: 1024,
            top_p: 0.95,
            stream: false,
            reasoning_format: "raw",
        };

        debug!(model = %self.model, "querying reasoning API");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "reasoning API returned an error");
            return Err(ReasoningError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response.json().await?;
        first_answer(completion)
    }
}

#[async_trait::async_trait]
impl Reasoner for ReasoningClient {
    async fn ask(&self, message: &str) -> Result<String, ReasoningError> {
        self.query(message).await
    }
}

fn first_answer(completion: CompletionResponse) -> Result<String, ReasoningError> {
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or(ReasoningError::EmptyAnswer)
}
