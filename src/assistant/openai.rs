//! OpenAI Assistants v2 implementation of [`AssistantApi`].
//!
//! Thin typed adapter over the thread/run/message endpoints. Single-attempt
//! semantics: no retry or backoff here, each call succeeds or fails whole.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::assistant::types::{RunDetails, ThreadMessage, ThreadRun, ToolOutput};
use crate::assistant::AssistantApi;
use crate::config::AssistantConfig;
use crate::error::AssistantError;

/// Per-request timeout, so a hung remote call cannot pin a request task
/// indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const ASSISTANTS_BETA: &str = "assistants=v2";

/// Client for the hosted assistant API.
pub struct OpenAiAssistantClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    assistant_id: String,
}

#[derive(Debug, Deserialize)]
struct CreatedRun {
    id: String,
    #[serde(default)]
    thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<ThreadMessage>,
}

impl OpenAiAssistantClient {
    pub fn new(config: &AssistantConfig) -> Result<Self, AssistantError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AssistantError::RequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            assistant_id: config.assistant_id.clone(),
        })
    }

    /// Set a custom base URL (for testing or alternative endpoints).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.client
            .request(method, url)
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("OpenAI-Beta", ASSISTANTS_BETA)
    }

    async fn send<R: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<R, AssistantError> {
        let response = request
            .send()
            .await
            .map_err(|e| AssistantError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AssistantError::RequestFailed {
                reason: format!("failed to read response body: {e}"),
            })?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AssistantError::AuthFailed);
        }
        if !status.is_success() {
            return Err(AssistantError::RequestFailed {
                reason: format!("HTTP {}: {}", status, truncate(&body, 200)),
            });
        }

        serde_json::from_str(&body).map_err(|e| AssistantError::InvalidResponse {
            reason: format!("JSON parse error: {e}. Raw: {}", truncate(&body, 200)),
        })
    }
}

/// Clip an error body for logging without splitting a code point.
fn truncate(body: &str, max_chars: usize) -> &str {
    match body.char_indices().nth(max_chars) {
        Some((i, _)) => &body[..i],
        None => body,
    }
}

#[async_trait]
impl AssistantApi for OpenAiAssistantClient {
    fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    async fn create_thread_and_run(
        &self,
        first_message: &str,
    ) -> Result<ThreadRun, AssistantError> {
        let body = serde_json::json!({
            "assistant_id": self.assistant_id,
            "stream": false,
            "thread": {
                "messages": [{"role": "user", "content": first_message}]
            }
        });

        let created: CreatedRun = self
            .send(self.request(Method::POST, "threads/runs").json(&body))
            .await?;
        let thread_id = created
            .thread_id
            .ok_or_else(|| AssistantError::InvalidResponse {
                reason: "run creation response carries no thread_id".to_string(),
            })?;

        tracing::info!(thread_id, run_id = %created.id, "created thread and run with first message");
        Ok(ThreadRun {
            thread_id,
            run_id: created.id,
        })
    }

    async fn add_message(&self, thread_id: &str, message: &str) -> Result<String, AssistantError> {
        let body = serde_json::json!({"role": "user", "content": message});
        let created: CreatedMessage = self
            .send(
                self.request(Method::POST, &format!("threads/{thread_id}/messages"))
                    .json(&body),
            )
            .await?;

        tracing::info!(message_id = %created.id, thread_id, "added message to thread");
        Ok(created.id)
    }

    async fn start_run(&self, thread_id: &str) -> Result<String, AssistantError> {
        let body = serde_json::json!({"assistant_id": self.assistant_id, "stream": false});
        let created: CreatedRun = self
            .send(
                self.request(Method::POST, &format!("threads/{thread_id}/runs"))
                    .json(&body),
            )
            .await?;

        tracing::info!(run_id = %created.id, thread_id, "created run for thread");
        Ok(created.id)
    }

    async fn run_details(
        &self,
        thread_id: &str,
        run_id: &str,
    ) -> Result<RunDetails, AssistantError> {
        self.send(self.request(Method::GET, &format!("threads/{thread_id}/runs/{run_id}")))
            .await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<(), AssistantError> {
        let body = serde_json::json!({"tool_outputs": outputs});
        let _: serde_json::Value = self
            .send(
                self.request(
                    Method::POST,
                    &format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs"),
                )
                .json(&body),
            )
            .await?;
        Ok(())
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AssistantError> {
        let list: MessageList = self
            .send(self.request(Method::GET, &format!("threads/{thread_id}/messages")))
            .await?;
        Ok(list.data)
    }

    async fn delete_thread(&self, thread_id: &str) -> bool {
        let result: Result<serde_json::Value, AssistantError> = self
            .send(self.request(Method::DELETE, &format!("threads/{thread_id}")))
            .await;

        match result {
            Ok(_) => {
                tracing::info!(thread_id, "deleted thread");
                true
            }
            Err(e) => {
                tracing::warn!(thread_id, error = %e, "failed to delete thread");
                false
            }
        }
    }
}
