//! Client for the remote assistant thread/run API.
//!
//! [`AssistantApi`] is the seam between the orchestrator and the wire: the
//! production implementation is [`OpenAiAssistantClient`], tests substitute
//! scripted fakes.

mod openai;
mod types;

use async_trait::async_trait;

pub use openai::OpenAiAssistantClient;
pub use types::{
    MessageContent, MessageText, RequiredAction, RunDetails, RunStatus, SubmitToolOutputsAction,
    ThreadMessage, ThreadRun, ToolCall, ToolCallFunction, ToolOutput, latest_assistant_text,
};

use crate::error::AssistantError;

/// Operations the gateway needs from the remote assistant API.
///
/// Every call is a single-attempt RPC: it succeeds or fails as one unit, with
/// no retry or backoff at this layer. `delete_thread` is the one exception to
/// error propagation; its failures degrade to a logged `false`.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// Identifier of the assistant this client speaks for.
    fn assistant_id(&self) -> &str;

    /// Create a thread seeded with the first user message and start a run on
    /// it, in one remote call. Only available for brand-new threads.
    async fn create_thread_and_run(&self, first_message: &str)
    -> Result<ThreadRun, AssistantError>;

    /// Append a user message to an existing thread.
    async fn add_message(&self, thread_id: &str, message: &str) -> Result<String, AssistantError>;

    /// Start a run of the configured assistant on an existing thread.
    async fn start_run(&self, thread_id: &str) -> Result<String, AssistantError>;

    /// Fetch the current status of a run, with any required action attached.
    async fn run_details(&self, thread_id: &str, run_id: &str)
    -> Result<RunDetails, AssistantError>;

    /// Submit one batch of tool outputs for a run blocked on
    /// `requires_action`.
    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: Vec<ToolOutput>,
    ) -> Result<(), AssistantError>;

    /// List a thread's messages, newest first (remote API convention).
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>, AssistantError>;

    /// Delete a remote thread. Failures are logged and reported as `false`.
    async fn delete_thread(&self, thread_id: &str) -> bool;
}
