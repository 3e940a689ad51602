//! Wire types for the assistant thread/run API.

use serde::{Deserialize, Serialize};

/// Result of creating a thread together with its first run.
#[derive(Debug, Clone)]
pub struct ThreadRun {
    pub thread_id: String,
    pub run_id: String,
}

/// Lifecycle of a remote run as observed through polling.
///
/// Statuses this gateway has no branch for deserialize to `Unknown` and are
/// treated like the non-terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Completed,
    Failed,
    Cancelled,
    Expired,
    #[serde(other)]
    Unknown,
}

/// A run as returned by the status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RunDetails {
    pub id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
}

/// Action the remote run is blocked on.
#[derive(Debug, Clone, Deserialize)]
pub struct RequiredAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub submit_tool_outputs: Option<SubmitToolOutputsAction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitToolOutputsAction {
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

/// A pending tool invocation requested by the assistant.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallFunction {
    pub name: String,
    /// JSON-encoded argument object, verbatim from the wire.
    pub arguments: String,
}

/// One resolved tool output, submitted back to the run.
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

/// A message within a thread.
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadMessage {
    pub role: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<MessageText>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageText {
    pub value: String,
}

/// Extract the newest assistant reply from a newest-first message list.
///
/// Only the first content part of each message is considered; messages whose
/// leading part carries no text are passed over.
pub fn latest_assistant_text(messages: &[ThreadMessage]) -> Option<String> {
    messages
        .iter()
        .filter(|m| m.role == "assistant")
        .find_map(|m| {
            m.content
                .first()
                .and_then(|part| part.text.as_ref())
                .map(|text| text.value.clone())
        })
}
