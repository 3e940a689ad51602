//! Request/response DTOs for the gateway HTTP API.
//!
//! Field casing follows the browser client's wire contract (camelCase).

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    /// Continues an existing conversation; absent for a first message.
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub turn_count: u32,
}

impl ChatResponse {
    /// A failure-shaped response carrying only an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            thread_id: None,
            response: None,
            success: false,
            error_message: Some(message.into()),
            turn_count: 0,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewConversationRequest {
    #[serde(default)]
    pub delete_current_thread: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub sku_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku_id: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn chat_request_accepts_camel_case_thread_id() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"message":"hi","threadId":"thread_1"}"#).unwrap();
        assert_eq!(req.thread_id.as_deref(), Some("thread_1"));

        let req: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert!(req.thread_id.is_none());
    }

    #[test]
    fn chat_response_omits_absent_fields() {
        let body = serde_json::to_value(ChatResponse::error("nope")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"success": false, "errorMessage": "nope", "turnCount": 0})
        );
    }

    #[test]
    fn new_conversation_request_defaults_to_keeping_the_thread() {
        let req: NewConversationRequest = serde_json::from_str("{}").unwrap();
        assert!(!req.delete_current_thread);

        let req: NewConversationRequest =
            serde_json::from_str(r#"{"deleteCurrentThread":true}"#).unwrap();
        assert!(req.delete_current_thread);
    }
}
