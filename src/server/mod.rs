//! Axum HTTP server for the gateway.
//!
//! Routes: conversation API, order API, health, and the embedded browser UI.

pub mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{Method, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::assistant::AssistantApi;
use crate::error::GatewayError;
use crate::orders::OrderService;
use crate::safety::{SafetyFilter, SafetyVerdict};
use crate::server::types::*;
use crate::state::ConversationStore;
use crate::turn::{TurnOrchestrator, TurnOutcome};

/// Shared state for all gateway handlers.
pub struct AppState {
    pub orchestrator: TurnOrchestrator,
    pub store: Arc<ConversationStore>,
    pub assistant: Arc<dyn AssistantApi>,
    pub orders: Arc<OrderService>,
    pub safety: SafetyFilter,
    /// Shutdown signal sender.
    pub shutdown_tx: tokio::sync::RwLock<Option<oneshot::Sender<()>>>,
}

impl AppState {
    /// Ask the server task to shut down gracefully.
    pub async fn shutdown(&self) {
        if let Some(tx) = self.shutdown_tx.write().await.take() {
            let _ = tx.send(());
        }
    }
}

/// Start the gateway HTTP server.
///
/// Returns the actual bound `SocketAddr` (useful when binding to port 0).
pub async fn start_server(
    addr: SocketAddr,
    state: Arc<AppState>,
) -> Result<SocketAddr, GatewayError> {
    let listener =
        tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::StartupFailed {
                reason: format!("Failed to bind to {}: {}", addr, e),
            })?;
    let bound_addr = listener
        .local_addr()
        .map_err(|e| GatewayError::StartupFailed {
            reason: format!("Failed to get local addr: {}", e),
        })?;

    // The UI is a plain browser client; keep CORS open for it.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let app = Router::new()
        // Static UI
        .route("/", get(index_handler))
        .route("/style.css", get(css_handler))
        .route("/app.js", get(js_handler))
        // Conversation API
        .route("/api/conversation/chat", post(chat_handler))
        .route("/api/conversation/new", post(new_conversation_handler))
        .route("/api/conversation/status/{thread_id}", get(status_handler))
        // Order API
        .route("/api/orders/create", post(create_order_handler))
        // Health
        .route("/api/health", get(health_handler))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(cors)
        .with_state(state.clone());

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    *state.shutdown_tx.write().await = Some(shutdown_tx);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("gateway shutting down");
            })
            .await
        {
            tracing::error!("gateway server error: {}", e);
        }
    });

    Ok(bound_addr)
}

// --- Static file handlers ---

async fn index_handler() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        include_str!("static/index.html"),
    )
}

async fn css_handler() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/css"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        include_str!("static/style.css"),
    )
}

async fn js_handler() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        include_str!("static/app.js"),
    )
}

// --- Health ---

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "synthgate",
    })
}

// --- Conversation handlers ---

async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ChatResponse>) {
    let request_id = Uuid::new_v4();

    // Blank-input validation happens before the safety filter runs.
    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ChatResponse::error("Message cannot be empty")),
        );
    }

    let sanitized = match state.safety.classify(&req.message) {
        SafetyVerdict::Rejected { reason } => {
            return (StatusCode::BAD_REQUEST, Json(ChatResponse::error(reason)));
        }
        SafetyVerdict::Allowed { sanitized } => sanitized,
    };

    match state
        .orchestrator
        .run_turn(&sanitized, req.thread_id.as_deref())
        .await
    {
        Ok(TurnOutcome::Answer {
            thread_id,
            response,
            turn_count,
        }) => (
            StatusCode::OK,
            Json(ChatResponse {
                thread_id: Some(thread_id),
                response: Some(response),
                success: true,
                error_message: None,
                turn_count,
            }),
        ),
        // Business failure on a healthy transport: 200 with success=false.
        Ok(TurnOutcome::Failure { thread_id, message }) => (
            StatusCode::OK,
            Json(ChatResponse {
                thread_id: Some(thread_id),
                response: None,
                success: false,
                error_message: Some(message.to_string()),
                turn_count: 0,
            }),
        ),
        // Turn initiation never reached the run: upstream fault, fatal.
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "turn initiation failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(ChatResponse::error(format!(
                    "An error occurred while processing your request: {e}"
                ))),
            )
        }
    }
}

async fn new_conversation_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> (StatusCode, Json<ChatResponse>) {
    // The body is optional; an empty one means "keep the remote thread".
    let req: NewConversationRequest = if body.is_empty() {
        NewConversationRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(req) => req,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ChatResponse::error(format!("Invalid JSON body: {e}"))),
                );
            }
        }
    };

    if req.delete_current_thread {
        if let Some(current) = state.store.current_thread_id() {
            tracing::info!(thread_id = %current, "deleting current thread");
            if state.assistant.delete_thread(&current).await {
                tracing::info!(thread_id = %current, "successfully deleted thread");
            } else {
                tracing::warn!(thread_id = %current, "failed to delete thread");
            }
        }
    }

    // Local state is always cleared, whatever happened remotely.
    state.store.clear_all();

    (
        StatusCode::OK,
        Json(ChatResponse {
            thread_id: None, // created on the first message
            response: Some("New conversation ready. Send your first message to start!".to_string()),
            success: true,
            error_message: None,
            turn_count: 0,
        }),
    )
}

async fn status_handler(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> Result<Json<ChatResponse>, StatusCode> {
    match state.store.get(&thread_id) {
        Some(conversation) => Ok(Json(ChatResponse {
            thread_id: Some(thread_id),
            response: None,
            success: true,
            error_message: None,
            turn_count: conversation.turn_count,
        })),
        None => Err(StatusCode::NOT_FOUND),
    }
}

// --- Order handlers ---

async fn create_order_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OrderRequest>,
) -> (StatusCode, Json<OrderResponse>) {
    if req.sku_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(OrderResponse {
                order_number: None,
                sku_id: None,
                success: false,
                message: Some("SKU ID is required".to_string()),
            }),
        );
    }

    let receipt = state.orders.create_order(&req.sku_id);

    (
        StatusCode::OK,
        Json(OrderResponse {
            order_number: Some(receipt.order_number),
            sku_id: Some(receipt.sku_id),
            success: true,
            message: Some("Order created successfully".to_string()),
        }),
    )
}
