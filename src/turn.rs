//! The chat-turn orchestrator: create-or-continue, run polling, tool dispatch.
//!
//! One call to [`TurnOrchestrator::run_turn`] drives a whole exchange: pick
//! the first-turn or continuation path, poll the remote run until it reaches
//! a terminal state, resolve order-generation tool calls along the way, and
//! record the completed exchange in the conversation store.

use std::sync::Arc;

use crate::assistant::{AssistantApi, RunDetails, RunStatus, ToolOutput, latest_assistant_text};
use crate::config::PollConfig;
use crate::error::AssistantError;
use crate::orders::OrderService;
use crate::state::ConversationStore;

/// The single tool function this gateway resolves.
const ORDER_FUNCTION: &str = "generate_test_order_only_on_request";

/// Required-action kind the resolver understands.
const SUBMIT_TOOL_OUTPUTS: &str = "submit_tool_outputs";

/// Fallback reply when a completed run left no readable assistant message.
const NO_RESPONSE_MESSAGE: &str = "No response available";

/// Business-level result of a turn that was accepted past validation.
///
/// Initiation failures are the orchestrator's only hard errors; everything
/// after the run exists resolves to one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The run completed and produced a reply.
    Answer {
        thread_id: String,
        response: String,
        turn_count: u32,
    },
    /// The run ended without a reply; `message` is user-facing.
    Failure {
        thread_id: String,
        message: &'static str,
    },
}

/// Terminal states of the poll loop.
#[derive(Debug)]
enum PollOutcome {
    Answer(String),
    Failure(PollFailure),
}

/// Ways a poll loop ends without a reply.
#[derive(Debug, Clone, Copy)]
enum PollFailure {
    RunFailed,
    PollError,
    ToolLoop,
    TimedOut,
}

impl PollFailure {
    fn message(self) -> &'static str {
        match self {
            PollFailure::RunFailed => "The assistant run failed. Please try again.",
            PollFailure::PollError => "Error retrieving response. Please try again.",
            PollFailure::ToolLoop => {
                "The assistant could not complete the requested action. Please try again."
            }
            PollFailure::TimedOut => "Request timed out. Please try again.",
        }
    }
}

/// Drives chat turns against the remote assistant.
pub struct TurnOrchestrator {
    assistant: Arc<dyn AssistantApi>,
    store: Arc<ConversationStore>,
    orders: Arc<OrderService>,
    poll: PollConfig,
}

impl TurnOrchestrator {
    pub fn new(
        assistant: Arc<dyn AssistantApi>,
        store: Arc<ConversationStore>,
        orders: Arc<OrderService>,
        poll: PollConfig,
    ) -> Self {
        Self {
            assistant,
            store,
            orders,
            poll,
        }
    }

    /// Run one chat turn. `thread_id` continues an existing conversation;
    /// `None`, empty, or an id the store does not know starts a new one.
    ///
    /// Errors here are turn-initiation failures only; they happen before any
    /// run exists and are fatal for the request. Once polling starts the
    /// caller always receives a [`TurnOutcome`].
    pub async fn run_turn(
        &self,
        message: &str,
        thread_id: Option<&str>,
    ) -> Result<TurnOutcome, AssistantError> {
        let continuing = thread_id
            .filter(|id| !id.is_empty())
            .filter(|id| self.store.is_active(id));

        let (thread_id, run_id) = match continuing {
            None => {
                // First message: thread and run are created in one call; the
                // combined endpoint only exists for brand-new threads.
                tracing::info!("creating new thread and run for first message");
                let run = self.assistant.create_thread_and_run(message).await?;
                self.store.get_or_create(&run.thread_id);
                self.store
                    .set_assistant_id(&run.thread_id, self.assistant.assistant_id());
                (run.thread_id, run.run_id)
            }
            Some(existing) => {
                tracing::info!(thread_id = existing, "adding message to existing thread");
                self.store.get_or_create(existing);
                let message_id = self.assistant.add_message(existing, message).await?;
                tracing::debug!(message_id = %message_id, thread_id = existing, "message added");
                let run_id = self.assistant.start_run(existing).await?;
                (existing.to_string(), run_id)
            }
        };

        match self.poll_run(&thread_id, &run_id).await {
            PollOutcome::Answer(response) => {
                let state = self.store.update(&thread_id, message, &response);
                Ok(TurnOutcome::Answer {
                    thread_id,
                    response,
                    turn_count: state.turn_count,
                })
            }
            // The exchange never completed: no state update, no turn counted.
            PollOutcome::Failure(failure) => Ok(TurnOutcome::Failure {
                thread_id,
                message: failure.message(),
            }),
        }
    }

    /// Poll a run to a terminal state.
    ///
    /// After a successful tool-output submission the loop re-polls
    /// immediately, consuming neither the sleep nor an attempt; that fast
    /// path is bounded separately by `max_tool_rounds`.
    async fn poll_run(&self, thread_id: &str, run_id: &str) -> PollOutcome {
        let mut attempt = 0;
        let mut tool_rounds = 0;

        while attempt < self.poll.max_attempts {
            let details = match self.assistant.run_details(thread_id, run_id).await {
                Ok(details) => details,
                Err(e) => {
                    tracing::error!(thread_id, run_id, error = %e, "error polling run");
                    return PollOutcome::Failure(PollFailure::PollError);
                }
            };

            match details.status {
                RunStatus::Completed => {
                    return self.fetch_answer(thread_id).await;
                }
                RunStatus::RequiresAction => {
                    tracing::info!(thread_id, run_id, "run requires action, processing tool calls");
                    if self.resolve_tool_calls(thread_id, run_id, &details).await > 0 {
                        tool_rounds += 1;
                        if tool_rounds > self.poll.max_tool_rounds {
                            tracing::warn!(
                                thread_id,
                                run_id,
                                tool_rounds,
                                "run re-entered requires_action too many times"
                            );
                            return PollOutcome::Failure(PollFailure::ToolLoop);
                        }
                        continue;
                    }
                    // Nothing submitted; wait like any non-terminal status.
                }
                RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired => {
                    tracing::warn!(thread_id, run_id, status = ?details.status, "run ended without a reply");
                    return PollOutcome::Failure(PollFailure::RunFailed);
                }
                RunStatus::Queued | RunStatus::InProgress | RunStatus::Unknown => {}
            }

            tokio::time::sleep(self.poll.interval).await;
            attempt += 1;
        }

        tracing::warn!(thread_id, run_id, attempts = attempt, "run polling timed out");
        PollOutcome::Failure(PollFailure::TimedOut)
    }

    async fn fetch_answer(&self, thread_id: &str) -> PollOutcome {
        match self.assistant.list_messages(thread_id).await {
            Ok(messages) => PollOutcome::Answer(
                latest_assistant_text(&messages)
                    .unwrap_or_else(|| NO_RESPONSE_MESSAGE.to_string()),
            ),
            Err(e) => {
                tracing::error!(thread_id, error = %e, "error fetching assistant response");
                PollOutcome::Failure(PollFailure::PollError)
            }
        }
    }

    /// Resolve the pending tool calls of a `requires_action` run and submit
    /// their outputs as one batch. Returns how many outputs were submitted;
    /// zero means the run is left unresolved and the caller keeps waiting.
    async fn resolve_tool_calls(
        &self,
        thread_id: &str,
        run_id: &str,
        details: &RunDetails,
    ) -> usize {
        let Some(action) = details.required_action.as_ref() else {
            return 0;
        };
        if action.kind != SUBMIT_TOOL_OUTPUTS {
            tracing::warn!(kind = %action.kind, "unknown required_action type");
            return 0;
        }
        let Some(submit) = action.submit_tool_outputs.as_ref() else {
            return 0;
        };

        let mut outputs = Vec::new();
        for call in &submit.tool_calls {
            let arguments: serde_json::Value = match serde_json::from_str(&call.function.arguments)
            {
                Ok(value) => value,
                Err(e) => {
                    tracing::error!(call_id = %call.id, error = %e, "malformed tool arguments, skipping call");
                    continue;
                }
            };

            tracing::info!(call_id = %call.id, function = %call.function.name, "processing tool call");

            let output = match call.function.name.as_str() {
                ORDER_FUNCTION => match arguments
                    .get("sku_id")
                    .and_then(|v| v.as_str())
                    .filter(|sku| !sku.is_empty())
                {
                    Some(sku_id) => self.orders.generate_order(sku_id),
                    None => "Error: SKU ID is required but not provided".to_string(),
                },
                unknown => format!("Unknown function: {unknown}"),
            };

            outputs.push(ToolOutput {
                tool_call_id: call.id.clone(),
                output,
            });
        }

        if outputs.is_empty() {
            return 0;
        }

        let count = outputs.len();
        match self
            .assistant
            .submit_tool_outputs(thread_id, run_id, outputs)
            .await
        {
            Ok(()) => {
                tracing::info!(count, "submitted tool outputs");
                count
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to submit tool outputs");
                0
            }
        }
    }
}
