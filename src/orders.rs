//! Local test-order synthesizer.
//!
//! Backs the assistant's order-generation tool call and the public order
//! endpoint. Order numbers are epoch-millisecond timestamps kept strictly
//! monotonic across concurrent calls.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::Serialize;

/// A synthesized order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderReceipt {
    pub order_number: String,
    pub sku_id: String,
}

/// Synthesizes order numbers. One instance per process.
#[derive(Default)]
pub struct OrderService {
    last_order_number: AtomicU64,
}

impl OrderService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an order for a SKU. The caller validates the SKU is non-blank.
    pub fn create_order(&self, sku_id: &str) -> OrderReceipt {
        let now_ms = Utc::now().timestamp_millis().max(0) as u64;
        let prev = self
            .last_order_number
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some((prev + 1).max(now_ms))
            })
            .unwrap_or_default();
        let number = (prev + 1).max(now_ms);

        tracing::info!(order_number = number, sku_id, "created order");

        OrderReceipt {
            order_number: number.to_string(),
            sku_id: sku_id.to_string(),
        }
    }

    /// Tool-call entry point: render the order as a human-readable line the
    /// assistant can relay verbatim. Blank SKUs yield an error string, never
    /// a fault.
    pub fn generate_order(&self, sku_id: &str) -> String {
        if sku_id.trim().is_empty() {
            return "Failed to create order: SKU ID is required".to_string();
        }
        let receipt = self.create_order(sku_id);
        format!(
            "Order created successfully. Order Number: {}, SKU: {}",
            receipt.order_number, receipt.sku_id
        )
    }
}
