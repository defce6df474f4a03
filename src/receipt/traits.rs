// ReceiptExtractor trait — vision-model-agnostic extraction interface.
//
// The Gemini implementation is the only production backend today; the
// trait keeps the call sites (CLI, web handler) independent of it.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Structured fields read off a fuel receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Total amount paid, in MXN.
    pub total: f64,
    /// Fuel volume in liters.
    pub quantity: f64,
    /// Purchase date as printed on the ticket.
    pub date: String,
    /// Fuel product name.
    pub product: String,
    /// Numeric station code (the one after "ESTACION", not the origin code).
    pub station: i64,
    /// Station street address.
    pub address: String,
}

impl Receipt {
    /// The neutral record returned when a ticket can't be read — callers
    /// surface it instead of failing the request.
    pub fn unreadable() -> Self {
        Self {
            total: 0.0,
            quantity: 0.0,
            date: "None".to_string(),
            product: "None".to_string(),
            station: 0,
            address: "None".to_string(),
        }
    }
}

#[async_trait]
pub trait ReceiptExtractor: Send + Sync {
    /// Extract structured fields from a receipt image.
    async fn extract(&self, image: &[u8]) -> Result<Receipt>;
}
