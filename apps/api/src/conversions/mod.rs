//! Purchase conversion reporting.
//!
//! One logical purchase fans out to three sinks: the browser pixel (the
//! page fires it with the payload we return), the server-side Conversions
//! API, and the internal analytics store. All three carry the same
//! `event_id` so the ad platform can deduplicate browser vs server events.

pub mod capi;
pub mod handlers;
pub mod purchase;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub id: String,
    pub quantity: i64,
    pub item_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseEvent {
    pub event_id: String,
    pub value: f64,
    /// ISO code, uppercase ("USD").
    pub currency: String,
    pub content_ids: Vec<String>,
    pub contents: Vec<Content>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub fbclid: Option<String>,
    pub source_url: Option<String>,
}

/// Where server-side Purchase events go. Carried in `AppState` as
/// `Arc<dyn PurchaseReporter>`; production wires the Conversions API client,
/// tests swap in a recorder.
#[async_trait]
pub trait PurchaseReporter: Send + Sync {
    async fn report(&self, event: &PurchaseEvent) -> Result<()>;
}
