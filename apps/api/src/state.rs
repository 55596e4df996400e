use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::conversions::PurchaseReporter;
use crate::stripe_client::StripeClient;
use crate::webhooks::WebhookClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub stripe: StripeClient,
    /// Pluggable conversion sink. Production wires the Conversions API
    /// client; tests swap in a recorder.
    pub reporter: Arc<dyn PurchaseReporter>,
    pub webhooks: WebhookClient,
    pub config: Config,
}
