//! Outbound Make.com webhooks.
//!
//! Delivery is best-effort with bounded retry: up to 3 attempts with
//! increasing delays, retrying 5xx and transport errors only. Exhausted or
//! rejected payloads land in `failed_webhooks` for manual replay; nothing
//! here ever fails the calling flow.

pub mod handlers;

use reqwest::Client;
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::attribution::flatten_for_metadata;
use crate::catalog::cart::Cart;
use crate::checkout::session::CustomerInfo;
use crate::errors::AppError;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const MAX_ATTEMPTS: u32 = 3;

/// A 5xx is worth retrying; a 4xx means the payload itself is wrong.
/// Transport errors (no status) retry too.
pub fn should_retry(status: Option<u16>) -> bool {
    match status {
        Some(code) => (500..600).contains(&code),
        None => true,
    }
}

#[derive(Clone)]
pub struct WebhookClient {
    client: Client,
    pool: PgPool,
}

impl WebhookClient {
    pub fn new(pool: PgPool) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            pool,
        }
    }

    /// Delivers a payload, retrying per [`should_retry`]. Never errors;
    /// returns whether the payload was delivered.
    pub async fn send_with_retry(&self, url: &str, payload: Value) -> bool {
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                // Increasing delays: 1s, 2s.
                let delay = std::time::Duration::from_secs(1 << (attempt - 1));
                warn!(
                    "webhook attempt {attempt} failed, retrying after {}s",
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
            }

            match self.client.post(url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("webhook delivered to {url}");
                    return true;
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    if !should_retry(Some(status)) {
                        warn!("webhook to {url} rejected with {status}, not retrying");
                        self.record_failed(url, &payload).await;
                        return false;
                    }
                    warn!("webhook to {url} returned {status}");
                }
                Err(e) => warn!("webhook to {url} failed: {e}"),
            }
        }

        warn!("webhook to {url} exhausted {MAX_ATTEMPTS} attempts, storing payload");
        self.record_failed(url, &payload).await;
        false
    }

    async fn record_failed(&self, url: &str, payload: &Value) {
        let result = sqlx::query(
            "INSERT INTO failed_webhooks (id, url, payload) VALUES ($1, $2, $3)",
        )
        .bind(Uuid::new_v4())
        .bind(url)
        .bind(payload)
        .execute(&self.pool)
        .await;
        if let Err(e) = result {
            warn!("failed to store undelivered webhook for {url}: {e}");
        }
    }
}

/// Flattened challenge-signup payload for the Make.com scenario.
pub fn challenge_signup_payload(
    customer: &CustomerInfo,
    cookie_data: Option<&Value>,
) -> Value {
    let mut payload = json!({
        "first_name": customer.first_name.trim(),
        "last_name": customer.last_name.trim(),
        "email": customer.email.trim(),
        "source": "website",
    });
    if let Some(phone) = customer.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        payload["phone"] = json!(phone.trim());
    }
    if let Some(cookie) = cookie_data {
        for (key, value) in flatten_for_metadata(cookie) {
            payload[key] = json!(value);
        }
    }
    payload
}

/// Flattened abandoned-checkout payload: who, what was in the cart, where
/// they came from.
pub fn abandoned_cart_payload(
    customer: &CustomerInfo,
    cart: &Cart,
    cookie_data: Option<&Value>,
    page_url: Option<&str>,
) -> Result<Value, AppError> {
    let mut payload = json!({
        "first_name": customer.first_name.trim(),
        "last_name": customer.last_name.trim(),
        "email": customer.email.trim(),
        "cart_total": cart.total()?,
        "currency": cart.currency.as_str(),
        "products": cart.summary_json()?,
    });
    if let Some(phone) = customer.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        payload["phone"] = json!(phone.trim());
    }
    if let Some(url) = page_url {
        payload["page_url"] = json!(url);
    }
    if let Some(cookie) = cookie_data {
        for (key, value) in flatten_for_metadata(cookie) {
            payload[key] = json!(value);
        }
    }
    Ok(payload)
}
