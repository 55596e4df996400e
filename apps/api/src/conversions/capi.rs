use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::conversions::{PurchaseEvent, PurchaseReporter};

const GRAPH_API_URL: &str = "https://graph.facebook.com/v18.0";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Facebook Conversions API client.
#[derive(Clone)]
pub struct CapiClient {
    client: Client,
    pixel_id: String,
    access_token: String,
}

impl CapiClient {
    pub fn new(pixel_id: String, access_token: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            pixel_id,
            access_token,
        }
    }
}

/// SHA-256 of the normalized identifier (trimmed, lowercased), hex-encoded.
/// The Conversions API matches on hashed identifiers only.
pub fn hash_identifier(raw: &str) -> String {
    let normalized = raw.trim().to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Phone numbers hash digits-only (no spaces, dashes or leading plus).
pub fn hash_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    hash_identifier(&digits)
}

/// Reconstructs the `fbc` click-id parameter from a stored fbclid.
pub fn fbc_value(fbclid: &str, event_time: i64) -> String {
    format!("fb.1.{}.{}", event_time * 1000, fbclid)
}

/// The events payload for one Purchase. Pure so the shape is testable.
pub fn build_payload(event: &PurchaseEvent, event_time: i64) -> Value {
    let mut user_data = serde_json::Map::new();
    if let Some(email) = &event.customer_email {
        user_data.insert("em".to_string(), json!([hash_identifier(email)]));
    }
    if let Some(phone) = &event.customer_phone {
        user_data.insert("ph".to_string(), json!([hash_phone(phone)]));
    }
    if let Some(fbclid) = &event.fbclid {
        user_data.insert("fbc".to_string(), json!(fbc_value(fbclid, event_time)));
    }

    let mut body = json!({
        "event_name": "Purchase",
        "event_time": event_time,
        "event_id": event.event_id,
        "action_source": "website",
        "user_data": user_data,
        "custom_data": {
            "value": event.value,
            "currency": event.currency,
            "content_ids": event.content_ids,
            "contents": event.contents,
            "content_type": "product",
        },
    });
    if let Some(url) = &event.source_url {
        body["event_source_url"] = json!(url);
    }

    json!({ "data": [body] })
}

#[async_trait]
impl PurchaseReporter for CapiClient {
    async fn report(&self, event: &PurchaseEvent) -> Result<()> {
        let payload = build_payload(event, Utc::now().timestamp());
        let response = self
            .client
            .post(format!("{GRAPH_API_URL}/{}/events", self.pixel_id))
            .query(&[("access_token", self.access_token.as_str())])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Conversions API returned {status}: {body}"));
        }
        debug!("Purchase event {} sent to Conversions API", event.event_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_normalizes_case_and_whitespace() {
        assert_eq!(hash_identifier("  Jo@Example.com "), hash_identifier("jo@example.com"));
        let hash = hash_identifier("jo@example.com");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_phone_strips_formatting() {
        assert_eq!(hash_phone("+1 (555) 010-7147"), hash_phone("15550107147"));
        assert_ne!(hash_phone("15550107147"), hash_identifier("+1 (555) 010-7147"));
    }

    #[test]
    fn test_fbc_format() {
        assert_eq!(
            fbc_value("IwAR2xyz", 1_715_300_000),
            "fb.1.1715300000000.IwAR2xyz"
        );
    }

    #[test]
    fn test_payload_shape() {
        let event = PurchaseEvent {
            event_id: "evt-1".to_string(),
            value: 147.0,
            currency: "USD".to_string(),
            content_ids: vec!["prod_foundations".to_string()],
            contents: vec![crate::conversions::Content {
                id: "prod_foundations".to_string(),
                quantity: 1,
                item_price: 147.0,
            }],
            customer_email: Some("jo@example.com".to_string()),
            customer_phone: None,
            fbclid: Some("IwAR2xyz".to_string()),
            source_url: Some("https://example.com/success/course".to_string()),
        };
        let payload = build_payload(&event, 1_715_300_000);
        let data = &payload["data"][0];
        assert_eq!(data["event_name"], "Purchase");
        assert_eq!(data["event_id"], "evt-1");
        assert_eq!(data["custom_data"]["value"], 147.0);
        assert_eq!(data["custom_data"]["currency"], "USD");
        // Email is hashed, never sent raw.
        let em = data["user_data"]["em"][0].as_str().unwrap();
        assert_ne!(em, "jo@example.com");
        assert_eq!(em, hash_identifier("jo@example.com"));
        assert_eq!(data["user_data"]["fbc"], "fb.1.1715300000000.IwAR2xyz");
    }

    #[test]
    fn test_payload_omits_absent_identifiers() {
        let event = PurchaseEvent {
            event_id: "evt-2".to_string(),
            value: 27.0,
            currency: "USD".to_string(),
            content_ids: vec![],
            contents: vec![],
            customer_email: None,
            customer_phone: None,
            fbclid: None,
            source_url: None,
        };
        let payload = build_payload(&event, 1_715_300_000);
        let user_data = payload["data"][0]["user_data"].as_object().unwrap();
        assert!(user_data.is_empty());
    }
}
