//! Stripe client — the single point of entry for all Stripe API calls.
//!
//! ARCHITECTURAL RULE: No other module may call the Stripe API directly.
//! All payment interactions MUST go through this module.
//!
//! The client speaks the form-encoded v1 API with a small set of typed
//! response structs; fields we never read are simply not modeled.

use std::collections::HashMap;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;
use tracing::debug;

const STRIPE_API_URL: &str = "https://api.stripe.com/v1";
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Stripe API error (status {status}, type {error_type}): {message}")]
    Api {
        status: u16,
        error_type: String,
        code: Option<String>,
        message: String,
    },
}

impl StripeError {
    /// True for declines and other card-level failures, which surface to the
    /// caller as 402 rather than 500.
    pub fn is_card_error(&self) -> bool {
        matches!(self, StripeError::Api { error_type, .. } if error_type == "card_error")
    }

    pub fn message(&self) -> String {
        match self {
            StripeError::Http(e) => e.to_string(),
            StripeError::Api { message, .. } => message.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "type")]
    error_type: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

/// A field that Stripe returns either as a bare id or, when expanded, as the
/// full object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    Object(Box<T>),
    Id(String),
}

pub trait StripeObject {
    fn object_id(&self) -> &str;
}

impl<T: StripeObject> Expandable<T> {
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object(obj) => obj.object_id(),
        }
    }

    pub fn object(&self) -> Option<&T> {
        match self {
            Expandable::Object(obj) => Some(obj),
            Expandable::Id(_) => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Customer {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CustomerList {
    pub data: Vec<Customer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Recurring {
    pub interval: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    pub id: String,
    pub currency: String,
    pub unit_amount: Option<i64>,
    /// "one_time" or "recurring" — decides subscription vs payment intent
    /// in the upsell flow.
    #[serde(rename = "type")]
    pub price_type: String,
    pub recurring: Option<Recurring>,
    pub product: Option<Expandable<Product>>,
}

impl Price {
    pub fn is_recurring(&self) -> bool {
        self.price_type == "recurring"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingDetails {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Charge {
    pub id: String,
    pub customer: Option<Expandable<Customer>>,
    pub payment_method: Option<String>,
    pub billing_details: Option<BillingDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub status: String,
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub customer: Option<Expandable<Customer>>,
    pub payment_method: Option<Expandable<PaymentMethod>>,
    pub latest_charge: Option<Expandable<Charge>>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    pub price: Price,
    pub quantity: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItemList {
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub status: String,
    pub customer: Option<Expandable<Customer>>,
    pub default_payment_method: Option<Expandable<PaymentMethod>>,
    pub items: Option<SubscriptionItemList>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItem {
    pub description: Option<String>,
    pub amount_total: Option<i64>,
    pub quantity: Option<i64>,
    pub price: Option<Price>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItemList {
    pub data: Vec<LineItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub mode: Option<String>,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub payment_status: Option<String>,
    pub customer: Option<Expandable<Customer>>,
    pub customer_details: Option<CustomerDetails>,
    pub payment_intent: Option<Expandable<PaymentIntent>>,
    pub subscription: Option<Expandable<Subscription>>,
    pub line_items: Option<LineItemList>,
    pub metadata: Option<HashMap<String, String>>,
}

impl StripeObject for Customer {
    fn object_id(&self) -> &str {
        &self.id
    }
}

impl StripeObject for PaymentMethod {
    fn object_id(&self) -> &str {
        &self.id
    }
}

impl StripeObject for Product {
    fn object_id(&self) -> &str {
        &self.id
    }
}

impl StripeObject for Charge {
    fn object_id(&self) -> &str {
        &self.id
    }
}

impl StripeObject for PaymentIntent {
    fn object_id(&self) -> &str {
        &self.id
    }
}

impl StripeObject for Subscription {
    fn object_id(&self) -> &str {
        &self.id
    }
}

/// The single Stripe client shared by all handlers.
///
/// No retry here: payment calls are not safely repeatable without idempotency
/// keys, and the only bounded-retry path in this service is the outbound
/// webhook sender.
#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
}

impl StripeClient {
    pub fn new(secret_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            secret_key,
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, StripeError> {
        let response = self
            .client
            .get(format!("{STRIPE_API_URL}{path}"))
            .basic_auth(&self.secret_key, None::<&str>)
            .query(query)
            .send()
            .await?;
        Self::parse_response(path, response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<T, StripeError> {
        let response = self
            .client
            .post(format!("{STRIPE_API_URL}{path}"))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(params)
            .send()
            .await?;
        Self::parse_response(path, response).await
    }

    async fn parse_response<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<T, StripeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let parsed = serde_json::from_str::<ApiErrorEnvelope>(&body).ok();
            let (error_type, code, message) = match parsed {
                Some(envelope) => (
                    envelope.error.error_type.unwrap_or_default(),
                    envelope.error.code,
                    envelope.error.message.unwrap_or(body),
                ),
                None => (String::new(), None, body),
            };
            return Err(StripeError::Api {
                status: status.as_u16(),
                error_type,
                code,
                message,
            });
        }
        debug!("Stripe call succeeded: {path}");
        Ok(response.json::<T>().await?)
    }

    pub async fn find_customer_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Customer>, StripeError> {
        let list: CustomerList = self
            .get(
                "/customers",
                &[
                    ("email".to_string(), email.to_string()),
                    ("limit".to_string(), "1".to_string()),
                ],
            )
            .await?;
        Ok(list.data.into_iter().next())
    }

    pub async fn create_customer(
        &self,
        email: &str,
        name: &str,
        phone: Option<&str>,
    ) -> Result<Customer, StripeError> {
        let mut params = vec![
            ("email".to_string(), email.to_string()),
            ("name".to_string(), name.to_string()),
        ];
        if let Some(phone) = phone {
            params.push(("phone".to_string(), phone.to_string()));
        }
        self.post("/customers", &params).await
    }

    /// Reuses an existing customer for the email when one exists, so repeat
    /// buyers keep a single customer record and saved payment methods.
    pub async fn find_or_create_customer(
        &self,
        email: &str,
        name: &str,
        phone: Option<&str>,
    ) -> Result<Customer, StripeError> {
        if let Some(existing) = self.find_customer_by_email(email).await? {
            return Ok(existing);
        }
        self.create_customer(email, name, phone).await
    }

    pub async fn create_checkout_session(
        &self,
        params: &[(String, String)],
    ) -> Result<CheckoutSession, StripeError> {
        self.post("/checkout/sessions", params).await
    }

    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
        expand: &[&str],
    ) -> Result<CheckoutSession, StripeError> {
        let query = expand_query(expand);
        self.get(&format!("/checkout/sessions/{session_id}"), &query)
            .await
    }

    pub async fn create_payment_intent(
        &self,
        params: &[(String, String)],
    ) -> Result<PaymentIntent, StripeError> {
        self.post("/payment_intents", params).await
    }

    pub async fn update_payment_intent(
        &self,
        payment_intent_id: &str,
        params: &[(String, String)],
    ) -> Result<PaymentIntent, StripeError> {
        self.post(&format!("/payment_intents/{payment_intent_id}"), params)
            .await
    }

    pub async fn retrieve_payment_intent(
        &self,
        payment_intent_id: &str,
        expand: &[&str],
    ) -> Result<PaymentIntent, StripeError> {
        let query = expand_query(expand);
        self.get(&format!("/payment_intents/{payment_intent_id}"), &query)
            .await
    }

    pub async fn retrieve_subscription(
        &self,
        subscription_id: &str,
        expand: &[&str],
    ) -> Result<Subscription, StripeError> {
        let query = expand_query(expand);
        self.get(&format!("/subscriptions/{subscription_id}"), &query)
            .await
    }

    pub async fn create_subscription(
        &self,
        params: &[(String, String)],
    ) -> Result<Subscription, StripeError> {
        self.post("/subscriptions", params).await
    }

    pub async fn retrieve_price(&self, price_id: &str) -> Result<Price, StripeError> {
        self.get(&format!("/prices/{price_id}"), &[]).await
    }

    pub async fn attach_payment_method(
        &self,
        payment_method_id: &str,
        customer_id: &str,
    ) -> Result<PaymentMethod, StripeError> {
        self.post(
            &format!("/payment_methods/{payment_method_id}/attach"),
            &[("customer".to_string(), customer_id.to_string())],
        )
        .await
    }

    pub async fn set_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<Customer, StripeError> {
        self.post(
            &format!("/customers/{customer_id}"),
            &[(
                "invoice_settings[default_payment_method]".to_string(),
                payment_method_id.to_string(),
            )],
        )
        .await
    }
}

fn expand_query(expand: &[&str]) -> Vec<(String, String)> {
    expand
        .iter()
        .map(|field| ("expand[]".to_string(), field.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expandable_parses_bare_id() {
        let value: Expandable<Customer> = serde_json::from_str("\"cus_PXk219qQxVd8Lm\"").unwrap();
        assert_eq!(value.id(), "cus_PXk219qQxVd8Lm");
        assert!(value.object().is_none());
    }

    #[test]
    fn test_expandable_parses_full_object() {
        let value: Expandable<Customer> = serde_json::from_str(
            r#"{"id": "cus_PXk219qQxVd8Lm", "email": "jo@example.com", "name": "Jo Doe"}"#,
        )
        .unwrap();
        assert_eq!(value.id(), "cus_PXk219qQxVd8Lm");
        assert_eq!(
            value.object().unwrap().email.as_deref(),
            Some("jo@example.com")
        );
    }

    #[test]
    fn test_session_with_expanded_payment_intent() {
        let json = r#"{
            "id": "cs_live_a1B2c3D4e5F6g7H8",
            "amount_total": 14700,
            "currency": "usd",
            "payment_status": "paid",
            "customer": null,
            "payment_intent": {
                "id": "pi_3PGxTAKlXPqYRnWv",
                "status": "succeeded",
                "amount": 14700,
                "currency": "usd",
                "payment_method": "pm_1PGxTBKlXPqYRnWv",
                "latest_charge": {
                    "id": "ch_3PGxTAKlXPqYRnWv",
                    "customer": "cus_PXk219qQxVd8Lm",
                    "payment_method": "pm_1PGxTBKlXPqYRnWv"
                }
            }
        }"#;
        let session: CheckoutSession = serde_json::from_str(json).unwrap();
        let pi = session.payment_intent.unwrap();
        let pi = pi.object().unwrap();
        assert_eq!(pi.status, "succeeded");
        let charge = pi.latest_charge.as_ref().unwrap().object().unwrap();
        assert_eq!(charge.customer.as_ref().unwrap().id(), "cus_PXk219qQxVd8Lm");
    }

    #[test]
    fn test_error_envelope_classification() {
        let body = r#"{"error": {"type": "card_error", "code": "card_declined", "message": "Your card was declined."}}"#;
        let envelope: ApiErrorEnvelope = serde_json::from_str(body).unwrap();
        let err = StripeError::Api {
            status: 402,
            error_type: envelope.error.error_type.unwrap(),
            code: envelope.error.code,
            message: envelope.error.message.unwrap(),
        };
        assert!(err.is_card_error());
    }

    #[test]
    fn test_price_recurring_detection() {
        let one_time: Price = serde_json::from_str(
            r#"{"id": "price_1PGxS8KlXPqYRnWv", "currency": "usd", "unit_amount": 19700, "type": "one_time"}"#,
        )
        .unwrap();
        assert!(!one_time.is_recurring());

        let recurring: Price = serde_json::from_str(
            r#"{"id": "price_1PGxS9KlXPqYRnWv", "currency": "usd", "unit_amount": 2900, "type": "recurring", "recurring": {"interval": "month"}}"#,
        )
        .unwrap();
        assert!(recurring.is_recurring());
    }
}
