//! Transaction lookup for the success and upsell pages.
//!
//! Normalizes a checkout session, payment intent or subscription into one
//! shape so the pages don't care which object the purchase finished as.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::state::AppState;
use crate::stripe_client::{CheckoutSession, PaymentIntent, Subscription};

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum Lookup {
    Session(String),
    PaymentIntent(String),
    Subscription(String),
}

impl SessionQuery {
    /// Exactly one of the three identifiers must be present.
    pub fn into_lookup(self) -> Result<Lookup, AppError> {
        let candidates = [
            self.session_id.map(Lookup::Session),
            self.payment_intent.map(Lookup::PaymentIntent),
            self.subscription.map(Lookup::Subscription),
        ];
        let mut present = candidates.into_iter().flatten();
        let lookup = present.next().ok_or_else(|| {
            AppError::Validation(
                "one of session_id, payment_intent or subscription is required".to_string(),
            )
        })?;
        if present.next().is_some() {
            return Err(AppError::Validation(
                "provide only one of session_id, payment_intent or subscription".to_string(),
            ));
        }
        Ok(lookup)
    }
}

#[derive(Debug, Serialize)]
pub struct NormalizedCustomer {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NormalizedLineItem {
    pub product: Option<String>,
    pub description: Option<String>,
    pub amount: Option<i64>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct NormalizedSession {
    pub id: String,
    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub payment_status: Option<String>,
    pub customer_details: Option<NormalizedCustomer>,
    pub line_items: Vec<NormalizedLineItem>,
    pub metadata: HashMap<String, String>,
}

pub fn normalize_checkout_session(session: &CheckoutSession) -> NormalizedSession {
    NormalizedSession {
        id: session.id.clone(),
        amount_total: session.amount_total,
        currency: session.currency.clone(),
        payment_status: session.payment_status.clone(),
        customer_details: session.customer_details.as_ref().map(|details| {
            NormalizedCustomer {
                name: details.name.clone(),
                email: details.email.clone(),
                phone: details.phone.clone(),
            }
        }),
        line_items: session
            .line_items
            .as_ref()
            .map(|items| {
                items
                    .data
                    .iter()
                    .map(|item| NormalizedLineItem {
                        product: item.price.as_ref().and_then(|price| {
                            price.product.as_ref().map(|product| product.id().to_string())
                        }),
                        description: item.description.clone(),
                        amount: item.amount_total,
                        quantity: item.quantity,
                    })
                    .collect()
            })
            .unwrap_or_default(),
        metadata: session.metadata.clone().unwrap_or_default(),
    }
}

pub fn normalize_payment_intent(intent: &PaymentIntent) -> NormalizedSession {
    let billing = intent
        .latest_charge
        .as_ref()
        .and_then(|charge| charge.object())
        .and_then(|charge| charge.billing_details.as_ref());
    NormalizedSession {
        id: intent.id.clone(),
        amount_total: Some(intent.amount),
        currency: Some(intent.currency.clone()),
        payment_status: Some(intent.status.clone()),
        customer_details: billing.map(|details| NormalizedCustomer {
            name: details.name.clone(),
            email: details.email.clone(),
            phone: details.phone.clone(),
        }),
        line_items: Vec::new(),
        metadata: intent.metadata.clone().unwrap_or_default(),
    }
}

pub fn normalize_subscription(subscription: &Subscription) -> NormalizedSession {
    let items = subscription
        .items
        .as_ref()
        .map(|list| list.data.as_slice())
        .unwrap_or_default();
    let amount_total = items
        .iter()
        .map(|item| item.price.unit_amount.unwrap_or(0) * item.quantity.unwrap_or(1))
        .sum::<i64>();
    NormalizedSession {
        id: subscription.id.clone(),
        amount_total: (amount_total > 0).then_some(amount_total),
        currency: items.first().map(|item| item.price.currency.clone()),
        payment_status: Some(subscription.status.clone()),
        customer_details: None,
        line_items: items
            .iter()
            .map(|item| NormalizedLineItem {
                product: item.price.product.as_ref().map(|p| p.id().to_string()),
                description: None,
                amount: item.price.unit_amount,
                quantity: item.quantity,
            })
            .collect(),
        metadata: subscription.metadata.clone().unwrap_or_default(),
    }
}

/// GET /api/session
pub async fn handle_get_session(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<NormalizedSession>, AppError> {
    let normalized = match query.into_lookup()? {
        Lookup::Session(id) => {
            let session = state
                .stripe
                .retrieve_checkout_session(&id, &["line_items"])
                .await?;
            normalize_checkout_session(&session)
        }
        Lookup::PaymentIntent(id) => {
            let intent = state
                .stripe
                .retrieve_payment_intent(&id, &["latest_charge"])
                .await?;
            normalize_payment_intent(&intent)
        }
        Lookup::Subscription(id) => {
            let subscription = state.stripe.retrieve_subscription(&id, &[]).await?;
            normalize_subscription(&subscription)
        }
    };
    Ok(Json(normalized))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_requires_exactly_one_id() {
        let none = SessionQuery {
            session_id: None,
            payment_intent: None,
            subscription: None,
        };
        assert!(none.into_lookup().is_err());

        let two = SessionQuery {
            session_id: Some("cs_1".to_string()),
            payment_intent: Some("pi_1".to_string()),
            subscription: None,
        };
        assert!(two.into_lookup().is_err());

        let one = SessionQuery {
            session_id: None,
            payment_intent: Some("pi_1".to_string()),
            subscription: None,
        };
        assert_eq!(
            one.into_lookup().unwrap(),
            Lookup::PaymentIntent("pi_1".to_string())
        );
    }

    #[test]
    fn test_normalize_session_with_line_items() {
        let session: CheckoutSession = serde_json::from_str(
            r#"{
                "id": "cs_1",
                "amount_total": 19400,
                "currency": "usd",
                "payment_status": "paid",
                "customer_details": {"name": "Jo Doe", "email": "jo@example.com"},
                "metadata": {"funnel_type": "course"},
                "line_items": {"data": [
                    {"description": "Boxing Foundations Course", "amount_total": 14700,
                     "quantity": 1,
                     "price": {"id": "price_a", "currency": "usd", "unit_amount": 14700,
                               "type": "one_time", "product": "prod_foundations"}},
                    {"description": "Footwork Masterclass", "amount_total": 4700,
                     "quantity": 1,
                     "price": {"id": "price_b", "currency": "usd", "unit_amount": 4700,
                               "type": "one_time", "product": "prod_footwork"}}
                ]}
            }"#,
        )
        .unwrap();
        let normalized = normalize_checkout_session(&session);
        assert_eq!(normalized.amount_total, Some(19400));
        assert_eq!(normalized.line_items.len(), 2);
        assert_eq!(
            normalized.line_items[0].product.as_deref(),
            Some("prod_foundations")
        );
        assert_eq!(
            normalized.metadata.get("funnel_type").map(String::as_str),
            Some("course")
        );
    }

    #[test]
    fn test_normalize_payment_intent_uses_billing_details() {
        let intent: PaymentIntent = serde_json::from_str(
            r#"{
                "id": "pi_1", "status": "succeeded", "amount": 19700, "currency": "usd",
                "latest_charge": {
                    "id": "ch_1",
                    "billing_details": {"name": "Jo Doe", "email": "jo@example.com"}
                }
            }"#,
        )
        .unwrap();
        let normalized = normalize_payment_intent(&intent);
        assert_eq!(normalized.amount_total, Some(19700));
        assert_eq!(normalized.payment_status.as_deref(), Some("succeeded"));
        assert_eq!(
            normalized
                .customer_details
                .as_ref()
                .and_then(|c| c.email.as_deref()),
            Some("jo@example.com")
        );
    }

    #[test]
    fn test_normalize_subscription_sums_items() {
        let subscription: Subscription = serde_json::from_str(
            r#"{
                "id": "sub_1", "status": "active",
                "items": {"data": [
                    {"price": {"id": "price_m", "currency": "usd", "unit_amount": 2900,
                               "type": "recurring", "recurring": {"interval": "month"}},
                     "quantity": 1}
                ]}
            }"#,
        )
        .unwrap();
        let normalized = normalize_subscription(&subscription);
        assert_eq!(normalized.amount_total, Some(2900));
        assert_eq!(normalized.currency.as_deref(), Some("usd"));
        assert_eq!(normalized.payment_status.as_deref(), Some("active"));
    }
}
