use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::attribution::flatten_for_metadata;
use crate::checkout::session::resolve_event_id;
use crate::conversions::{Content, PurchaseEvent};
use crate::errors::AppError;
use crate::state::AppState;
use crate::stripe_client::CheckoutSession;

#[derive(Debug, Deserialize)]
pub struct UpsellChargeRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub price_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub tracking_params: Option<serde_json::Value>,
    #[serde(default)]
    pub cookie_data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UpsellChargeResponse {
    Subscription {
        success: bool,
        subscription_id: String,
    },
    Payment {
        success: bool,
        payment_intent_id: String,
    },
    RequiresAction {
        requires_action: bool,
        client_secret: String,
    },
}

/// The customer and payment method behind a finished checkout session.
#[derive(Debug, PartialEq)]
pub struct PaymentSource {
    pub customer_id: String,
    pub payment_method_id: String,
}

/// Recovers the charge source from a retrieved session.
///
/// Guest one-time checkouts can finish with an empty `customer` on the
/// session itself; the customer then lives on the payment intent or its
/// latest charge, so walk all three before giving up.
pub fn resolve_payment_source(session: &CheckoutSession) -> Result<PaymentSource, AppError> {
    let payment_intent = session
        .payment_intent
        .as_ref()
        .and_then(|pi| pi.object());
    let latest_charge = payment_intent
        .and_then(|pi| pi.latest_charge.as_ref())
        .and_then(|charge| charge.object());

    let customer_id = session
        .customer
        .as_ref()
        .map(|c| c.id().to_string())
        .or_else(|| {
            payment_intent
                .and_then(|pi| pi.customer.as_ref())
                .map(|c| c.id().to_string())
        })
        .or_else(|| {
            latest_charge
                .and_then(|charge| charge.customer.as_ref())
                .map(|c| c.id().to_string())
        })
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            AppError::Validation("no customer found on the original session".to_string())
        })?;

    let payment_method_id = payment_intent
        .and_then(|pi| pi.payment_method.as_ref())
        .map(|pm| pm.id().to_string())
        .or_else(|| latest_charge.and_then(|charge| charge.payment_method.clone()))
        .or_else(|| {
            session
                .subscription
                .as_ref()
                .and_then(|sub| sub.object())
                .and_then(|sub| sub.default_payment_method.as_ref())
                .map(|pm| pm.id().to_string())
        })
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            AppError::Validation("no payment method found on the original session".to_string())
        })?;

    Ok(PaymentSource {
        customer_id,
        payment_method_id,
    })
}

fn require(field: Option<String>, name: &str) -> Result<String, AppError> {
    field
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn upsell_metadata(
    session: &CheckoutSession,
    product_id: &str,
    event_id: &str,
    cookie_data: Option<&serde_json::Value>,
) -> Vec<(String, String)> {
    let mut metadata = vec![
        ("funnel_type".to_string(), "upsell".to_string()),
        ("upsell_product".to_string(), product_id.to_string()),
        ("original_session".to_string(), session.id.clone()),
        ("event_id".to_string(), event_id.to_string()),
    ];
    if let Some(details) = &session.customer_details {
        if let Some(name) = &details.name {
            metadata.push(("customer_name".to_string(), name.clone()));
        }
        if let Some(email) = &details.email {
            metadata.push(("email".to_string(), email.clone()));
        }
    }
    if let Some(cookie) = cookie_data {
        metadata.extend(flatten_for_metadata(cookie));
    }
    metadata
}

pub async fn charge(
    state: &AppState,
    request: UpsellChargeRequest,
) -> Result<UpsellChargeResponse, AppError> {
    let session_id = require(request.session_id, "session_id")?;
    let price_id = require(request.price_id, "price_id")?;
    let product_id = require(request.product_id, "product_id")?;

    let session = state
        .stripe
        .retrieve_checkout_session(
            &session_id,
            &[
                "payment_intent.latest_charge",
                "subscription.default_payment_method",
            ],
        )
        .await?;
    let source = resolve_payment_source(&session)?;
    let price = state.stripe.retrieve_price(&price_id).await?;

    let event_id = resolve_event_id(
        request
            .cookie_data
            .as_ref()
            .or(request.tracking_params.as_ref()),
    );
    let metadata = upsell_metadata(&session, &product_id, &event_id, request.cookie_data.as_ref());

    if price.is_recurring() {
        // Off-session subscriptions bill the default payment method; there is
        // no 3-D-Secure challenge path in this flow.
        state
            .stripe
            .attach_payment_method(&source.payment_method_id, &source.customer_id)
            .await?;
        state
            .stripe
            .set_default_payment_method(&source.customer_id, &source.payment_method_id)
            .await?;

        let mut params = vec![
            ("customer".to_string(), source.customer_id.clone()),
            ("items[0][price]".to_string(), price.id.clone()),
            (
                "default_payment_method".to_string(),
                source.payment_method_id.clone(),
            ),
        ];
        for (key, value) in &metadata {
            params.push((format!("metadata[{key}]"), value.clone()));
        }
        let subscription = state.stripe.create_subscription(&params).await?;
        return Ok(UpsellChargeResponse::Subscription {
            success: true,
            subscription_id: subscription.id,
        });
    }

    let amount = price.unit_amount.ok_or_else(|| {
        AppError::Validation(format!("price {} has no unit amount", price.id))
    })?;
    let mut params = vec![
        ("amount".to_string(), amount.to_string()),
        ("currency".to_string(), price.currency.clone()),
        ("customer".to_string(), source.customer_id.clone()),
        (
            "payment_method".to_string(),
            source.payment_method_id.clone(),
        ),
        ("off_session".to_string(), "true".to_string()),
        ("confirm".to_string(), "true".to_string()),
    ];
    for (key, value) in &metadata {
        params.push((format!("metadata[{key}]"), value.clone()));
    }
    let intent = state.stripe.create_payment_intent(&params).await?;

    match intent.status.as_str() {
        "succeeded" => {
            report_upsell_purchase(state, &session, &price, &event_id, amount, &request.cookie_data);
            Ok(UpsellChargeResponse::Payment {
                success: true,
                payment_intent_id: intent.id,
            })
        }
        "requires_action" => {
            let client_secret = intent.client_secret.ok_or_else(|| {
                anyhow::anyhow!("payment intent {} requires action but has no client secret", intent.id)
            })?;
            Ok(UpsellChargeResponse::RequiresAction {
                requires_action: true,
                client_secret,
            })
        }
        status => Err(AppError::Validation(format!(
            "payment was not completed (status: {status})"
        ))),
    }
}

/// Server-side Purchase event for a succeeded upsell. Fire-and-forget: a
/// reporting failure never fails the charge that already went through.
fn report_upsell_purchase(
    state: &AppState,
    session: &CheckoutSession,
    price: &crate::stripe_client::Price,
    event_id: &str,
    amount: i64,
    cookie_data: &Option<serde_json::Value>,
) {
    let content_id = price
        .product
        .as_ref()
        .map(|product| product.id().to_string())
        .unwrap_or_else(|| price.id.clone());
    let event = PurchaseEvent {
        event_id: event_id.to_string(),
        value: amount as f64 / 100.0,
        currency: price.currency.to_uppercase(),
        content_ids: vec![content_id.clone()],
        contents: vec![Content {
            id: content_id,
            quantity: 1,
            item_price: amount as f64 / 100.0,
        }],
        customer_email: session
            .customer_details
            .as_ref()
            .and_then(|details| details.email.clone()),
        customer_phone: session
            .customer_details
            .as_ref()
            .and_then(|details| details.phone.clone()),
        fbclid: cookie_data
            .as_ref()
            .and_then(|cookie| cookie.get("fbclid"))
            .and_then(|value| value.as_str())
            .map(str::to_string),
        source_url: None,
    };

    let reporter = state.reporter.clone();
    tokio::spawn(async move {
        if let Err(e) = reporter.report(&event).await {
            warn!("upsell purchase event failed to send: {e}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_from(json: &str) -> CheckoutSession {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_source_from_session_customer() {
        let session = session_from(
            r#"{
                "id": "cs_1",
                "customer": "cus_direct",
                "payment_intent": {
                    "id": "pi_1", "status": "succeeded", "amount": 14700,
                    "currency": "usd", "payment_method": "pm_1"
                }
            }"#,
        );
        let source = resolve_payment_source(&session).unwrap();
        assert_eq!(
            source,
            PaymentSource {
                customer_id: "cus_direct".to_string(),
                payment_method_id: "pm_1".to_string(),
            }
        );
    }

    #[test]
    fn test_source_falls_back_to_latest_charge_customer() {
        // Guest checkout: no customer on the session, recover it from the charge.
        let session = session_from(
            r#"{
                "id": "cs_2",
                "customer": null,
                "payment_intent": {
                    "id": "pi_2", "status": "succeeded", "amount": 14700,
                    "currency": "usd",
                    "latest_charge": {
                        "id": "ch_2", "customer": "cus_from_charge",
                        "payment_method": "pm_2"
                    }
                }
            }"#,
        );
        let source = resolve_payment_source(&session).unwrap();
        assert_eq!(source.customer_id, "cus_from_charge");
        assert_eq!(source.payment_method_id, "pm_2");
    }

    #[test]
    fn test_source_from_subscription_default_payment_method() {
        let session = session_from(
            r#"{
                "id": "cs_3",
                "customer": "cus_sub",
                "subscription": {
                    "id": "sub_1", "status": "active",
                    "default_payment_method": {"id": "pm_sub"}
                }
            }"#,
        );
        let source = resolve_payment_source(&session).unwrap();
        assert_eq!(source.payment_method_id, "pm_sub");
    }

    #[test]
    fn test_no_customer_anywhere_is_a_validation_error() {
        let session = session_from(
            r#"{
                "id": "cs_4",
                "payment_intent": {
                    "id": "pi_4", "status": "succeeded", "amount": 100,
                    "currency": "usd", "payment_method": "pm_4"
                }
            }"#,
        );
        assert!(matches!(
            resolve_payment_source(&session),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_upsell_metadata_carries_session_and_cookie() {
        let session = session_from(
            r#"{
                "id": "cs_5",
                "customer_details": {"name": "Jo Doe", "email": "jo@example.com"}
            }"#,
        );
        let cookie = serde_json::json!({"last_utm_source": "facebook"});
        let metadata = upsell_metadata(&session, "coaching_call_pack", "evt-9", Some(&cookie));
        assert!(metadata.contains(&("funnel_type".to_string(), "upsell".to_string())));
        assert!(metadata.contains(&("original_session".to_string(), "cs_5".to_string())));
        assert!(metadata.contains(&("email".to_string(), "jo@example.com".to_string())));
        assert!(metadata.contains(&("cookie_last_utm_source".to_string(), "facebook".to_string())));
    }

    #[test]
    fn test_missing_ids_rejected() {
        assert!(require(None, "session_id").is_err());
        assert!(require(Some("  ".to_string()), "session_id").is_err());
        assert_eq!(require(Some("cs_1".to_string()), "session_id").unwrap(), "cs_1");
    }
}
