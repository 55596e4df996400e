use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attribution::flatten_for_metadata;
use crate::catalog::cart::{Cart, CartItem};
use crate::catalog::{fx, Currency, ProductId};
use crate::errors::AppError;
use crate::events::{track_event, TrackEventInput};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl CustomerInfo {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.first_name.trim().is_empty() {
            return Err(AppError::Validation("firstName is required".to_string()));
        }
        if self.last_name.trim().is_empty() {
            return Err(AppError::Validation("lastName is required".to_string()));
        }
        let email = self.email.trim();
        let valid_email = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid_email {
            return Err(AppError::Validation(format!(
                "'{email}' is not a valid email address"
            )));
        }
        Ok(())
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutFlow {
    /// Provider-hosted checkout page; the response carries a redirect URL.
    #[default]
    Hosted,
    /// On-page payment element; the response carries a client secret.
    Embedded,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub items: Vec<CartItem>,
    pub customer_info: CustomerInfo,
    pub currency: Currency,
    #[serde(default)]
    pub tracking_params: Option<serde_json::Value>,
    #[serde(default)]
    pub cookie_data: Option<serde_json::Value>,
    #[serde(default)]
    pub add_ons: Vec<ProductId>,
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default)]
    pub flow: CheckoutFlow,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SessionResponse {
    #[serde(rename_all = "camelCase")]
    Hosted { url: String, session_id: String },
    #[serde(rename_all = "camelCase")]
    Embedded {
        client_secret: String,
        payment_intent_id: String,
        amount: i64,
    },
}

/// The canonical event id for this checkout: reuse the one minted by the
/// attribution cookie so pixel and server conversion events deduplicate,
/// generate one otherwise.
pub fn resolve_event_id(cookie_data: Option<&serde_json::Value>) -> String {
    cookie_data
        .and_then(|cookie| cookie.get("event_id"))
        .and_then(|value| value.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Flat string metadata attached to the session (and mirrored onto the
/// payment intent or subscription).
pub fn build_metadata(
    customer: &CustomerInfo,
    cart: &Cart,
    event_id: &str,
    page_url: Option<&str>,
    cookie_data: Option<&serde_json::Value>,
) -> Result<Vec<(String, String)>, AppError> {
    let mut metadata = vec![
        ("customer_name".to_string(), customer.full_name()),
        ("first_name".to_string(), customer.first_name.trim().to_string()),
        ("last_name".to_string(), customer.last_name.trim().to_string()),
        ("email".to_string(), customer.email.trim().to_string()),
        ("funnel_type".to_string(), cart.funnel().as_str().to_string()),
        (
            "entry_product".to_string(),
            cart.entry_product().slug().to_string(),
        ),
        ("products".to_string(), cart.summary_json()?),
        ("event_id".to_string(), event_id.to_string()),
    ];
    if let Some(phone) = customer.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        metadata.push(("phone".to_string(), phone.trim().to_string()));
    }
    if let Some(url) = page_url {
        metadata.push(("page_url".to_string(), url.to_string()));
    }
    if let Some(cookie) = cookie_data {
        metadata.extend(flatten_for_metadata(cookie));
    }
    Ok(metadata)
}

/// Form parameters for a hosted checkout session.
pub fn hosted_session_params(
    customer_id: &str,
    cart: &Cart,
    metadata: &[(String, String)],
    site_base_url: &str,
) -> Result<Vec<(String, String)>, AppError> {
    let funnel = cart.funnel();
    let subscription = cart.is_subscription();

    let mut params = vec![
        (
            "mode".to_string(),
            if subscription { "subscription" } else { "payment" }.to_string(),
        ),
        ("customer".to_string(), customer_id.to_string()),
        (
            "success_url".to_string(),
            format!(
                "{site_base_url}{}?session_id={{CHECKOUT_SESSION_ID}}",
                funnel.success_path()
            ),
        ),
        (
            "cancel_url".to_string(),
            format!("{site_base_url}{}", funnel.cancel_path()),
        ),
    ];

    for (index, item) in cart.items.iter().enumerate() {
        let listing = crate::catalog::resolve_price(item.product, cart.currency).ok_or_else(
            || {
                AppError::Validation(format!(
                    "{} is not available in {}",
                    item.product.slug(),
                    cart.currency.as_str()
                ))
            },
        )?;
        params.push((
            format!("line_items[{index}][price]"),
            listing.price_id.to_string(),
        ));
        params.push((
            format!("line_items[{index}][quantity]"),
            item.quantity.to_string(),
        ));
    }

    for (key, value) in metadata {
        params.push((format!("metadata[{key}]"), value.clone()));
    }

    if subscription {
        // Same metadata on the subscription object itself.
        for (key, value) in metadata {
            params.push((format!("subscription_data[metadata][{key}]"), value.clone()));
        }
    } else {
        // Keeps the payment method reusable for the one-click upsell.
        params.push((
            "payment_intent_data[setup_future_usage]".to_string(),
            "off_session".to_string(),
        ));
    }

    Ok(params)
}

/// Form parameters for the embedded (on-page) payment intent.
pub fn embedded_intent_params(
    customer_id: &str,
    cart: &Cart,
    amount: i64,
    metadata: &[(String, String)],
) -> Vec<(String, String)> {
    let mut params = vec![
        ("amount".to_string(), amount.to_string()),
        ("currency".to_string(), cart.currency.as_str().to_string()),
        ("customer".to_string(), customer_id.to_string()),
        ("setup_future_usage".to_string(), "off_session".to_string()),
        (
            "automatic_payment_methods[enabled]".to_string(),
            "true".to_string(),
        ),
    ];
    for (key, value) in metadata {
        params.push((format!("metadata[{key}]"), value.clone()));
    }
    params
}

pub async fn create_checkout_session(
    state: &AppState,
    request: CreateSessionRequest,
) -> Result<SessionResponse, AppError> {
    request.customer_info.validate()?;
    let cart = Cart::assemble(&request.items, &request.add_ons, request.currency)?;
    let total = cart.total()?;
    // Prefer the cookie's event id; fall back to the tracking snapshot the
    // page sent alongside.
    let event_id = resolve_event_id(
        request
            .cookie_data
            .as_ref()
            .or(request.tracking_params.as_ref()),
    );
    let metadata = build_metadata(
        &request.customer_info,
        &cart,
        &event_id,
        request.page_url.as_deref(),
        request.cookie_data.as_ref(),
    )?;

    // Attribution breadcrumb for the funnel report; never blocks checkout.
    track_event(
        state.db.clone(),
        TrackEventInput {
            event_name: "initiate_checkout".to_string(),
            page_url: request.page_url.clone(),
            value: Some(fx::normalize_to_usd(total, cart.currency)),
            metadata: Some(serde_json::json!({
                "event_id": event_id,
                "funnel_type": cart.funnel().as_str(),
                "currency": cart.currency.as_str(),
            })),
            session_id: request
                .cookie_data
                .as_ref()
                .and_then(|cookie| cookie.get("session_id"))
                .and_then(|value| value.as_str())
                .map(str::to_string),
            tracking_params: request.cookie_data.clone(),
            ..Default::default()
        },
        None,
    );

    let customer = state
        .stripe
        .find_or_create_customer(
            request.customer_info.email.trim(),
            &request.customer_info.full_name(),
            request.customer_info.phone.as_deref(),
        )
        .await?;

    match request.flow {
        CheckoutFlow::Hosted => {
            let params =
                hosted_session_params(&customer.id, &cart, &metadata, &state.config.site_base_url)?;
            let session = state.stripe.create_checkout_session(&params).await?;
            let url = session
                .url
                .ok_or_else(|| anyhow::anyhow!("checkout session {} has no url", session.id))?;
            Ok(SessionResponse::Hosted {
                url,
                session_id: session.id,
            })
        }
        CheckoutFlow::Embedded => {
            if cart.is_subscription() {
                return Err(AppError::Validation(
                    "subscription products require the hosted checkout".to_string(),
                ));
            }
            let amount = total;
            let params = embedded_intent_params(&customer.id, &cart, amount, &metadata);
            let intent = state.stripe.create_payment_intent(&params).await?;
            let client_secret = intent.client_secret.ok_or_else(|| {
                anyhow::anyhow!("payment intent {} has no client secret", intent.id)
            })?;
            Ok(SessionResponse::Embedded {
                client_secret,
                payment_intent_id: intent.id,
                amount,
            })
        }
    }
}
