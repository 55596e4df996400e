use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::catalog::{fx, Currency};
use crate::checkout::session::resolve_event_id;
use crate::conversions::{Content, PurchaseEvent};
use crate::errors::AppError;
use crate::events::{track_event, TrackEventInput};
use crate::state::AppState;
use crate::stripe_client::{CheckoutSession, CustomerDetails};

#[derive(Debug, Deserialize)]
pub struct TrackPurchaseRequest {
    pub session_id: String,
    #[serde(default)]
    pub cookie_data: Option<serde_json::Value>,
    #[serde(default)]
    pub page_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TrackPurchaseResponse {
    pub already_tracked: bool,
    /// Payload for the browser pixel — same event_id as the server-side
    /// event, so the platform deduplicates the pair.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel: Option<PurchaseEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onboarding_url: Option<String>,
}

/// Builds the canonical Purchase event from a finalized session.
pub fn build_purchase_event(
    session: &CheckoutSession,
    event_id: &str,
    cookie_data: Option<&serde_json::Value>,
    page_url: Option<&str>,
) -> PurchaseEvent {
    let currency = session
        .currency
        .as_deref()
        .unwrap_or("usd")
        .to_uppercase();
    let value = session.amount_total.unwrap_or(0) as f64 / 100.0;

    let mut content_ids = Vec::new();
    let mut contents = Vec::new();
    if let Some(line_items) = &session.line_items {
        for item in &line_items.data {
            let quantity = item.quantity.unwrap_or(1).max(1);
            let id = item
                .price
                .as_ref()
                .map(|price| {
                    price
                        .product
                        .as_ref()
                        .map(|product| product.id().to_string())
                        .unwrap_or_else(|| price.id.clone())
                })
                .unwrap_or_default();
            if id.is_empty() {
                continue;
            }
            let item_price = item.amount_total.unwrap_or(0) as f64 / 100.0 / quantity as f64;
            content_ids.push(id.clone());
            contents.push(Content {
                id,
                quantity,
                item_price,
            });
        }
    }

    PurchaseEvent {
        event_id: event_id.to_string(),
        value,
        currency,
        content_ids,
        contents,
        customer_email: session
            .customer_details
            .as_ref()
            .and_then(|details| details.email.clone()),
        customer_phone: session
            .customer_details
            .as_ref()
            .and_then(|details| details.phone.clone()),
        fbclid: cookie_data
            .and_then(|cookie| cookie.get("fbclid"))
            .and_then(|value| value.as_str())
            .map(str::to_string),
        source_url: page_url.map(str::to_string),
    }
}

/// The post-purchase redirect target, carrying the buyer's email and first
/// name so onboarding can pre-fill.
pub fn onboarding_url(site_base_url: &str, details: Option<&CustomerDetails>) -> String {
    let mut url = format!("{site_base_url}/onboarding");
    let mut query = Vec::new();
    if let Some(details) = details {
        if let Some(email) = &details.email {
            query.push(format!("email={}", urlencoding::encode(email)));
        }
        if let Some(first) = details
            .name
            .as_deref()
            .and_then(|name| name.split_whitespace().next())
        {
            query.push(format!("first_name={}", urlencoding::encode(first)));
        }
    }
    if !query.is_empty() {
        url.push('?');
        url.push_str(&query.join("&"));
    }
    url
}

/// Success-page conversion tracking.
///
/// The `tracked_purchases` insert is the dedup gate: a reloaded success page
/// calls this again, loses the insert race and sends nothing anywhere.
pub async fn track_purchase(
    state: &AppState,
    request: TrackPurchaseRequest,
) -> Result<TrackPurchaseResponse, AppError> {
    if request.session_id.trim().is_empty() {
        return Err(AppError::Validation("session_id is required".to_string()));
    }

    let inserted = sqlx::query(
        "INSERT INTO tracked_purchases (session_id) VALUES ($1) ON CONFLICT (session_id) DO NOTHING",
    )
    .bind(&request.session_id)
    .execute(&state.db)
    .await?;

    if inserted.rows_affected() == 0 {
        return Ok(TrackPurchaseResponse {
            already_tracked: true,
            pixel: None,
            onboarding_url: None,
        });
    }

    let session = state
        .stripe
        .retrieve_checkout_session(&request.session_id, &["line_items"])
        .await?;

    let event_id = resolve_event_id(request.cookie_data.as_ref());
    let event = build_purchase_event(
        &session,
        &event_id,
        request.cookie_data.as_ref(),
        request.page_url.as_deref(),
    );

    // Sink 1: server-side Conversions API, fire-and-forget.
    let reporter = state.reporter.clone();
    let capi_event = event.clone();
    tokio::spawn(async move {
        if let Err(e) = reporter.report(&capi_event).await {
            warn!("purchase event {} failed to reach Conversions API: {e}", capi_event.event_id);
        }
    });

    // Sink 2: internal analytics, value normalized to the reporting currency.
    let amount_minor = session.amount_total.unwrap_or(0);
    let value_usd = Currency::from_code(session.currency.as_deref().unwrap_or("usd"))
        .map(|currency| fx::normalize_to_usd(amount_minor, currency))
        .unwrap_or(event.value);
    track_event(
        state.db.clone(),
        TrackEventInput {
            event_name: "purchase".to_string(),
            value: Some(value_usd),
            metadata: Some(json!({
                "checkout_session": request.session_id,
                "event_id": event.event_id,
                "currency": event.currency,
                "original_value": event.value,
                "content_ids": event.content_ids,
            })),
            session_id: request
                .cookie_data
                .as_ref()
                .and_then(|cookie| cookie.get("session_id"))
                .and_then(|value| value.as_str())
                .map(str::to_string),
            tracking_params: request.cookie_data.clone(),
            page_url: request.page_url.clone(),
            ..Default::default()
        },
        None,
    );

    // Sink 3 is the browser pixel, fired by the page with this payload.
    let onboarding = onboarding_url(
        &state.config.site_base_url,
        session.customer_details.as_ref(),
    );
    Ok(TrackPurchaseResponse {
        already_tracked: false,
        pixel: Some(event),
        onboarding_url: Some(onboarding),
    })
}
