use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::checkout::session::resolve_event_id;
use crate::conversions::purchase::{track_purchase, TrackPurchaseRequest, TrackPurchaseResponse};
use crate::conversions::{Content, PurchaseEvent};
use crate::errors::AppError;
use crate::state::AppState;

/// POST /api/purchase/track
pub async fn handle_track_purchase(
    State(state): State<AppState>,
    Json(request): Json<TrackPurchaseRequest>,
) -> Result<Json<TrackPurchaseResponse>, AppError> {
    let response = track_purchase(&state, request).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct FacebookPurchaseRequest {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub content_ids: Vec<String>,
    #[serde(default)]
    pub contents: Vec<Content>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub cookie_data: Option<Value>,
    #[serde(default)]
    pub fbclid: Option<String>,
    #[serde(default)]
    pub session_url: Option<String>,
}

/// POST /api/facebook-purchase
///
/// Raw relay to the Conversions API. Always acknowledges: relay failures are
/// logged, never surfaced to the page.
pub async fn handle_facebook_purchase(
    State(state): State<AppState>,
    Json(request): Json<FacebookPurchaseRequest>,
) -> Json<Value> {
    let event_id = request
        .event_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| resolve_event_id(request.cookie_data.as_ref()));
    let fbclid = request.fbclid.or_else(|| {
        request
            .cookie_data
            .as_ref()
            .and_then(|cookie| cookie.get("fbclid"))
            .and_then(|value| value.as_str())
            .map(str::to_string)
    });

    let event = PurchaseEvent {
        event_id,
        value: request.value.unwrap_or(0.0),
        currency: request
            .currency
            .unwrap_or_else(|| "USD".to_string())
            .to_uppercase(),
        content_ids: request.content_ids,
        contents: request.contents,
        customer_email: request.customer_email,
        customer_phone: request.customer_phone,
        fbclid,
        source_url: request.session_url,
    };

    let reporter = state.reporter.clone();
    tokio::spawn(async move {
        if let Err(e) = reporter.report(&event).await {
            warn!("facebook-purchase relay for {} failed: {e}", event.event_id);
        }
    });

    Json(json!({ "received": true }))
}
