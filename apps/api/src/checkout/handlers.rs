use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::catalog::cart::{Cart, CartItem};
use crate::catalog::{Currency, ProductId};
use crate::checkout::session::{create_checkout_session, CreateSessionRequest, SessionResponse};
use crate::errors::AppError;
use crate::state::AppState;
use crate::webhooks;

/// POST /api/checkout/session
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let response = create_checkout_session(&state, request).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAmountRequest {
    pub payment_intent_id: String,
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub add_ons: Vec<ProductId>,
    pub currency: Currency,
}

#[derive(Debug, Serialize)]
pub struct UpdateAmountResponse {
    pub amount: i64,
}

/// POST /api/checkout/amount
///
/// Called (debounced client-side) when add-on toggles change the total of a
/// pending on-page payment.
pub async fn handle_update_amount(
    State(state): State<AppState>,
    Json(request): Json<UpdateAmountRequest>,
) -> Result<Json<UpdateAmountResponse>, AppError> {
    if request.payment_intent_id.trim().is_empty() {
        return Err(AppError::Validation(
            "paymentIntentId is required".to_string(),
        ));
    }
    let cart = Cart::assemble(&request.items, &request.add_ons, request.currency)?;
    let amount = cart.total()?;
    state
        .stripe
        .update_payment_intent(
            &request.payment_intent_id,
            &[("amount".to_string(), amount.to_string())],
        )
        .await?;
    Ok(Json(UpdateAmountResponse { amount }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonedCheckoutRequest {
    pub customer_info: crate::checkout::session::CustomerInfo,
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub add_ons: Vec<ProductId>,
    pub currency: Currency,
    #[serde(default)]
    pub cookie_data: Option<serde_json::Value>,
    #[serde(default)]
    pub page_url: Option<String>,
}

/// POST /api/checkout/abandoned
///
/// Fire-and-forget: the webhook delivery (with its bounded retry) runs on a
/// spawned task, the browser gets a 202 immediately.
pub async fn handle_abandoned_checkout(
    State(state): State<AppState>,
    Json(request): Json<AbandonedCheckoutRequest>,
) -> Result<StatusCode, AppError> {
    let cart = Cart::assemble(&request.items, &request.add_ons, request.currency)?;
    let payload = webhooks::abandoned_cart_payload(
        &request.customer_info,
        &cart,
        request.cookie_data.as_ref(),
        request.page_url.as_deref(),
    )?;

    let client = state.webhooks.clone();
    let url = state.config.make_abandoned_cart_webhook_url.clone();
    tokio::spawn(async move {
        client.send_with_retry(&url, payload).await;
    });

    Ok(StatusCode::ACCEPTED)
}
