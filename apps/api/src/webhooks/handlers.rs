use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::checkout::session::CustomerInfo;
use crate::errors::AppError;
use crate::events::workflow::WorkflowLogger;
use crate::state::AppState;
use crate::webhooks::challenge_signup_payload;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeSignupRequest {
    pub customer_info: CustomerInfo,
    #[serde(default)]
    pub cookie_data: Option<serde_json::Value>,
}

/// POST /api/webhooks/challenge-signup
///
/// Forwards the signup to the Make.com scenario on a spawned task; delivery
/// is traced through the workflow log.
pub async fn handle_challenge_signup(
    State(state): State<AppState>,
    Json(request): Json<ChallengeSignupRequest>,
) -> Result<StatusCode, AppError> {
    request.customer_info.validate()?;
    let email = request.customer_info.email.trim().to_string();
    let payload = challenge_signup_payload(&request.customer_info, request.cookie_data.as_ref());

    let logger = WorkflowLogger::new(
        state.db.clone(),
        state.config.slack_webhook_url.clone(),
        "challenge_signup",
        "webhook",
    );
    let client = state.webhooks.clone();
    let url = state.config.make_challenge_webhook_url.clone();
    tokio::spawn(async move {
        logger.started(&format!("challenge signup for {email}")).await;
        if client.send_with_retry(&url, payload).await {
            logger.completed("signup forwarded to Make.com").await;
        } else {
            logger.failed("signup webhook undelivered after retries").await;
        }
    });

    Ok(StatusCode::ACCEPTED)
}
