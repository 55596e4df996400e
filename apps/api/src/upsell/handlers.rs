use axum::{extract::State, Json};

use crate::errors::AppError;
use crate::events::workflow::WorkflowLogger;
use crate::state::AppState;
use crate::upsell::charge::{charge, UpsellChargeRequest, UpsellChargeResponse};

/// POST /api/upsell/charge
pub async fn handle_upsell_charge(
    State(state): State<AppState>,
    Json(request): Json<UpsellChargeRequest>,
) -> Result<Json<UpsellChargeResponse>, AppError> {
    match charge(&state, request).await {
        Ok(response) => Ok(Json(response)),
        Err(err) => {
            // Provider outages get a workflow-log row for ops visibility;
            // declines and validation failures are expected traffic.
            if matches!(err, AppError::Stripe(_)) {
                let logger = WorkflowLogger::new(
                    state.db.clone(),
                    state.config.slack_webhook_url.clone(),
                    "upsell_charge",
                    "payment",
                );
                logger.failed(&err.to_string()).await;
            }
            Err(err)
        }
    }
}
