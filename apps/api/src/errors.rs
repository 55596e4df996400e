use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::stripe_client::StripeError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Card declined: {0}")]
    CardDeclined(String),

    #[error("Payment provider error: {0}")]
    Stripe(StripeError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Card declines become 402s and unknown ids 404s at the API boundary;
/// every other provider failure is an opaque 500.
impl From<StripeError> for AppError {
    fn from(err: StripeError) -> Self {
        if err.is_card_error() {
            return AppError::CardDeclined(err.message());
        }
        if matches!(err, StripeError::Api { status: 404, .. }) {
            return AppError::NotFound(err.message());
        }
        AppError::Stripe(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::CardDeclined(msg) => {
                (StatusCode::PAYMENT_REQUIRED, "CARD_DECLINED", msg.clone())
            }
            AppError::Stripe(e) => {
                tracing::error!("Stripe error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "PAYMENT_PROVIDER_ERROR",
                    "A payment provider error occurred".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_error_maps_to_declined() {
        let err = StripeError::Api {
            status: 402,
            error_type: "card_error".to_string(),
            code: Some("card_declined".to_string()),
            message: "Your card was declined.".to_string(),
        };
        let app: AppError = err.into();
        assert!(matches!(app, AppError::CardDeclined(_)));
    }

    #[test]
    fn test_other_provider_error_stays_internal() {
        let err = StripeError::Api {
            status: 500,
            error_type: "api_error".to_string(),
            code: None,
            message: "something broke".to_string(),
        };
        let app: AppError = err.into();
        assert!(matches!(app, AppError::Stripe(_)));
    }
}
