pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::{attribution, checkout, conversions, events, sessions, upsell, webhooks};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Attribution
        .route(
            "/api/track/visit",
            get(attribution::handlers::handle_track_visit),
        )
        // Checkout
        .route(
            "/api/checkout/session",
            post(checkout::handlers::handle_create_session),
        )
        .route(
            "/api/checkout/amount",
            post(checkout::handlers::handle_update_amount),
        )
        .route(
            "/api/checkout/abandoned",
            post(checkout::handlers::handle_abandoned_checkout),
        )
        // Post-purchase upsell
        .route(
            "/api/upsell/charge",
            post(upsell::handlers::handle_upsell_charge),
        )
        // Transaction lookup
        .route("/api/session", get(sessions::handle_get_session))
        // Conversion reporting
        .route(
            "/api/purchase/track",
            post(conversions::handlers::handle_track_purchase),
        )
        .route(
            "/api/facebook-purchase",
            post(conversions::handlers::handle_facebook_purchase),
        )
        // Analytics
        .route("/api/events", post(events::handlers::handle_track_event))
        // Outbound automation
        .route(
            "/api/webhooks/challenge-signup",
            post(webhooks::handlers::handle_challenge_signup),
        )
        .with_state(state)
}
