mod attribution;
mod catalog;
mod checkout;
mod config;
mod conversions;
mod db;
mod errors;
mod events;
mod models;
mod routes;
mod sessions;
mod state;
mod stripe_client;
mod upsell;
mod webhooks;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::conversions::capi::CapiClient;
use crate::db::create_pool;
use crate::routes::build_router;
use crate::state::AppState;
use crate::stripe_client::StripeClient;
use crate::webhooks::WebhookClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Ringside checkout API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the analytics PostgreSQL pool
    let db = create_pool(&config.database_url).await?;

    // Initialize Stripe
    let stripe = StripeClient::new(config.stripe_secret_key.clone());
    info!("Stripe client initialized");

    // Initialize the Conversions API reporter
    let reporter = Arc::new(CapiClient::new(
        config.facebook_pixel_id.clone(),
        config.facebook_access_token.clone(),
    ));
    info!("Conversions API client initialized (pixel: {})", config.facebook_pixel_id);

    // Initialize the outbound webhook client
    let webhooks = WebhookClient::new(db.clone());

    // Build app state
    let state = AppState {
        db,
        stripe,
        reporter,
        webhooks,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // the marketing pages call us cross-origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
