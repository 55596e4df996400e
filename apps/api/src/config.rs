use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub stripe_secret_key: String,
    pub facebook_pixel_id: String,
    pub facebook_access_token: String,
    /// Public base URL of the marketing site, used to build checkout
    /// success/cancel URLs and the post-purchase onboarding redirect.
    pub site_base_url: String,
    pub make_challenge_webhook_url: String,
    pub make_abandoned_cart_webhook_url: String,
    /// Optional Slack incoming-webhook URL for workflow notifications.
    pub slack_webhook_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            stripe_secret_key: require_env("STRIPE_SECRET_KEY")?,
            facebook_pixel_id: require_env("FACEBOOK_PIXEL_ID")?,
            facebook_access_token: require_env("FACEBOOK_ACCESS_TOKEN")?,
            site_base_url: require_env("SITE_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())?,
            make_challenge_webhook_url: require_env("MAKE_CHALLENGE_WEBHOOK_URL")?,
            make_abandoned_cart_webhook_url: require_env("MAKE_ABANDONED_CART_WEBHOOK_URL")?,
            slack_webhook_url: std::env::var("SLACK_WEBHOOK_URL").ok(),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
