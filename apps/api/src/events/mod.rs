//! Generic event/analytics logging.
//!
//! Everything here is best-effort: inserts run on spawned tasks, failures
//! are logged to the console and never reach the caller.

pub mod geo;
pub mod handlers;
pub mod workflow;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::models::event::EventRecord;

/// Free-text fields are capped so one oversized DOM label cannot bloat the
/// analytics table.
pub const MAX_TEXT_LEN: usize = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackEventInput {
    pub event_name: String,
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default)]
    pub element_id: Option<String>,
    #[serde(default)]
    pub element_text: Option<String>,
    #[serde(default)]
    pub element_type: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub tracking_params: Option<serde_json::Value>,
}

pub fn truncate_text(text: &str) -> String {
    text.chars().take(MAX_TEXT_LEN).collect()
}

pub fn build_event_record(
    input: &TrackEventInput,
    country: Option<String>,
    now: DateTime<Utc>,
) -> EventRecord {
    EventRecord {
        id: Uuid::new_v4(),
        event_name: truncate_text(input.event_name.trim()),
        page_url: input.page_url.clone(),
        element_id: input.element_id.as_deref().map(truncate_text),
        element_text: input.element_text.as_deref().map(truncate_text),
        element_type: input.element_type.as_deref().map(truncate_text),
        value: input.value,
        metadata: input.metadata.clone(),
        session_id: input
            .session_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        tracking_params: input.tracking_params.clone(),
        country,
        created_at: now,
    }
}

/// Fire-and-forget analytics write. Returns immediately; the geolocation
/// lookup and insert happen on a spawned task.
pub fn track_event(pool: PgPool, input: TrackEventInput, client_ip: Option<String>) {
    tokio::spawn(async move {
        let country = match client_ip {
            Some(ip) => geo::lookup_country(&ip).await,
            None => None,
        };
        let record = build_event_record(&input, country, Utc::now());
        if let Err(e) = insert_event(&pool, &record).await {
            warn!("event insert failed for '{}': {e}", record.event_name);
        }
    });
}

async fn insert_event(pool: &PgPool, record: &EventRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO events
            (id, event_name, page_url, element_id, element_text, element_type,
             value, metadata, session_id, tracking_params, country, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(record.id)
    .bind(&record.event_name)
    .bind(&record.page_url)
    .bind(&record.element_id)
    .bind(&record.element_text)
    .bind(&record.element_type)
    .bind(record.value)
    .bind(&record.metadata)
    .bind(&record.session_id)
    .bind(&record.tracking_params)
    .bind(&record.country)
    .bind(record.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_caps_at_100_chars() {
        let long = "x".repeat(250);
        assert_eq!(truncate_text(&long).len(), 100);
        assert_eq!(truncate_text("short"), "short");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let emoji = "🥊".repeat(120);
        let truncated = truncate_text(&emoji);
        assert_eq!(truncated.chars().count(), 100);
    }

    #[test]
    fn test_record_generates_session_id_when_missing() {
        let record = build_event_record(
            &TrackEventInput {
                event_name: "page_view".to_string(),
                ..Default::default()
            },
            None,
            Utc::now(),
        );
        assert!(!record.session_id.is_empty());
    }

    #[test]
    fn test_record_keeps_provided_session_id_and_truncates() {
        let record = build_event_record(
            &TrackEventInput {
                event_name: "button_click".to_string(),
                element_text: Some("Join the challenge ".repeat(20)),
                session_id: Some("sess-1".to_string()),
                ..Default::default()
            },
            Some("GB".to_string()),
            Utc::now(),
        );
        assert_eq!(record.session_id, "sess-1");
        assert_eq!(record.element_text.as_ref().unwrap().chars().count(), 100);
        assert_eq!(record.country.as_deref(), Some("GB"));
    }
}
