use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// One row of the append-only `events` analytics table.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub id: Uuid,
    pub event_name: String,
    pub page_url: Option<String>,
    pub element_id: Option<String>,
    pub element_text: Option<String>,
    pub element_type: Option<String>,
    pub value: Option<f64>,
    pub metadata: Option<Value>,
    pub session_id: String,
    pub tracking_params: Option<Value>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
}
