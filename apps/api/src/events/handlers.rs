use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};

use crate::errors::AppError;
use crate::events::{track_event, TrackEventInput};
use crate::state::AppState;

/// POST /api/events
///
/// Acknowledges immediately; the insert happens on a spawned task.
pub async fn handle_track_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<TrackEventInput>,
) -> Result<StatusCode, AppError> {
    if input.event_name.trim().is_empty() {
        return Err(AppError::Validation("event_name is required".to_string()));
    }
    let client_ip = client_ip_from_headers(&headers);
    track_event(state.db.clone(), input, client_ip);
    Ok(StatusCode::ACCEPTED)
}

fn client_ip_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_takes_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(
            client_ip_from_headers(&headers),
            Some("203.0.113.9".to_string())
        );
    }

    #[test]
    fn test_client_ip_absent() {
        assert_eq!(client_ip_from_headers(&HeaderMap::new()), None);
    }
}
