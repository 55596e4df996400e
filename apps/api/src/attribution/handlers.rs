use axum::{
    extract::Query,
    http::{header, HeaderMap},
    response::{AppendHeaders, IntoResponse},
    Json,
};
use chrono::Utc;

use crate::attribution::cookie::{
    merge_visit, parse_tracking_cookie, AttributionCookie, VisitParams, TRACKING_COOKIE,
};
use crate::errors::AppError;

const COOKIE_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 365;

/// GET /api/track/visit
///
/// Reads the current attribution cookie, merges the visit's UTM/referrer
/// parameters under the first/last-touch rules and re-sets the cookie.
pub async fn handle_track_visit(
    headers: HeaderMap,
    Query(visit): Query<VisitParams>,
) -> Result<impl IntoResponse, AppError> {
    let existing = parse_tracking_cookie(
        headers
            .get(header::COOKIE)
            .and_then(|value| value.to_str().ok()),
    );
    let merged = merge_visit(existing, &visit, Utc::now());
    let set_cookie = tracking_set_cookie(&merged)?;

    Ok((
        AppendHeaders([(header::SET_COOKIE, set_cookie)]),
        Json(merged),
    ))
}

fn tracking_set_cookie(record: &AttributionCookie) -> Result<String, AppError> {
    let json = serde_json::to_string(record)
        .map_err(|e| anyhow::anyhow!("failed to serialize attribution cookie: {e}"))?;
    let value = urlencoding::encode(&json).into_owned();
    Ok(format!(
        "{TRACKING_COOKIE}={value}; Path=/; Max-Age={COOKIE_MAX_AGE_SECS}; SameSite=Lax"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_cookie_is_url_encoded_json() {
        let record = AttributionCookie {
            last_utm_source: Some("facebook".to_string()),
            ..Default::default()
        };
        let cookie = tracking_set_cookie(&record).unwrap();
        assert!(cookie.starts_with("ob_track=%7B"));
        assert!(cookie.contains("SameSite=Lax"));
        let value = cookie
            .strip_prefix("ob_track=")
            .unwrap()
            .split(';')
            .next()
            .unwrap();
        let decoded = urlencoding::decode(value).unwrap();
        let parsed: AttributionCookie = serde_json::from_str(&decoded).unwrap();
        assert_eq!(parsed, record);
    }
}
