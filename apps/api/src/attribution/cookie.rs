use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TRACKING_COOKIE: &str = "ob_track";

/// The browser-persisted attribution record.
///
/// First-touch fields are written once and never overwritten; last-touch
/// fields follow the newest UTM/referrer combination. `session_id` and
/// `event_id` are sticky for the cookie's lifetime so browser- and
/// server-side conversion events can be deduplicated downstream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionCookie {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_utm_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_utm_medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_utm_campaign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_utm_term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_utm_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_utm_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_utm_medium: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_utm_campaign: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_utm_term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_utm_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_referrer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_touch_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_touch_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fbclid: Option<String>,
}

/// UTM/referrer data carried by a single page visit, straight from the
/// query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisitParams {
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub referrer: Option<String>,
    pub fbclid: Option<String>,
}

impl VisitParams {
    fn has_utm(&self) -> bool {
        self.utm_source.is_some()
            || self.utm_medium.is_some()
            || self.utm_campaign.is_some()
            || self.utm_term.is_some()
            || self.utm_content.is_some()
    }
}

/// Returns the parsed JSON value of a cookie, or None for a missing cookie
/// or malformed JSON. Never errors.
pub fn cookie_value(header: &str, name: &str) -> Option<serde_json::Value> {
    let raw = raw_cookie(header, name)?;
    let decoded = urlencoding::decode(&raw).ok()?;
    serde_json::from_str(&decoded).ok()
}

fn raw_cookie(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Parses the `ob_track` cookie out of a Cookie header. A missing cookie or
/// one that fails to parse yields the empty record.
pub fn parse_tracking_cookie(header: Option<&str>) -> AttributionCookie {
    header
        .and_then(|h| cookie_value(h, TRACKING_COOKIE))
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}

/// Merges one visit into the stored attribution record.
///
/// First-touch fields are set only when currently unset. Last-touch fields
/// are overwritten whenever the visit carries any UTM parameter; the
/// last referrer follows any new external referrer.
pub fn merge_visit(
    existing: AttributionCookie,
    visit: &VisitParams,
    now: DateTime<Utc>,
) -> AttributionCookie {
    let mut merged = existing;
    let now_iso = now.to_rfc3339();

    if visit.has_utm() {
        if merged.first_utm_source.is_none() {
            merged.first_utm_source = visit.utm_source.clone();
            merged.first_utm_medium = visit.utm_medium.clone();
            merged.first_utm_campaign = visit.utm_campaign.clone();
            merged.first_utm_term = visit.utm_term.clone();
            merged.first_utm_content = visit.utm_content.clone();
        }
        merged.last_utm_source = visit.utm_source.clone();
        merged.last_utm_medium = visit.utm_medium.clone();
        merged.last_utm_campaign = visit.utm_campaign.clone();
        merged.last_utm_term = visit.utm_term.clone();
        merged.last_utm_content = visit.utm_content.clone();
        merged.last_touch_at = Some(now_iso.clone());
    }

    if let Some(referrer) = &visit.referrer {
        if merged.first_referrer.is_none() {
            merged.first_referrer = Some(referrer.clone());
        }
        if merged.last_referrer.as_deref() != Some(referrer) {
            merged.last_referrer = Some(referrer.clone());
            merged.last_touch_at = Some(now_iso.clone());
        }
    }

    if merged.first_touch_at.is_none() {
        merged.first_touch_at = Some(now_iso);
    }
    if let Some(fbclid) = &visit.fbclid {
        merged.fbclid = Some(fbclid.clone());
    }
    if merged.session_id.is_none() {
        merged.session_id = Some(Uuid::new_v4().to_string());
    }
    if merged.event_id.is_none() {
        merged.event_id = Some(Uuid::new_v4().to_string());
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn visit(source: &str, medium: &str) -> VisitParams {
        VisitParams {
            utm_source: Some(source.to_string()),
            utm_medium: Some(medium.to_string()),
            ..Default::default()
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_first_touch_is_never_overwritten() {
        let first = merge_visit(AttributionCookie::default(), &visit("facebook", "cpc"), at(9));
        assert_eq!(first.first_utm_source.as_deref(), Some("facebook"));
        assert_eq!(first.last_utm_source.as_deref(), Some("facebook"));

        let second = merge_visit(first, &visit("google", "organic"), at(14));
        assert_eq!(second.first_utm_source.as_deref(), Some("facebook"));
        assert_eq!(second.first_utm_medium.as_deref(), Some("cpc"));
        assert_eq!(second.last_utm_source.as_deref(), Some("google"));
        assert_eq!(second.last_utm_medium.as_deref(), Some("organic"));
    }

    #[test]
    fn test_visit_without_utm_keeps_last_touch() {
        let first = merge_visit(AttributionCookie::default(), &visit("facebook", "cpc"), at(9));
        let second = merge_visit(first.clone(), &VisitParams::default(), at(14));
        assert_eq!(second.last_utm_source, first.last_utm_source);
        assert_eq!(second.last_touch_at, first.last_touch_at);
    }

    #[test]
    fn test_session_and_event_ids_are_sticky() {
        let first = merge_visit(AttributionCookie::default(), &visit("facebook", "cpc"), at(9));
        let second = merge_visit(first.clone(), &visit("google", "organic"), at(14));
        assert_eq!(second.session_id, first.session_id);
        assert_eq!(second.event_id, first.event_id);
        assert!(second.session_id.is_some());
    }

    #[test]
    fn test_new_referrer_updates_last_only() {
        let initial = merge_visit(
            AttributionCookie::default(),
            &VisitParams {
                referrer: Some("https://facebook.com".to_string()),
                ..Default::default()
            },
            at(9),
        );
        let updated = merge_visit(
            initial,
            &VisitParams {
                referrer: Some("https://youtube.com".to_string()),
                ..Default::default()
            },
            at(14),
        );
        assert_eq!(
            updated.first_referrer.as_deref(),
            Some("https://facebook.com")
        );
        assert_eq!(
            updated.last_referrer.as_deref(),
            Some("https://youtube.com")
        );
    }

    #[test]
    fn test_malformed_cookie_is_treated_as_absent() {
        let header = format!("{TRACKING_COOKIE}=%7Bnot-json; other=1");
        let parsed = parse_tracking_cookie(Some(&header));
        assert_eq!(parsed, AttributionCookie::default());
    }

    #[test]
    fn test_missing_cookie_is_empty() {
        assert_eq!(parse_tracking_cookie(None), AttributionCookie::default());
        assert_eq!(
            parse_tracking_cookie(Some("other=1")),
            AttributionCookie::default()
        );
    }

    #[test]
    fn test_cookie_roundtrip_through_header() {
        let record = merge_visit(AttributionCookie::default(), &visit("facebook", "cpc"), at(9));
        let encoded = urlencoding::encode(&serde_json::to_string(&record).unwrap()).into_owned();
        let header = format!("{TRACKING_COOKIE}={encoded}");
        assert_eq!(parse_tracking_cookie(Some(&header)), record);
    }

    #[test]
    fn test_cookie_value_returns_parsed_json() {
        let header = "ob_track=%7B%22session_id%22%3A%22abc%22%7D";
        let value = cookie_value(header, "ob_track").unwrap();
        assert_eq!(value["session_id"], "abc");
        assert!(cookie_value(header, "missing").is_none());
    }
}
