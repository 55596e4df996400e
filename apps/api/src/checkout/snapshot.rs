#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::ProductId;
use crate::checkout::session::CustomerInfo;

/// How long a stored checkout may be resumed after step 1.
pub const SNAPSHOT_TTL_MINUTES: i64 = 45;

/// The browser-side `ob_checkout_session` snapshot: enough to land a
/// returning visitor back on the payment step without re-entering details.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSnapshot {
    pub customer_info: CustomerInfo,
    pub client_secret: String,
    pub payment_intent_id: String,
    #[serde(default)]
    pub add_ons: Vec<ProductId>,
    pub created_at: DateTime<Utc>,
}

pub fn snapshot_expired(created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now - created_at > Duration::minutes(SNAPSHOT_TTL_MINUTES)
}

/// Parses a stored snapshot. Corrupt JSON or an expired snapshot both mean
/// "start fresh" — never an error.
pub fn parse_snapshot(raw: &str, now: DateTime<Utc>) -> Option<CheckoutSnapshot> {
    let snapshot: CheckoutSnapshot = serde_json::from_str(raw).ok()?;
    if snapshot_expired(snapshot.created_at, now) {
        return None;
    }
    Some(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot_json(created_at: &str) -> String {
        format!(
            r#"{{
                "customerInfo": {{"firstName": "Jo", "lastName": "Doe", "email": "jo@example.com"}},
                "clientSecret": "pi_3PGxTAKlXPqYRnWv_secret_abc",
                "paymentIntentId": "pi_3PGxTAKlXPqYRnWv",
                "addOns": ["heavy_bag_drills"],
                "createdAt": "{created_at}"
            }}"#
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_fresh_snapshot_resumes() {
        let snapshot = parse_snapshot(&snapshot_json("2024-05-10T11:30:00Z"), now()).unwrap();
        assert_eq!(snapshot.payment_intent_id, "pi_3PGxTAKlXPqYRnWv");
        assert_eq!(snapshot.add_ons, vec![ProductId::HeavyBagDrills]);
    }

    #[test]
    fn test_expired_snapshot_starts_fresh() {
        // 46 minutes old.
        assert!(parse_snapshot(&snapshot_json("2024-05-10T11:14:00Z"), now()).is_none());
    }

    #[test]
    fn test_corrupt_snapshot_starts_fresh() {
        assert!(parse_snapshot("{not json", now()).is_none());
        assert!(parse_snapshot("{}", now()).is_none());
    }

    #[test]
    fn test_boundary_is_inclusive() {
        // Exactly 45 minutes old still resumes.
        assert!(parse_snapshot(&snapshot_json("2024-05-10T11:15:00Z"), now()).is_some());
    }
}
