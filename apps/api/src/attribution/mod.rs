//! Marketing attribution capture.
//!
//! First/last-touch UTM parameters, referrers, the shared session/event ids
//! and the Facebook click id live in the `ob_track` cookie as URL-encoded
//! JSON. The merge rules are pure functions here; the `/api/track/visit`
//! endpoint applies them and re-sets the cookie.

pub mod cookie;
pub mod handlers;
pub mod metadata;

pub use cookie::{
    cookie_value, merge_visit, parse_tracking_cookie, AttributionCookie, VisitParams,
    TRACKING_COOKIE,
};
pub use metadata::flatten_for_metadata;
