//! Checkout session building.
//!
//! Turns a validated cart + customer into a provider checkout: either a
//! hosted session (redirect URL) or an on-page payment intent, with the
//! attribution cookie flattened into metadata and one-time payments armed
//! for the post-purchase one-click upsell.

pub mod handlers;
pub mod session;
pub mod snapshot;

pub use session::{create_checkout_session, CreateSessionRequest, SessionResponse};
