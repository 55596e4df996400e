//! Post-purchase one-click upsell.
//!
//! Reuses the customer and payment method from a finished checkout session
//! to charge an additional product off-session, without the buyer
//! re-entering card details.

pub mod charge;
pub mod handlers;

pub use charge::{charge, resolve_payment_source, UpsellChargeRequest, UpsellChargeResponse};
