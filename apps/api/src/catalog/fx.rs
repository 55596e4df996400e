use crate::catalog::Currency;

/// Fixed conversion rates into the USD reporting currency.
/// Reporting only — charges always happen in the buyer's currency.
fn usd_rate(currency: Currency) -> f64 {
    match currency {
        Currency::Usd => 1.0,
        Currency::Eur => 1.08,
        Currency::Gbp => 1.27,
        Currency::Aud => 0.66,
        Currency::Cad => 0.73,
    }
}

/// Converts a minor-unit amount to USD major units, rounded to cents.
pub fn normalize_to_usd(amount_minor: i64, currency: Currency) -> f64 {
    let usd = amount_minor as f64 / 100.0 * usd_rate(currency);
    (usd * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usd_passes_through() {
        assert_eq!(normalize_to_usd(14700, Currency::Usd), 147.0);
    }

    #[test]
    fn test_gbp_converts_and_rounds() {
        // 119.00 GBP * 1.27 = 151.13
        assert_eq!(normalize_to_usd(11900, Currency::Gbp), 151.13);
    }

    #[test]
    fn test_aud_converts_down() {
        // 219.00 AUD * 0.66 = 144.54
        assert_eq!(normalize_to_usd(21900, Currency::Aud), 144.54);
    }
}
