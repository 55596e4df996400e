//! Product catalog for the coaching business.
//!
//! Prices live on the payment provider; this module owns the mapping from
//! product + currency to the provider price id, the funnel each product
//! checks out through, and the reporting-currency conversion.

pub mod bumps;
pub mod cart;
pub mod fx;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductId {
    FoundationsCourse,
    AllAccessBundle,
    HeavyBagDrills,
    FootworkMasterclass,
    FightIqLibrary,
    SixWeekChallenge,
    RingsideMembership,
    CoachingCallPack,
}

impl ProductId {
    pub fn slug(&self) -> &'static str {
        match self {
            ProductId::FoundationsCourse => "foundations_course",
            ProductId::AllAccessBundle => "all_access_bundle",
            ProductId::HeavyBagDrills => "heavy_bag_drills",
            ProductId::FootworkMasterclass => "footwork_masterclass",
            ProductId::FightIqLibrary => "fight_iq_library",
            ProductId::SixWeekChallenge => "six_week_challenge",
            ProductId::RingsideMembership => "ringside_membership",
            ProductId::CoachingCallPack => "coaching_call_pack",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProductId::FoundationsCourse => "Boxing Foundations Course",
            ProductId::AllAccessBundle => "All-Access Bundle",
            ProductId::HeavyBagDrills => "Heavy Bag Drill Library",
            ProductId::FootworkMasterclass => "Footwork Masterclass",
            ProductId::FightIqLibrary => "Fight IQ Video Library",
            ProductId::SixWeekChallenge => "Six-Week Challenge",
            ProductId::RingsideMembership => "Ringside Membership",
            ProductId::CoachingCallPack => "1:1 Coaching Call Pack",
        }
    }

    /// Only the membership bills on an interval; everything else is a
    /// one-time purchase.
    pub fn is_recurring(&self) -> bool {
        matches!(self, ProductId::RingsideMembership)
    }

    pub fn funnel(&self) -> Funnel {
        match self {
            ProductId::SixWeekChallenge => Funnel::SixWeekChallenge,
            ProductId::RingsideMembership => Funnel::Membership,
            ProductId::AllAccessBundle => Funnel::Bundle,
            _ => Funnel::Course,
        }
    }
}

/// Which funnel a checkout belongs to; decides the success/cancel pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Funnel {
    Course,
    SixWeekChallenge,
    Membership,
    Bundle,
}

impl Funnel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Funnel::Course => "course",
            Funnel::SixWeekChallenge => "six_week_challenge",
            Funnel::Membership => "membership",
            Funnel::Bundle => "bundle",
        }
    }

    pub fn success_path(&self) -> &'static str {
        match self {
            Funnel::Course => "/success/course",
            Funnel::SixWeekChallenge => "/success/challenge",
            Funnel::Membership => "/success/membership",
            Funnel::Bundle => "/success/bundle",
        }
    }

    pub fn cancel_path(&self) -> &'static str {
        match self {
            Funnel::Course => "/courses/foundations",
            Funnel::SixWeekChallenge => "/six-week-challenge",
            Funnel::Membership => "/membership",
            Funnel::Bundle => "/courses/foundations",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Aud,
    Cad,
}

impl Currency {
    pub const ALL: [Currency; 5] = [
        Currency::Usd,
        Currency::Eur,
        Currency::Gbp,
        Currency::Aud,
        Currency::Cad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "usd",
            Currency::Eur => "eur",
            Currency::Gbp => "gbp",
            Currency::Aud => "aud",
            Currency::Cad => "cad",
        }
    }

    /// Parses a provider currency code (case-insensitive).
    pub fn from_code(code: &str) -> Option<Currency> {
        match code.to_lowercase().as_str() {
            "usd" => Some(Currency::Usd),
            "eur" => Some(Currency::Eur),
            "gbp" => Some(Currency::Gbp),
            "aud" => Some(Currency::Aud),
            "cad" => Some(Currency::Cad),
            _ => None,
        }
    }
}

/// One currency-specific price on the payment provider.
#[derive(Debug, Clone, Copy)]
pub struct PriceListing {
    pub product: ProductId,
    pub currency: Currency,
    pub price_id: &'static str,
    /// Minor units (cents/pence).
    pub unit_amount: i64,
}

use Currency::{Aud, Cad, Eur, Gbp, Usd};
use ProductId::*;

#[rustfmt::skip]
pub const PRICE_LIST: &[PriceListing] = &[
    PriceListing { product: FoundationsCourse,   currency: Usd, price_id: "price_1PKfTnKlXPqYRnWvA9uX3dQe", unit_amount: 14700 },
    PriceListing { product: FoundationsCourse,   currency: Eur, price_id: "price_1PKfTnKlXPqYRnWvB2mR8wLc", unit_amount: 13500 },
    PriceListing { product: FoundationsCourse,   currency: Gbp, price_id: "price_1PKfTnKlXPqYRnWvC7pK4nHd", unit_amount: 11900 },
    PriceListing { product: FoundationsCourse,   currency: Aud, price_id: "price_1PKfTnKlXPqYRnWvD1qV9sMe", unit_amount: 21900 },
    PriceListing { product: FoundationsCourse,   currency: Cad, price_id: "price_1PKfTnKlXPqYRnWvE5rW2tNf", unit_amount: 19900 },
    PriceListing { product: AllAccessBundle,     currency: Usd, price_id: "price_1PKfUcKlXPqYRnWvF8sX6uPg", unit_amount: 24700 },
    PriceListing { product: AllAccessBundle,     currency: Eur, price_id: "price_1PKfUcKlXPqYRnWvG3tY1vQh", unit_amount: 22700 },
    PriceListing { product: AllAccessBundle,     currency: Gbp, price_id: "price_1PKfUcKlXPqYRnWvH9uZ7wRj", unit_amount: 19700 },
    PriceListing { product: AllAccessBundle,     currency: Aud, price_id: "price_1PKfUcKlXPqYRnWvJ4vA2xSk", unit_amount: 36700 },
    PriceListing { product: AllAccessBundle,     currency: Cad, price_id: "price_1PKfUcKlXPqYRnWvK8wB5yTl", unit_amount: 33700 },
    PriceListing { product: HeavyBagDrills,      currency: Usd, price_id: "price_1PKfVaKlXPqYRnWvL2xC9zUm", unit_amount: 3700 },
    PriceListing { product: HeavyBagDrills,      currency: Eur, price_id: "price_1PKfVaKlXPqYRnWvM6yD3aVn", unit_amount: 3400 },
    PriceListing { product: HeavyBagDrills,      currency: Gbp, price_id: "price_1PKfVaKlXPqYRnWvN1zE8bWp", unit_amount: 2900 },
    PriceListing { product: HeavyBagDrills,      currency: Aud, price_id: "price_1PKfVaKlXPqYRnWvP5aF2cXq", unit_amount: 5500 },
    PriceListing { product: HeavyBagDrills,      currency: Cad, price_id: "price_1PKfVaKlXPqYRnWvQ9bG7dYr", unit_amount: 5000 },
    PriceListing { product: FootworkMasterclass, currency: Usd, price_id: "price_1PKfWbKlXPqYRnWvR3cH1eZs", unit_amount: 4700 },
    PriceListing { product: FootworkMasterclass, currency: Eur, price_id: "price_1PKfWbKlXPqYRnWvS7dJ6fAt", unit_amount: 4300 },
    PriceListing { product: FootworkMasterclass, currency: Gbp, price_id: "price_1PKfWbKlXPqYRnWvT2eK9gBu", unit_amount: 3700 },
    PriceListing { product: FootworkMasterclass, currency: Aud, price_id: "price_1PKfWbKlXPqYRnWvU6fL3hCv", unit_amount: 6900 },
    PriceListing { product: FootworkMasterclass, currency: Cad, price_id: "price_1PKfWbKlXPqYRnWvV1gM8jDw", unit_amount: 6400 },
    PriceListing { product: FightIqLibrary,      currency: Usd, price_id: "price_1PKfXcKlXPqYRnWvW5hN2kEx", unit_amount: 2700 },
    PriceListing { product: FightIqLibrary,      currency: Eur, price_id: "price_1PKfXcKlXPqYRnWvX9jP7lFy", unit_amount: 2500 },
    PriceListing { product: FightIqLibrary,      currency: Gbp, price_id: "price_1PKfXcKlXPqYRnWvY4kQ1mGz", unit_amount: 2100 },
    PriceListing { product: FightIqLibrary,      currency: Aud, price_id: "price_1PKfXcKlXPqYRnWvZ8lR6nHa", unit_amount: 4100 },
    PriceListing { product: FightIqLibrary,      currency: Cad, price_id: "price_1PKfXcKlXPqYRnWvA3mS9pJb", unit_amount: 3700 },
    PriceListing { product: SixWeekChallenge,    currency: Usd, price_id: "price_1PKfYdKlXPqYRnWvB7nT4qKc", unit_amount: 9700 },
    PriceListing { product: SixWeekChallenge,    currency: Eur, price_id: "price_1PKfYdKlXPqYRnWvC2pU8rLd", unit_amount: 8900 },
    PriceListing { product: SixWeekChallenge,    currency: Gbp, price_id: "price_1PKfYdKlXPqYRnWvD6qV3sMe", unit_amount: 7700 },
    PriceListing { product: SixWeekChallenge,    currency: Aud, price_id: "price_1PKfYdKlXPqYRnWvE1rW7tNf", unit_amount: 14500 },
    PriceListing { product: SixWeekChallenge,    currency: Cad, price_id: "price_1PKfYdKlXPqYRnWvF5sX2uPg", unit_amount: 13200 },
    PriceListing { product: RingsideMembership,  currency: Usd, price_id: "price_1PKfZeKlXPqYRnWvG9tY6vQh", unit_amount: 2900 },
    PriceListing { product: RingsideMembership,  currency: Eur, price_id: "price_1PKfZeKlXPqYRnWvH4uZ1wRj", unit_amount: 2700 },
    PriceListing { product: RingsideMembership,  currency: Gbp, price_id: "price_1PKfZeKlXPqYRnWvJ8vA5xSk", unit_amount: 2300 },
    PriceListing { product: RingsideMembership,  currency: Aud, price_id: "price_1PKfZeKlXPqYRnWvK3wB9ySl", unit_amount: 4400 },
    PriceListing { product: RingsideMembership,  currency: Cad, price_id: "price_1PKfZeKlXPqYRnWvL7xC4zTm", unit_amount: 4000 },
    PriceListing { product: CoachingCallPack,    currency: Usd, price_id: "price_1PKfAfKlXPqYRnWvM2yD8aUn", unit_amount: 19700 },
    PriceListing { product: CoachingCallPack,    currency: Eur, price_id: "price_1PKfAfKlXPqYRnWvN6zE3bVp", unit_amount: 18100 },
    PriceListing { product: CoachingCallPack,    currency: Gbp, price_id: "price_1PKfAfKlXPqYRnWvP1aF7cWq", unit_amount: 15600 },
    PriceListing { product: CoachingCallPack,    currency: Aud, price_id: "price_1PKfAfKlXPqYRnWvQ5bG2dXr", unit_amount: 29500 },
    PriceListing { product: CoachingCallPack,    currency: Cad, price_id: "price_1PKfAfKlXPqYRnWvR9cH6eYs", unit_amount: 26800 },
];

/// Resolves a product to its currency-specific provider price.
pub fn resolve_price(product: ProductId, currency: Currency) -> Option<&'static PriceListing> {
    PRICE_LIST
        .iter()
        .find(|listing| listing.product == product && listing.currency == currency)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PRODUCTS: [ProductId; 8] = [
        FoundationsCourse,
        AllAccessBundle,
        HeavyBagDrills,
        FootworkMasterclass,
        FightIqLibrary,
        SixWeekChallenge,
        RingsideMembership,
        CoachingCallPack,
    ];

    #[test]
    fn test_every_product_resolves_in_every_currency() {
        for product in ALL_PRODUCTS {
            for currency in Currency::ALL {
                let listing = resolve_price(product, currency)
                    .unwrap_or_else(|| panic!("{:?} missing in {:?}", product, currency));
                assert_eq!(listing.currency, currency);
                assert!(listing.unit_amount > 0);
            }
        }
    }

    #[test]
    fn test_price_ids_are_unique() {
        let mut ids: Vec<_> = PRICE_LIST.iter().map(|l| l.price_id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), PRICE_LIST.len());
    }

    #[test]
    fn test_entry_product_usd_list_price() {
        let listing = resolve_price(FoundationsCourse, Usd).unwrap();
        assert_eq!(listing.unit_amount, 14700);
    }

    #[test]
    fn test_only_membership_recurs() {
        for product in ALL_PRODUCTS {
            assert_eq!(
                product.is_recurring(),
                product == RingsideMembership,
                "{product:?}"
            );
        }
    }

    #[test]
    fn test_funnel_paths() {
        assert_eq!(Funnel::Course.success_path(), "/success/course");
        assert_eq!(
            ProductId::SixWeekChallenge.funnel(),
            Funnel::SixWeekChallenge
        );
        assert_eq!(ProductId::RingsideMembership.funnel(), Funnel::Membership);
    }

    #[test]
    fn test_currency_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&Currency::Usd).unwrap(), "\"usd\"");
        let parsed: Currency = serde_json::from_str("\"gbp\"").unwrap();
        assert_eq!(parsed, Currency::Gbp);
    }
}
