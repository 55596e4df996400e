use serde::{Deserialize, Serialize};

use crate::catalog::{resolve_price, Currency, Funnel, ProductId};
use crate::errors::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CartItem {
    pub product: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// A resolved, deduplicated cart in a single currency.
#[derive(Debug, Clone)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub currency: Currency,
}

#[derive(Debug, Serialize)]
pub struct CartSummaryItem {
    pub product: ProductId,
    pub quantity: u32,
    pub amount: i64,
}

impl Cart {
    /// Assembles the final cart from the base items plus selected add-ons.
    ///
    /// The all-access bundle replaces the entry course when selected, and
    /// appears exactly once no matter how it was selected. Duplicate
    /// products merge into one line.
    pub fn assemble(
        items: &[CartItem],
        add_ons: &[ProductId],
        currency: Currency,
    ) -> Result<Cart, AppError> {
        if items.is_empty() && add_ons.is_empty() {
            return Err(AppError::Validation("cart cannot be empty".to_string()));
        }

        let mut combined: Vec<CartItem> = items.to_vec();
        combined.extend(add_ons.iter().map(|&product| CartItem {
            product,
            quantity: 1,
        }));

        let bundle_selected = combined
            .iter()
            .any(|item| item.product == ProductId::AllAccessBundle);

        let mut deduped: Vec<CartItem> = Vec::new();
        for item in combined {
            if item.quantity == 0 {
                continue;
            }
            // Bundle substitution: the entry course is folded into the bundle.
            if bundle_selected && item.product == ProductId::FoundationsCourse {
                continue;
            }
            match deduped.iter_mut().find(|d| d.product == item.product) {
                Some(existing) if item.product == ProductId::AllAccessBundle => {
                    existing.quantity = 1;
                }
                Some(existing) => existing.quantity += item.quantity,
                None => deduped.push(CartItem {
                    product: item.product,
                    quantity: if item.product == ProductId::AllAccessBundle {
                        1
                    } else {
                        item.quantity
                    },
                }),
            }
        }

        if deduped.is_empty() {
            return Err(AppError::Validation("cart cannot be empty".to_string()));
        }

        Ok(Cart {
            items: deduped,
            currency,
        })
    }

    /// Total in minor units of the cart currency.
    pub fn total(&self) -> Result<i64, AppError> {
        self.items.iter().try_fold(0i64, |acc, item| {
            let listing = resolve_price(item.product, self.currency).ok_or_else(|| {
                AppError::Validation(format!(
                    "{} is not available in {}",
                    item.product.slug(),
                    self.currency.as_str()
                ))
            })?;
            Ok(acc + listing.unit_amount * item.quantity as i64)
        })
    }

    /// A cart with any recurring product checks out as a subscription.
    pub fn is_subscription(&self) -> bool {
        self.items.iter().any(|item| item.product.is_recurring())
    }

    /// The funnel the checkout belongs to — the most specific product wins.
    pub fn funnel(&self) -> Funnel {
        let has = |p: ProductId| self.items.iter().any(|item| item.product == p);
        if has(ProductId::AllAccessBundle) {
            Funnel::Bundle
        } else if has(ProductId::RingsideMembership) {
            Funnel::Membership
        } else if has(ProductId::SixWeekChallenge) {
            Funnel::SixWeekChallenge
        } else {
            Funnel::Course
        }
    }

    /// The headline product of the cart, recorded as `entry_product` in
    /// checkout metadata.
    pub fn entry_product(&self) -> ProductId {
        self.items[0].product
    }

    pub fn summary(&self) -> Result<Vec<CartSummaryItem>, AppError> {
        self.items
            .iter()
            .map(|item| {
                let listing = resolve_price(item.product, self.currency).ok_or_else(|| {
                    AppError::Validation(format!(
                        "{} is not available in {}",
                        item.product.slug(),
                        self.currency.as_str()
                    ))
                })?;
                Ok(CartSummaryItem {
                    product: item.product,
                    quantity: item.quantity,
                    amount: listing.unit_amount * item.quantity as i64,
                })
            })
            .collect()
    }

    pub fn summary_json(&self) -> Result<String, AppError> {
        let summary = self.summary()?;
        serde_json::to_string(&summary)
            .map_err(|e| anyhow::anyhow!("failed to serialize cart summary: {e}").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(product: ProductId) -> CartItem {
        CartItem {
            product,
            quantity: 1,
        }
    }

    #[test]
    fn test_bundle_replaces_entry_course() {
        let cart = Cart::assemble(
            &[item(ProductId::FoundationsCourse)],
            &[ProductId::AllAccessBundle, ProductId::HeavyBagDrills],
            Currency::Usd,
        )
        .unwrap();

        let bundles = cart
            .items
            .iter()
            .filter(|i| i.product == ProductId::AllAccessBundle)
            .count();
        assert_eq!(bundles, 1);
        assert!(!cart
            .items
            .iter()
            .any(|i| i.product == ProductId::FoundationsCourse));
        assert!(cart
            .items
            .iter()
            .any(|i| i.product == ProductId::HeavyBagDrills));
    }

    #[test]
    fn test_bundle_never_appears_twice() {
        let cart = Cart::assemble(
            &[item(ProductId::AllAccessBundle)],
            &[ProductId::AllAccessBundle],
            Currency::Usd,
        )
        .unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 1);
    }

    #[test]
    fn test_duplicate_bumps_merge() {
        let cart = Cart::assemble(
            &[item(ProductId::FoundationsCourse)],
            &[ProductId::HeavyBagDrills, ProductId::HeavyBagDrills],
            Currency::Usd,
        )
        .unwrap();
        let drills = cart
            .items
            .iter()
            .find(|i| i.product == ProductId::HeavyBagDrills)
            .unwrap();
        assert_eq!(drills.quantity, 2);
    }

    #[test]
    fn test_empty_cart_rejected() {
        assert!(Cart::assemble(&[], &[], Currency::Usd).is_err());
    }

    #[test]
    fn test_total_sums_resolved_prices() {
        let cart = Cart::assemble(
            &[item(ProductId::FoundationsCourse)],
            &[ProductId::FootworkMasterclass],
            Currency::Usd,
        )
        .unwrap();
        assert_eq!(cart.total().unwrap(), 14700 + 4700);
    }

    #[test]
    fn test_totals_follow_the_cart_currency() {
        for currency in Currency::ALL {
            let cart = Cart::assemble(&[item(ProductId::FoundationsCourse)], &[], currency).unwrap();
            let listing = resolve_price(ProductId::FoundationsCourse, currency).unwrap();
            assert_eq!(cart.total().unwrap(), listing.unit_amount);
        }
    }

    #[test]
    fn test_membership_cart_is_subscription() {
        let cart =
            Cart::assemble(&[item(ProductId::RingsideMembership)], &[], Currency::Usd).unwrap();
        assert!(cart.is_subscription());
        assert_eq!(cart.funnel(), Funnel::Membership);

        let one_time =
            Cart::assemble(&[item(ProductId::FoundationsCourse)], &[], Currency::Usd).unwrap();
        assert!(!one_time.is_subscription());
        assert_eq!(one_time.funnel(), Funnel::Course);
    }

    #[test]
    fn test_bundle_cart_uses_bundle_funnel() {
        let cart = Cart::assemble(
            &[item(ProductId::FoundationsCourse)],
            &[ProductId::AllAccessBundle],
            Currency::Usd,
        )
        .unwrap();
        assert_eq!(cart.funnel(), Funnel::Bundle);
        assert_eq!(cart.entry_product(), ProductId::AllAccessBundle);
    }
}
