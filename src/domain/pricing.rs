//! Checkout totals: tax, shipping and coupon discount on top of a cart subtotal.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::aggregates::coupon::Coupon;
use super::value_objects::Money;

/// Store-wide pricing rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Fraction of the subtotal charged as tax (0.18 = 18% GST).
    pub tax_rate: Decimal,
    /// Flat shipping fee charged below the free-shipping threshold.
    pub shipping_fee: Decimal,
    pub free_shipping_threshold: Decimal,
    pub currency: String,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(18, 2),
            shipping_fee: Decimal::new(50, 0),
            free_shipping_threshold: Decimal::new(500, 0),
            currency: "INR".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub tax: Money,
    pub shipping: Money,
    pub discount: Money,
    pub total: Money,
}

impl PricingPolicy {
    pub fn tax_on(&self, subtotal: Decimal) -> Decimal { subtotal * self.tax_rate }

    pub fn shipping_for(&self, subtotal: Decimal) -> Decimal {
        if subtotal < self.free_shipping_threshold { self.shipping_fee } else { Decimal::ZERO }
    }

    /// `total = subtotal + tax + shipping - discount`. The total is not
    /// floored, so a fixed discount larger than the order drives it negative.
    pub fn totals(&self, subtotal: Decimal, discount: Decimal) -> OrderTotals {
        let tax = self.tax_on(subtotal);
        let shipping = self.shipping_for(subtotal);
        let total = subtotal + tax + shipping - discount;
        if total.is_sign_negative() && !total.is_zero() {
            tracing::warn!(%subtotal, %discount, %total, "order total is negative");
        }
        OrderTotals {
            subtotal: self.money(subtotal),
            tax: self.money(tax),
            shipping: self.money(shipping),
            discount: self.money(discount),
            total: self.money(total),
        }
    }

    /// Totals with the coupon (if any) re-validated against `now` and the
    /// current subtotal.
    pub fn totals_with_coupon(&self, subtotal: Decimal, coupon: Option<&Coupon>, now: DateTime<Utc>) -> OrderTotals {
        let discount = coupon.map_or(Decimal::ZERO, |c| c.discount_for(subtotal, now));
        self.totals(subtotal, discount)
    }

    fn money(&self, amount: Decimal) -> Money { Money::new(amount, &self.currency) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::coupon::{sample_coupon, DiscountKind};

    #[test]
    fn test_free_shipping_with_percentage_coupon() {
        let now = Utc::now();
        let policy = PricingPolicy::default();
        let welcome = sample_coupon("WELCOME10", DiscountKind::Percentage, 10, 100, now);
        let totals = policy.totals_with_coupon(Decimal::new(1000, 0), Some(&welcome), now);
        assert_eq!(totals.tax.amount(), Decimal::new(180, 0));
        assert_eq!(totals.shipping.amount(), Decimal::ZERO);
        assert_eq!(totals.discount.amount(), Decimal::new(100, 0));
        assert_eq!(totals.total.amount(), Decimal::new(1080, 0));
    }

    #[test]
    fn test_small_order_pays_shipping() {
        let totals = PricingPolicy::default().totals(Decimal::new(300, 0), Decimal::ZERO);
        assert_eq!(totals.tax.amount(), Decimal::new(54, 0));
        assert_eq!(totals.shipping.amount(), Decimal::new(50, 0));
        assert_eq!(totals.total.amount(), Decimal::new(404, 0));
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let policy = PricingPolicy::default();
        assert_eq!(policy.shipping_for(Decimal::new(500, 0)), Decimal::ZERO);
        assert_eq!(policy.shipping_for(Decimal::new(49999, 2)), Decimal::new(50, 0));
    }

    #[test]
    fn test_oversized_fixed_coupon_goes_negative() {
        let now = Utc::now();
        let coupon = sample_coupon("HUGE", DiscountKind::Fixed, 1000, 0, now);
        let totals = PricingPolicy::default().totals_with_coupon(Decimal::new(100, 0), Some(&coupon), now);
        // 100 + 18 + 50 - 1000
        assert_eq!(totals.total.amount(), Decimal::new(-832, 0));
        assert!(totals.total.amount() < totals.tax.amount() + totals.shipping.amount());
        assert!(totals.total.is_negative());
    }

    #[test]
    fn test_coupon_below_minimum_ignored() {
        let now = Utc::now();
        let coupon = sample_coupon("SAVE50", DiscountKind::Fixed, 50, 500, now);
        let totals = PricingPolicy::default().totals_with_coupon(Decimal::new(300, 0), Some(&coupon), now);
        assert_eq!(totals.discount.amount(), Decimal::ZERO);
        assert_eq!(totals.total.amount(), Decimal::new(404, 0));
    }
}
