//! Coupon Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::value_objects::CouponCode;

pub type CouponId = i64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    Percentage,
    Fixed,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Percentage => "percentage", Self::Fixed => "fixed" }
    }
}

impl std::str::FromStr for DiscountKind {
    type Err = CouponError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(Self::Percentage),
            "fixed" => Ok(Self::Fixed),
            other => Err(CouponError::UnknownDiscountKind(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub code: CouponCode,
    pub discount_kind: DiscountKind,
    pub discount_value: Decimal,
    pub minimum_amount: Decimal,
    pub maximum_uses: i32,
    pub used_count: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    /// A coupon is usable while it is active, `now` lies inside the validity
    /// window (both ends inclusive) and it still has uses left.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.valid_from <= now
            && now <= self.valid_to
            && self.used_count < self.maximum_uses
    }

    /// Discount earned on `subtotal`. Zero when the coupon is not valid or the
    /// subtotal is below the minimum order amount. Fixed discounts are not
    /// capped at the subtotal.
    pub fn discount_for(&self, subtotal: Decimal, now: DateTime<Utc>) -> Decimal {
        if !self.applies_to(subtotal, now) {
            return Decimal::ZERO;
        }
        match self.discount_kind {
            DiscountKind::Percentage => subtotal * self.discount_value / Decimal::ONE_HUNDRED,
            DiscountKind::Fixed => self.discount_value,
        }
    }

    /// Whether an order with this subtotal earns the discount at `now`.
    pub fn applies_to(&self, subtotal: Decimal, now: DateTime<Utc>) -> bool {
        self.is_valid(now) && subtotal >= self.minimum_amount
    }

    pub fn remaining_uses(&self) -> i32 { (self.maximum_uses - self.used_count).max(0) }

    /// Counts one redemption against the usage cap.
    pub fn redeem(&mut self, now: DateTime<Utc>) -> Result<(), CouponError> {
        if !self.is_valid(now) { return Err(CouponError::NotValid); }
        self.used_count += 1;
        Ok(())
    }
}

/// Fields needed to create a coupon from the back office.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewCoupon {
    pub code: CouponCode,
    pub discount_kind: DiscountKind,
    pub discount_value: Decimal,
    pub minimum_amount: Decimal,
    pub maximum_uses: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub is_active: bool,
}

impl NewCoupon {
    pub fn check(&self) -> Result<(), CouponError> {
        if self.valid_to < self.valid_from { return Err(CouponError::InvalidWindow); }
        if self.discount_value.is_sign_negative() || self.minimum_amount.is_sign_negative() {
            return Err(CouponError::NegativeAmount);
        }
        if self.discount_kind == DiscountKind::Percentage && self.discount_value > Decimal::ONE_HUNDRED {
            return Err(CouponError::PercentageTooLarge);
        }
        if self.maximum_uses < 0 { return Err(CouponError::NegativeAmount); }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("Invalid coupon code.")]
    NotFound,
    #[error("This coupon is not valid or has expired.")]
    NotValid,
    #[error("Unknown discount type: {0}")]
    UnknownDiscountKind(String),
    #[error("Coupon validity window ends before it starts")]
    InvalidWindow,
    #[error("Coupon amounts cannot be negative")]
    NegativeAmount,
    #[error("Percentage discounts cannot exceed 100")]
    PercentageTooLarge,
    #[error("A coupon with code {0} already exists")]
    DuplicateCode(String),
}

#[cfg(test)]
pub(crate) fn sample_coupon(code: &str, kind: DiscountKind, value: i64, minimum: i64, now: DateTime<Utc>) -> Coupon {
    Coupon {
        id: 1,
        code: CouponCode::parse(code).unwrap(),
        discount_kind: kind,
        discount_value: Decimal::from(value),
        minimum_amount: Decimal::from(minimum),
        maximum_uses: 100,
        used_count: 0,
        valid_from: now - chrono::Duration::days(1),
        valid_to: now + chrono::Duration::days(30),
        is_active: true,
        created_at: now,
    }
}
