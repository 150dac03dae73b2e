//! Staff operations: coupons, order workflow, prescription review and stock alerts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use super::Storefront;
use crate::domain::aggregates::{
    Coupon, CouponError, NewCoupon, Order, OrderError, OrderId, OrderStatus, Prescription, PrescriptionError,
    PrescriptionId, PrescriptionStatus, Product, UserId,
};
use crate::domain::value_objects::CouponCode;
use crate::repository::StoreError;
use crate::{Result, StorefrontError};

#[derive(Clone, Debug, Deserialize)]
pub struct CouponRequest {
    pub code: String,
    pub discount_type: String,
    pub discount_value: Decimal,
    #[serde(default)]
    pub minimum_amount: Decimal,
    #[serde(default = "default_maximum_uses")]
    pub maximum_uses: i32,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_maximum_uses() -> i32 { 1 }
fn default_true() -> bool { true }

impl CouponRequest {
    /// Missing `valid_from` means the coupon starts at `now`.
    pub fn into_new_coupon(self, now: DateTime<Utc>) -> Result<NewCoupon> {
        let code = CouponCode::parse(self.code).map_err(|e| StorefrontError::Invalid(e.to_string()))?;
        let new = NewCoupon {
            code,
            discount_kind: self.discount_type.parse()?,
            discount_value: self.discount_value,
            minimum_amount: self.minimum_amount,
            maximum_uses: self.maximum_uses,
            valid_from: self.valid_from.unwrap_or(now),
            valid_to: self.valid_to,
            is_active: self.is_active,
        };
        new.check()?;
        Ok(new)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct PaymentUpdate {
    pub payment_id: String,
}

impl Storefront {
    pub async fn coupons(&self) -> Result<Vec<Coupon>> {
        Ok(self.store.coupons().await?)
    }

    pub async fn create_coupon(&self, request: CouponRequest, now: DateTime<Utc>) -> Result<Coupon> {
        let new = request.into_new_coupon(now)?;
        let code = new.code.to_string();
        let coupon = self.store.create_coupon(new, now).await.map_err(|e| match e {
            StoreError::Conflict(_) => StorefrontError::Coupon(CouponError::DuplicateCode(code.clone())),
            other => other.into(),
        })?;
        info!(code = %coupon.code, "coupon created");
        Ok(coupon)
    }

    /// Moves an order along its workflow and records who did it.
    pub async fn change_order_status(&self, id: OrderId, update: StatusUpdate, actor: UserId, now: DateTime<Utc>) -> Result<Order> {
        let next: OrderStatus = update.status.trim().parse()?;
        let mut order = self.store.order(id).await?.ok_or(OrderError::NotFound)?;
        order.transition_to(next, Some(actor), update.notes, now)?;
        if let Some(change) = order.status_history.last() {
            self.store.record_status_change(&order, change).await?;
        }
        info!(order_number = %order.order_number, status = %order.status, actor, "order status changed");
        let events = order.take_events();
        self.events.publish(events).await;
        Ok(order)
    }

    pub async fn mark_order_paid(&self, id: OrderId, update: PaymentUpdate, now: DateTime<Utc>) -> Result<Order> {
        let mut order = self.store.order(id).await?.ok_or(OrderError::NotFound)?;
        if order.is_paid {
            return Ok(order);
        }
        order.mark_paid(update.payment_id, now);
        self.store.mark_paid(&order).await?;
        let events = order.take_events();
        self.events.publish(events).await;
        Ok(order)
    }

    pub async fn review_prescription(
        &self,
        id: PrescriptionId,
        status: &str,
        reviewer: UserId,
        notes: String,
        now: DateTime<Utc>,
    ) -> Result<Prescription> {
        let next: PrescriptionStatus = status.trim().parse()?;
        let mut prescription = self.store.prescription(id).await?.ok_or(PrescriptionError::NotFound)?;
        let event = prescription.review(next, reviewer, notes, now)?;
        self.store.save_review(&prescription).await?;
        info!(prescription_id = id, status = next.as_str(), reviewer, "prescription reviewed");
        self.events.publish(vec![event]).await;
        Ok(prescription)
    }

    pub async fn low_stock_products(&self) -> Result<Vec<Product>> {
        Ok(self.store.low_stock_products().await?)
    }
}
