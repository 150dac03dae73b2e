//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::aggregates::order::OrderStatus;
use crate::domain::aggregates::prescription::PrescriptionStatus;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Order(OrderEvent),
    Prescription(PrescriptionEvent),
    Coupon(CouponEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_number: String, user_id: i64, total: Decimal },
    StatusChanged { order_number: String, from: OrderStatus, to: OrderStatus },
    Paid { order_number: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PrescriptionEvent {
    Uploaded { prescription_id: i64, is_urgent: bool },
    Reviewed { prescription_id: i64, status: PrescriptionStatus, reviewer_id: i64 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouponEvent {
    Redeemed { code: String, used_count: i32 },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Order(OrderEvent::Placed { .. }) => "pharmacy.order.placed",
            Self::Order(OrderEvent::StatusChanged { .. }) => "pharmacy.order.status_changed",
            Self::Order(OrderEvent::Paid { .. }) => "pharmacy.order.paid",
            Self::Prescription(PrescriptionEvent::Uploaded { .. }) => "pharmacy.prescription.uploaded",
            Self::Prescription(PrescriptionEvent::Reviewed { .. }) => "pharmacy.prescription.reviewed",
            Self::Coupon(CouponEvent::Redeemed { .. }) => "pharmacy.coupon.redeemed",
        }
    }
}
