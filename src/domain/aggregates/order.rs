//! Order Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::cart::CartSummary;
use super::coupon::CouponId;
use super::product::ProductId;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::pricing::OrderTotals;

pub type OrderId = i64;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        Self::Pending, Self::Confirmed, Self::Processing, Self::Shipped,
        Self::Delivered, Self::Cancelled, Self::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
        }
    }

    pub fn is_terminal(&self) -> bool { matches!(self, Self::Delivered | Self::Cancelled | Self::Returned) }

    /// Position on the fulfilment path; side exits have none.
    fn progress(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Confirmed => Some(1),
            Self::Processing => Some(2),
            Self::Shipped => Some(3),
            Self::Delivered => Some(4),
            Self::Cancelled | Self::Returned => None,
        }
    }

    /// Forward moves along the fulfilment path (skipping steps is allowed),
    /// or a cancel/return exit from any state that is not terminal.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() { return false; }
        match (self.progress(), next.progress()) {
            (Some(from), Some(to)) => to > from,
            (_, None) => true,
            (None, Some(_)) => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl std::str::FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.as_str() == s).ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn total(&self) -> Decimal { self.unit_price * Decimal::from(self.quantity) }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
    pub notes: String,
    pub changed_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Contact and delivery details captured on the checkout form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryDetails {
    pub shipping_address: String,
    pub billing_address: String,
    pub phone: String,
    pub email: String,
    pub notes: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: i64,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub shipping_cost: Decimal,
    pub discount_amount: Decimal,
    pub total_price: Decimal,
    pub coupon_id: Option<CouponId>,
    pub payment_method_id: Option<i64>,
    pub is_paid: bool,
    pub payment_id: String,
    pub delivery: DeliveryDetails,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status_history: Vec<StatusChange>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

/// `ORD` followed by eight upper-case hex digits.
pub fn generate_order_number() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("ORD{}", hex[..8].to_uppercase())
}

impl Order {
    /// Builds a pending order from a priced cart. The id is assigned by storage.
    pub fn place(
        user_id: i64,
        summary: &CartSummary,
        totals: &OrderTotals,
        coupon_id: Option<CouponId>,
        payment_method_id: Option<i64>,
        delivery: DeliveryDetails,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if summary.is_empty() { return Err(OrderError::NoItems); }
        let items = summary.lines.iter()
            .map(|l| OrderItem { product_id: l.product.id, product_name: l.product.name.clone(), quantity: l.quantity, unit_price: l.product.price })
            .collect();
        let mut order = Self {
            id: 0, order_number: generate_order_number(), user_id, status: OrderStatus::Pending, items,
            subtotal: totals.subtotal.amount(), tax_amount: totals.tax.amount(), shipping_cost: totals.shipping.amount(),
            discount_amount: totals.discount.amount(), total_price: totals.total.amount(),
            coupon_id, payment_method_id, is_paid: false, payment_id: String::new(), delivery,
            delivered_at: None, created_at: now, updated_at: now,
            status_history: vec![StatusChange { status: OrderStatus::Pending, notes: "Order placed".into(), changed_by: Some(user_id), created_at: now }],
            events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed { order_number: order.order_number.clone(), user_id, total: order.total_price }));
        Ok(order)
    }

    pub fn transition_to(&mut self, next: OrderStatus, changed_by: Option<i64>, notes: impl Into<String>, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition { from: self.status, to: next });
        }
        let from = self.status;
        self.status = next;
        if next == OrderStatus::Delivered { self.delivered_at = Some(now); }
        self.status_history.push(StatusChange { status: next, notes: notes.into(), changed_by, created_at: now });
        self.updated_at = now;
        self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_number: self.order_number.clone(), from, to: next }));
        Ok(())
    }

    pub fn mark_paid(&mut self, payment_id: impl Into<String>, now: DateTime<Utc>) {
        self.is_paid = true;
        self.payment_id = payment_id.into();
        self.updated_at = now;
        self.raise_event(DomainEvent::Order(OrderEvent::Paid { order_number: self.order_number.clone() }));
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

/// Sum of totals over paid orders.
pub fn total_spent(orders: &[Order]) -> Decimal {
    orders.iter().filter(|o| o.is_paid).map(|o| o.total_price).sum()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Your cart is empty!")]
    NoItems,
    #[error("Cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
    #[error("Order not found")]
    NotFound,
    #[error("Not enough stock left for {0}")]
    InsufficientStock(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::cart::CartLine;
    use crate::domain::aggregates::product::sample_product;
    use crate::domain::pricing::PricingPolicy;

    fn placed_order() -> Order {
        let product = sample_product(1, Decimal::new(10, 0), 5);
        let summary = CartSummary { lines: vec![CartLine { product, quantity: 2, line_total: Decimal::new(20, 0) }], subtotal: Decimal::new(20, 0) };
        let totals = PricingPolicy::default().totals(summary.subtotal, Decimal::ZERO);
        Order::place(7, &summary, &totals, None, None, DeliveryDetails::default(), Utc::now()).unwrap()
    }

    #[test]
    fn test_order_workflow() {
        let mut order = placed_order();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_price, Decimal::new(7360, 2));
        let now = Utc::now();
        order.transition_to(OrderStatus::Confirmed, Some(1), "", now).unwrap();
        order.transition_to(OrderStatus::Shipped, Some(1), "skipped processing", now).unwrap();
        order.transition_to(OrderStatus::Delivered, Some(1), "", now).unwrap();
        assert_eq!(order.delivered_at, Some(now));
        assert_eq!(order.status_history.len(), 4);
        assert_eq!(order.take_events().len(), 4);
    }

    #[test]
    fn test_no_backward_moves() {
        let mut order = placed_order();
        let now = Utc::now();
        order.transition_to(OrderStatus::Processing, None, "", now).unwrap();
        assert_eq!(
            order.transition_to(OrderStatus::Confirmed, None, "", now),
            Err(OrderError::InvalidTransition { from: OrderStatus::Processing, to: OrderStatus::Confirmed })
        );
        assert!(order.transition_to(OrderStatus::Processing, None, "", now).is_err());
    }

    #[test]
    fn test_side_exits() {
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Returned));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Returned.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_empty_cart_rejected() {
        let totals = PricingPolicy::default().totals(Decimal::ZERO, Decimal::ZERO);
        let err = Order::place(1, &CartSummary::default(), &totals, None, None, DeliveryDetails::default(), Utc::now());
        assert_eq!(err, Err(OrderError::NoItems));
    }

    #[test]
    fn test_order_number_format() {
        let n = generate_order_number();
        assert_eq!(n.len(), 11);
        assert!(n.starts_with("ORD"));
        assert!(n[3..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_total_spent_counts_paid_only() {
        let mut paid = placed_order();
        paid.mark_paid("pay_1", Utc::now());
        let unpaid = placed_order();
        assert_eq!(total_spent(&[paid, unpaid]), Decimal::new(7360, 2));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("shipped".parse::<OrderStatus>(), Ok(OrderStatus::Shipped));
        assert!("lost".parse::<OrderStatus>().is_err());
    }
}
