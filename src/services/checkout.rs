//! Cart, coupon and checkout flows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use super::Storefront;
use crate::domain::aggregates::account::first_message;
use crate::domain::aggregates::{
    Cart, CartLine, CartSummary, Coupon, CouponError, DeliveryDetails, Order, OrderError, PaymentMethod, Product, ProductId, UserId,
};
use crate::domain::events::{CouponEvent, DomainEvent};
use crate::domain::pricing::OrderTotals;
use crate::domain::value_objects::CouponCode;
use crate::repository::StoreError;
use crate::session::SessionData;
use crate::{Result, StorefrontError};

#[derive(Clone, Debug, Serialize)]
pub struct CheckoutQuote {
    pub lines: Vec<CartLine>,
    pub totals: OrderTotals,
    pub applied_coupon: Option<Coupon>,
    pub payment_methods: Vec<PaymentMethod>,
}

/// Delivery and payment details submitted with an order.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CheckoutForm {
    pub payment_method_id: Option<i64>,
    #[validate(length(max = 1000))]
    pub shipping_address: String,
    #[validate(length(max = 1000))]
    pub billing_address: String,
    #[validate(length(max = 15))]
    pub phone: String,
    pub email: String,
    pub notes: String,
}

impl CheckoutForm {
    fn into_delivery(self) -> DeliveryDetails {
        DeliveryDetails {
            shipping_address: self.shipping_address,
            billing_address: self.billing_address,
            phone: self.phone,
            email: self.email,
            notes: self.notes,
        }
    }
}

impl Storefront {
    /// Resolves the cart against the catalog, dropping products that no longer exist.
    pub async fn cart_summary(&self, cart: &Cart) -> Result<CartSummary> {
        if cart.is_empty() { return Ok(CartSummary::default()); }
        let catalog = self.store.products_by_ids(&cart.product_ids()).await?;
        Ok(cart.compute_lines(&catalog))
    }

    pub async fn add_to_cart(&self, cart: &mut Cart, product_id: ProductId) -> Result<(Product, u32)> {
        let product = self.store.product(product_id).await?.ok_or(StorefrontError::NotFound("Product"))?;
        let quantity = cart.add_product(&product)?;
        Ok((product, quantity))
    }

    /// Looks up a coupon by code and checks it is usable right now.
    pub async fn apply_coupon(&self, raw_code: &str, now: DateTime<Utc>) -> Result<Coupon> {
        let code = CouponCode::parse(raw_code).map_err(|_| CouponError::NotFound)?;
        let coupon = self.store.coupon_by_code(&code).await?.ok_or(CouponError::NotFound)?;
        if !coupon.is_valid(now) {
            return Err(CouponError::NotValid.into());
        }
        Ok(coupon)
    }

    /// Prices the session's cart. The applied coupon is re-checked against
    /// `now` and the current subtotal; one that has since disappeared, lapsed
    /// or falls below its minimum is left off the quote.
    pub async fn quote(&self, session: &SessionData, now: DateTime<Utc>) -> Result<CheckoutQuote> {
        let summary = self.cart_summary(&session.cart).await?;
        if summary.is_empty() {
            return Err(OrderError::NoItems.into());
        }
        let applied_coupon = self.eligible_coupon(session, summary.subtotal, now).await?;
        let totals = self.pricing.totals_with_coupon(summary.subtotal, applied_coupon.as_ref(), now);
        let payment_methods = self.store.payment_methods(true).await?;
        Ok(CheckoutQuote { lines: summary.lines, totals, applied_coupon, payment_methods })
    }

    /// Turns the session's cart into a pending order and publishes the resulting events.
    pub async fn place_order(&self, session: &SessionData, user_id: UserId, form: CheckoutForm, now: DateTime<Utc>) -> Result<Order> {
        form.validate().map_err(|e| StorefrontError::Invalid(first_message(&e)))?;
        let summary = self.cart_summary(&session.cart).await?;
        let coupon = self.eligible_coupon(session, summary.subtotal, now).await?;
        let totals = self.pricing.totals_with_coupon(summary.subtotal, coupon.as_ref(), now);
        let coupon_id = coupon.as_ref().map(|c| c.id);
        let payment_method_id = form.payment_method_id;
        let mut order = Order::place(user_id, &summary, &totals, coupon_id, payment_method_id, form.into_delivery(), now)?;
        let redeem = self.count_coupon_redemptions && coupon_id.is_some();

        let stored = self.store.place_order(&order, redeem).await.map_err(|e| match e {
            StoreError::InsufficientStock(name) => StorefrontError::Order(OrderError::InsufficientStock(name)),
            StoreError::CouponExhausted => StorefrontError::Coupon(CouponError::NotValid),
            other => other.into(),
        })?;
        info!(order_number = %stored.order_number, user_id, total = %stored.total_price, "order placed");

        let mut events = order.take_events();
        if redeem {
            if let Some(c) = coupon_id { self.redeemed_event(c, &mut events).await; }
        }
        self.events.publish(events).await;
        Ok(stored)
    }

    /// The session's coupon, if it still earns a discount on `subtotal`.
    async fn eligible_coupon(&self, session: &SessionData, subtotal: Decimal, now: DateTime<Utc>) -> Result<Option<Coupon>> {
        let coupon = match session.applied_coupon {
            Some(id) => self.store.coupon(id).await?,
            None => None,
        };
        Ok(coupon.filter(|c| c.applies_to(subtotal, now)))
    }

    async fn redeemed_event(&self, coupon_id: i64, events: &mut Vec<DomainEvent>) {
        match self.store.coupon(coupon_id).await {
            Ok(Some(c)) => events.push(DomainEvent::Coupon(CouponEvent::Redeemed { code: c.code.to_string(), used_count: c.used_count })),
            Ok(None) => {}
            Err(e) => warn!(coupon_id, error = %e, "could not reload redeemed coupon"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::aggregates::coupon::{sample_coupon, DiscountKind};
    use crate::domain::aggregates::product::sample_product;
    use crate::domain::pricing::PricingPolicy;
    use crate::infrastructure::{EventPublisher, InMemoryStore};
    use crate::repository::{CatalogRepository, CouponRepository};

    async fn storefront(count_redemptions: bool) -> (Storefront, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        store.insert_product(sample_product(1, Decimal::new(500, 0), 10)).await;
        store.insert_product(sample_product(2, Decimal::new(100, 0), 1)).await;
        let shop = Storefront {
            store: store.clone(),
            events: EventPublisher::disabled(),
            pricing: PricingPolicy::default(),
            count_coupon_redemptions: count_redemptions,
        };
        (shop, store)
    }

    #[tokio::test]
    async fn test_quote_with_coupon() {
        let now = Utc::now();
        let (shop, store) = storefront(false).await;
        store.insert_coupon(sample_coupon("WELCOME10", DiscountKind::Percentage, 10, 100, now)).await;
        let coupon = shop.apply_coupon(" welcome10 ", now).await.unwrap();

        let mut session = SessionData::default();
        session.cart.add(1);
        session.cart.add(1);
        session.applied_coupon = Some(coupon.id);
        let quote = shop.quote(&session, now).await.unwrap();
        assert_eq!(quote.totals.total.amount(), Decimal::new(1080, 0));
        assert_eq!(quote.applied_coupon.map(|c| c.id), Some(coupon.id));
    }

    #[tokio::test]
    async fn test_apply_coupon_messages() {
        let now = Utc::now();
        let (shop, store) = storefront(false).await;
        let mut expired = sample_coupon("OLD", DiscountKind::Fixed, 10, 0, now);
        expired.valid_to = now - chrono::Duration::days(1);
        store.insert_coupon(expired).await;

        let err = shop.apply_coupon("NOPE", now).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid coupon code.");
        let err = shop.apply_coupon("", now).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid coupon code.");
        let err = shop.apply_coupon("old", now).await.unwrap_err();
        assert_eq!(err.to_string(), "This coupon is not valid or has expired.");
    }

    #[tokio::test]
    async fn test_empty_cart_cannot_be_quoted() {
        let (shop, _) = storefront(false).await;
        let err = shop.quote(&SessionData::default(), Utc::now()).await.unwrap_err();
        assert_eq!(err.to_string(), "Your cart is empty!");
    }

    #[tokio::test]
    async fn test_place_order_counts_redemption_when_enabled() {
        let now = Utc::now();
        let (shop, store) = storefront(true).await;
        store.insert_coupon(sample_coupon("SAVE50", DiscountKind::Fixed, 50, 500, now)).await;
        let mut session = SessionData::default();
        session.cart.add(1);
        session.applied_coupon = Some(1);

        let order = shop.place_order(&session, 9, CheckoutForm::default(), now).await.unwrap();
        assert_eq!(order.discount_amount, Decimal::new(50, 0));
        assert_eq!(order.coupon_id, Some(1));
        assert_eq!(store.coupon(1).await.unwrap().unwrap().used_count, 1);
        assert_eq!(store.product(1).await.unwrap().unwrap().stock, 9);
    }

    #[tokio::test]
    async fn test_place_order_leaves_coupon_count_by_default() {
        let now = Utc::now();
        let (shop, store) = storefront(false).await;
        store.insert_coupon(sample_coupon("SAVE50", DiscountKind::Fixed, 50, 500, now)).await;
        let mut session = SessionData::default();
        session.cart.add(1);
        session.applied_coupon = Some(1);
        shop.place_order(&session, 9, CheckoutForm::default(), now).await.unwrap();
        assert_eq!(store.coupon(1).await.unwrap().unwrap().used_count, 0);
    }

    #[tokio::test]
    async fn test_coupon_below_minimum_is_not_attached() {
        let now = Utc::now();
        let (shop, store) = storefront(true).await;
        let mut save50 = sample_coupon("SAVE50", DiscountKind::Fixed, 50, 1000, now);
        save50.maximum_uses = 1;
        store.insert_coupon(save50).await;
        let mut session = SessionData::default();
        session.cart.add(1);
        session.applied_coupon = Some(1);

        let quote = shop.quote(&session, now).await.unwrap();
        assert_eq!(quote.totals.discount.amount(), Decimal::ZERO);
        assert!(quote.applied_coupon.is_none());

        let order = shop.place_order(&session, 9, CheckoutForm::default(), now).await.unwrap();
        assert_eq!(order.discount_amount, Decimal::ZERO);
        assert_eq!(order.coupon_id, None);
        let coupon = store.coupon(1).await.unwrap().unwrap();
        assert_eq!(coupon.used_count, 0);
        assert!(coupon.is_valid(now));
    }

    #[tokio::test]
    async fn test_insufficient_stock_aborts() {
        let (shop, store) = storefront(false).await;
        let mut session = SessionData::default();
        session.cart.add(2);
        session.cart.add(2);
        let err = shop.place_order(&session, 9, CheckoutForm::default(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Order(OrderError::InsufficientStock(_))));
        assert_eq!(store.product(2).await.unwrap().unwrap().stock, 1);
    }
}
