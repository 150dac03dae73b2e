//! Storefront use cases.
//!
//! [`Storefront`] bundles storage, pricing rules and the event publisher; each
//! submodule adds the operations for one area of the shop.

use std::sync::Arc;

use crate::config::StorefrontConfig;
use crate::domain::pricing::PricingPolicy;
use crate::infrastructure::EventPublisher;
use crate::repository::Store;

pub mod accounts;
pub mod backoffice;
pub mod catalog;
pub mod checkout;
pub mod clinic;

pub use accounts::ProfileOverview;
pub use backoffice::{CouponRequest, PaymentUpdate, StatusUpdate};
pub use catalog::{HomePage, ProductDetail, ReviewForm, SearchParams};
pub use checkout::{CheckoutForm, CheckoutQuote};
pub use clinic::DoctorDirectory;

#[derive(Clone)]
pub struct Storefront {
    pub store: Arc<dyn Store>,
    pub events: EventPublisher,
    pub pricing: PricingPolicy,
    pub count_coupon_redemptions: bool,
}

impl Storefront {
    pub fn new(store: Arc<dyn Store>, events: EventPublisher, config: &StorefrontConfig) -> Self {
        Self {
            store,
            events,
            pricing: config.pricing.clone(),
            count_coupon_redemptions: config.count_coupon_redemptions,
        }
    }
}
