//! Storage seams.
//!
//! Each concern gets its own async trait so handlers and services can run
//! against Postgres in production and the in-memory store in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::aggregates::{
    Banner, Category, CategoryId, Coupon, CouponId, Doctor, NewCoupon, Order, OrderId, PaymentMethod, Prescription,
    PrescriptionId, Product, ProductId, Review, Specialization, StatusChange, User, UserId, UserProfile,
};
use crate::domain::value_objects::CouponCode;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Record conflicts with an existing one: {0}")]
    Conflict(String),
    #[error("Not enough stock left for {0}")]
    InsufficientStock(String),
    #[error("Coupon has no uses left")]
    CouponExhausted,
    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(db.message().to_string()),
            _ => StoreError::Database(e.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Query and input types
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryFilter {
    Id(CategoryId),
    /// Case-insensitive substring of the category name.
    Name(String),
}

impl CategoryFilter {
    /// A numeric parameter selects by id, anything else by name.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() { return None; }
        Some(raw.parse().map_or_else(|_| Self::Name(raw.to_string()), Self::Id))
    }
}

/// Which text columns a free-text search looks at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchScope {
    /// Name, description and category name.
    #[default]
    Catalog,
    /// Name, description, brand and manufacturer.
    Extended,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Name,
    PriceLow,
    PriceHigh,
    Rating,
    Newest,
}

impl ProductSort {
    /// Unknown values fall back to name order.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("price_low") => Self::PriceLow,
            Some("price_high") => Self::PriceHigh,
            Some("rating") => Self::Rating,
            Some("newest") => Self::Newest,
            _ => Self::Name,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductSearch {
    pub text: Option<String>,
    pub scope: SearchScope,
    pub category: Option<CategoryFilter>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub active_only: bool,
    pub sort: ProductSort,
}

impl ProductSearch {
    /// In-process evaluation of the filter, mirroring the SQL the Postgres store builds.
    pub fn matches(&self, product: &Product, category_name: &str) -> bool {
        if self.active_only && !product.is_active { return false; }
        if let Some(text) = self.text.as_deref().map(str::to_lowercase).filter(|t| !t.is_empty()) {
            let contains = |s: &str| s.to_lowercase().contains(&text);
            let hit = match self.scope {
                SearchScope::Catalog => contains(&product.name) || contains(&product.description) || contains(category_name),
                SearchScope::Extended => contains(&product.name) || contains(&product.description)
                    || contains(&product.brand) || contains(&product.manufacturer),
            };
            if !hit { return false; }
        }
        match &self.category {
            Some(CategoryFilter::Id(id)) if product.category_id != *id => return false,
            Some(CategoryFilter::Name(name)) if !category_name.to_lowercase().contains(&name.to_lowercase()) => return false,
            _ => {}
        }
        if self.min_price.is_some_and(|min| product.price < min) { return false; }
        if self.max_price.is_some_and(|max| product.price > max) { return false; }
        true
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewReview {
    pub product_id: ProductId,
    pub user_id: UserId,
    pub rating: i16,
    pub comment: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub is_staff: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WishlistEntry {
    pub product: Product,
    pub added_at: DateTime<Utc>,
}

// =============================================================================
// Repository traits
// =============================================================================

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// In-stock products for the home page.
    async fn featured_products(&self, limit: i64) -> StoreResult<Vec<Product>>;
    async fn categories(&self) -> StoreResult<Vec<Category>>;
    /// Active banners ordered by display order, then creation time.
    async fn active_banners(&self) -> StoreResult<Vec<Banner>>;
    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>>;
    /// Products that still exist among `ids`; missing ids are simply absent.
    async fn products_by_ids(&self, ids: &[ProductId]) -> StoreResult<HashMap<ProductId, Product>>;
    async fn search_products(&self, search: &ProductSearch) -> StoreResult<Vec<Product>>;
    async fn suggested_products(&self, category_id: CategoryId, exclude: ProductId, limit: i64) -> StoreResult<Vec<Product>>;
    /// Newest first.
    async fn reviews_for(&self, product_id: ProductId) -> StoreResult<Vec<Review>>;
    async fn add_review(&self, review: NewReview, now: DateTime<Utc>) -> StoreResult<Review>;
    async fn low_stock_products(&self) -> StoreResult<Vec<Product>>;
    async fn payment_methods(&self, active_only: bool) -> StoreResult<Vec<PaymentMethod>>;
}

#[async_trait]
pub trait CouponRepository: Send + Sync {
    async fn coupon(&self, id: CouponId) -> StoreResult<Option<Coupon>>;
    async fn coupon_by_code(&self, code: &CouponCode) -> StoreResult<Option<Coupon>>;
    async fn coupons(&self) -> StoreResult<Vec<Coupon>>;
    async fn create_coupon(&self, coupon: NewCoupon, now: DateTime<Utc>) -> StoreResult<Coupon>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists a new order with its items and first history entry, taking
    /// the ordered quantities out of stock. When `redeem_coupon` is set the
    /// order's coupon has its usage counted in the same unit of work.
    async fn place_order(&self, order: &Order, redeem_coupon: bool) -> StoreResult<Order>;
    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>>;
    /// Newest first.
    async fn orders_for_user(&self, user_id: UserId) -> StoreResult<Vec<Order>>;
    /// Writes the current status and appends `change` to the history.
    async fn record_status_change(&self, order: &Order, change: &StatusChange) -> StoreResult<()>;
    async fn mark_paid(&self, order: &Order) -> StoreResult<()>;
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn user(&self, id: UserId) -> StoreResult<Option<User>>;
    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Creates the user and the profile together.
    async fn create_user(&self, user: NewUser, profile: UserProfile, now: DateTime<Utc>) -> StoreResult<User>;
    async fn profile(&self, user_id: UserId) -> StoreResult<Option<UserProfile>>;
    /// Saves the user row and inserts or replaces the profile.
    async fn save_account(&self, user: &User, profile: &UserProfile) -> StoreResult<()>;
    async fn review_count(&self, user_id: UserId) -> StoreResult<i64>;
    async fn wishlist(&self, user_id: UserId) -> StoreResult<Vec<WishlistEntry>>;
    /// Returns false when the product was already on the list.
    async fn add_to_wishlist(&self, user_id: UserId, product_id: ProductId, now: DateTime<Utc>) -> StoreResult<bool>;
    /// Returns false when the product was not on the list.
    async fn remove_from_wishlist(&self, user_id: UserId, product_id: ProductId) -> StoreResult<bool>;
}

#[async_trait]
pub trait ClinicRepository: Send + Sync {
    async fn specializations(&self) -> StoreResult<Vec<Specialization>>;
    /// Active doctors ordered by name.
    async fn doctors(&self, specialization_id: Option<i64>) -> StoreResult<Vec<Doctor>>;
    /// First active doctor whose name contains `name`, case-insensitively.
    async fn find_doctor_by_name(&self, name: &str) -> StoreResult<Option<Doctor>>;
    async fn create_prescription(&self, prescription: &Prescription) -> StoreResult<Prescription>;
    async fn prescription(&self, id: PrescriptionId) -> StoreResult<Option<Prescription>>;
    /// Newest first.
    async fn prescriptions_for_user(&self, user_id: UserId) -> StoreResult<Vec<Prescription>>;
    /// Persists status, reviewer, review time and notes in one write.
    async fn save_review(&self, prescription: &Prescription) -> StoreResult<()>;
}

/// Everything the storefront needs from storage.
pub trait Store: CatalogRepository + CouponRepository + OrderRepository + AccountRepository + ClinicRepository {}

impl<T> Store for T where T: CatalogRepository + CouponRepository + OrderRepository + AccountRepository + ClinicRepository {}
