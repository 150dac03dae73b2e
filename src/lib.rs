//! Online pharmacy storefront
//!
//! Catalog browsing, a session cart, checkout with coupons, tax and shipping,
//! prescription uploads, a doctor directory, customer profiles, wishlists and
//! a small back office.
//!
//! ## Layout
//! - [`domain`]: aggregates and pricing rules, free of I/O
//! - [`repository`] / [`session`]: storage seams as async traits
//! - [`services`]: use cases composed from the domain and the seams
//! - [`infrastructure`]: Postgres and in-memory stores, NATS publisher
//! - [`api`]: axum router and handlers

use thiserror::Error;

pub mod api;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod repository;
pub mod services;
pub mod session;

use domain::aggregates::{CartError, CouponError, OrderError, PrescriptionError, RegistrationError};
use repository::StoreError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum StorefrontError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Please log in to continue.")]
    LoginRequired,

    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error("Staff access required.")]
    Forbidden,

    #[error("Product not found in your wishlist!")]
    NotInWishlist,

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Prescription(#[from] PrescriptionError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),
}

pub type Result<T> = std::result::Result<T, StorefrontError>;
