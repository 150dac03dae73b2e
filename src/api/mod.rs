//! HTTP surface: JSON endpoints over the storefront services.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::Storefront;
use crate::session::SessionStore;

pub mod account;
pub mod admin;
pub mod cart;
pub mod catalog;
pub mod clinic;
pub mod error;
pub mod session;

pub use error::{ApiError, ApiResult};
pub use session::{CartBadge, Session, SessionCookie};

#[derive(Clone)]
pub struct AppState {
    pub shop: Storefront,
    pub sessions: Arc<dyn SessionStore>,
}

/// Body of every successful mutation: a flash-style message plus whatever
/// the page needs to re-render.
#[derive(Debug, Serialize)]
pub struct Notice<T: Serialize> {
    pub message: String,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> Notice<T> {
    pub fn new(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self { message: message.into(), data })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "pharmacy-storefront"})) }))
        .route("/", get(catalog::home))
        .route("/products/", get(catalog::products))
        .route("/product/:id/", get(catalog::product_detail).post(catalog::add_review))
        .route("/advanced_search/", get(catalog::advanced_search))
        .route("/contact/", post(catalog::contact))
        .route("/newsletter/", post(catalog::newsletter))
        .route("/cart/", get(cart::view_cart))
        .route("/add_to_cart/:id/", post(cart::add_to_cart))
        .route("/remove_from_cart/:id/", post(cart::remove_from_cart))
        .route("/decrease_cart/:id/", post(cart::decrease_cart))
        .route("/clear_cart/", post(cart::clear_cart))
        .route("/apply_coupon/", post(cart::apply_coupon))
        .route("/checkout/", get(cart::checkout).post(cart::place_order))
        .route("/register", post(account::register))
        .route("/login", post(account::login))
        .route("/logout", get(account::logout))
        .route("/profile/", get(account::profile).post(account::update_profile))
        .route("/wishlist/", get(account::wishlist))
        .route("/add_to_wishlist/:id/", post(account::add_to_wishlist))
        .route("/remove_from_wishlist/:id/", post(account::remove_from_wishlist))
        .route("/prescriptions/", get(clinic::prescriptions).post(clinic::upload_prescription))
        .route("/doctors/", get(clinic::doctors))
        .nest("/admin", admin::router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
