//! Session cart, coupon application and checkout.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ApiResult, AppState, CartBadge, Notice, Session, SessionCookie};
use crate::domain::aggregates::{CartLine, Coupon, Order, ProductId};
use crate::services::{CheckoutForm, CheckoutQuote};
use crate::StorefrontError;

#[derive(Debug, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub subtotal: Decimal,
    pub applied_coupon: Option<Coupon>,
    pub cart: CartBadge,
}

pub async fn view_cart(State(state): State<AppState>, session: Session) -> ApiResult<Json<CartView>> {
    let summary = state.shop.cart_summary(&session.data.cart).await?;
    let applied_coupon = match session.data.applied_coupon {
        Some(id) => state.shop.store.coupon(id).await?,
        None => None,
    };
    Ok(Json(CartView { lines: summary.lines, subtotal: summary.subtotal, applied_coupon, cart: session.badge() }))
}

#[derive(Debug, Serialize)]
pub struct CartUpdate {
    pub quantity: u32,
    pub cart: CartBadge,
}

pub async fn add_to_cart(
    State(state): State<AppState>,
    mut session: Session,
    Path(id): Path<ProductId>,
) -> ApiResult<(SessionCookie, Json<Notice<CartUpdate>>)> {
    let (product, quantity) = state.shop.add_to_cart(&mut session.data.cart, id).await?;
    let cookie = session.save(state.sessions.as_ref()).await?;
    let message = format!("{} has been added to your cart!", product.name);
    Ok((cookie, Notice::new(message, CartUpdate { quantity, cart: session.badge() })))
}

/// Removing something that is not in the cart is a no-op; the product must still exist.
pub async fn remove_from_cart(
    State(state): State<AppState>,
    mut session: Session,
    Path(id): Path<ProductId>,
) -> ApiResult<(SessionCookie, Json<Notice<CartUpdate>>)> {
    let product = state.shop.store.product(id).await?.ok_or(StorefrontError::NotFound("Product"))?;
    let message = if session.data.cart.remove(id) {
        format!("{} removed from cart!", product.name)
    } else {
        format!("{} is not in your cart.", product.name)
    };
    let cookie = session.save(state.sessions.as_ref()).await?;
    Ok((cookie, Notice::new(message, CartUpdate { quantity: 0, cart: session.badge() })))
}

/// Takes one unit off; the last unit removes the line.
pub async fn decrease_cart(
    State(state): State<AppState>,
    mut session: Session,
    Path(id): Path<ProductId>,
) -> ApiResult<(SessionCookie, Json<Notice<CartUpdate>>)> {
    let product = state.shop.store.product(id).await?.ok_or(StorefrontError::NotFound("Product"))?;
    let (message, quantity) = match session.data.cart.decrease(id) {
        Some(0) => (format!("{} removed from cart!", product.name), 0),
        Some(left) => ("Quantity updated!".to_string(), left),
        None => (format!("{} is not in your cart.", product.name), 0),
    };
    let cookie = session.save(state.sessions.as_ref()).await?;
    Ok((cookie, Notice::new(message, CartUpdate { quantity, cart: session.badge() })))
}

pub async fn clear_cart(State(state): State<AppState>, mut session: Session) -> ApiResult<(SessionCookie, Json<Notice<CartUpdate>>)> {
    session.data.cart.clear();
    let cookie = session.save(state.sessions.as_ref()).await?;
    Ok((cookie, Notice::new("Cart cleared!", CartUpdate { quantity: 0, cart: session.badge() })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CouponForm {
    pub coupon_code: String,
}

#[derive(Debug, Serialize)]
pub struct CouponApplied {
    pub coupon: Coupon,
}

/// A rejected code leaves any previously applied coupon in place.
pub async fn apply_coupon(
    State(state): State<AppState>,
    mut session: Session,
    Json(form): Json<CouponForm>,
) -> ApiResult<(SessionCookie, Json<Notice<CouponApplied>>)> {
    state.shop.require_user(session.user_id()).await?;
    let coupon = state.shop.apply_coupon(&form.coupon_code, Utc::now()).await?;
    session.data.applied_coupon = Some(coupon.id);
    let cookie = session.save(state.sessions.as_ref()).await?;
    let message = format!("Coupon {} applied successfully!", coupon.code);
    Ok((cookie, Notice::new(message, CouponApplied { coupon })))
}

pub async fn checkout(State(state): State<AppState>, session: Session) -> ApiResult<Json<CheckoutQuote>> {
    Ok(Json(state.shop.quote(&session.data, Utc::now()).await?))
}

#[derive(Debug, Serialize)]
pub struct OrderPlaced {
    pub order: Order,
}

/// Places the order, then empties the cart and drops the applied coupon.
pub async fn place_order(
    State(state): State<AppState>,
    mut session: Session,
    Json(form): Json<CheckoutForm>,
) -> ApiResult<(StatusCode, SessionCookie, Json<Notice<OrderPlaced>>)> {
    let user = state.shop.require_user(session.user_id()).await?;
    let order = state.shop.place_order(&session.data, user.id, form, Utc::now()).await?;
    session.data.cart.clear();
    session.data.applied_coupon = None;
    let cookie = session.save(state.sessions.as_ref()).await?;
    let message = "Order placed successfully! You will receive a confirmation email shortly.";
    Ok((StatusCode::CREATED, cookie, Notice::new(message, OrderPlaced { order })))
}
