//! Back office endpoints, restricted to staff accounts.

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{ApiResult, AppState, Session};
use crate::domain::aggregates::{Coupon, Order, OrderId, Prescription, PrescriptionId, Product, User};
use crate::services::{CouponRequest, PaymentUpdate, StatusUpdate};
use crate::StorefrontError;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/coupons", get(coupons).post(create_coupon))
        .route("/orders/:id/status", post(change_order_status))
        .route("/orders/:id/paid", post(mark_order_paid))
        .route("/prescriptions/:id/review", post(review_prescription))
        .route("/products/low_stock", get(low_stock))
        .route_layer(middleware::from_fn_with_state(state, require_staff))
}

/// Resolves the session user and hands it to the handler as `Extension<User>`.
async fn require_staff(State(state): State<AppState>, session: Session, mut request: Request, next: Next) -> ApiResult<Response> {
    let user = state.shop.require_user(session.user_id()).await?;
    if !user.is_staff {
        warn!(user_id = user.id, path = %request.uri().path(), "non-staff user tried the back office");
        return Err(StorefrontError::Forbidden.into());
    }
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[derive(Debug, Serialize)]
pub struct CouponListing {
    #[serde(flatten)]
    pub coupon: Coupon,
    pub remaining_uses: i32,
}

async fn coupons(State(state): State<AppState>) -> ApiResult<Json<Vec<CouponListing>>> {
    let listing = state.shop.coupons().await?.into_iter()
        .map(|coupon| CouponListing { remaining_uses: coupon.remaining_uses(), coupon })
        .collect();
    Ok(Json(listing))
}

async fn create_coupon(State(state): State<AppState>, Json(request): Json<CouponRequest>) -> ApiResult<(StatusCode, Json<Coupon>)> {
    let coupon = state.shop.create_coupon(request, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

async fn change_order_status(
    State(state): State<AppState>,
    Extension(staff): Extension<User>,
    Path(id): Path<OrderId>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.shop.change_order_status(id, update, staff.id, Utc::now()).await?))
}

async fn mark_order_paid(State(state): State<AppState>, Path(id): Path<OrderId>, Json(update): Json<PaymentUpdate>) -> ApiResult<Json<Order>> {
    Ok(Json(state.shop.mark_order_paid(id, update, Utc::now()).await?))
}

#[derive(Debug, Deserialize)]
pub struct ReviewDecision {
    pub status: String,
    #[serde(default)]
    pub notes: String,
}

async fn review_prescription(
    State(state): State<AppState>,
    Extension(staff): Extension<User>,
    Path(id): Path<PrescriptionId>,
    Json(decision): Json<ReviewDecision>,
) -> ApiResult<Json<Prescription>> {
    let prescription = state.shop.review_prescription(id, &decision.status, staff.id, decision.notes, Utc::now()).await?;
    Ok(Json(prescription))
}

async fn low_stock(State(state): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.shop.low_stock_products().await?))
}
