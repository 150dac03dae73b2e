//! Catalog pages, reviews, contact form and newsletter sign-up.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;
use validator::Validate;

use super::{ApiError, ApiResult, AppState, CartBadge, Notice, Session};
use crate::domain::aggregates::{Product, ProductId, Review};
use crate::services::{HomePage, ProductDetail, ReviewForm, SearchParams};

#[derive(Debug, Serialize)]
pub struct HomeResponse {
    #[serde(flatten)]
    pub page: HomePage,
    pub cart: CartBadge,
}

pub async fn home(State(state): State<AppState>, session: Session) -> ApiResult<Json<HomeResponse>> {
    let page = state.shop.home().await?;
    Ok(Json(HomeResponse { page, cart: session.badge() }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProductListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
    pub search: Option<String>,
    pub category: Option<String>,
}

pub async fn products(State(state): State<AppState>, Query(query): Query<ProductListQuery>) -> ApiResult<Json<ProductList>> {
    let search = query.search.filter(|s| !s.trim().is_empty());
    let products = state.shop.list_products(search.clone(), query.category.as_deref()).await?;
    Ok(Json(ProductList { products, search, category: query.category }))
}

pub async fn product_detail(State(state): State<AppState>, Path(id): Path<ProductId>) -> ApiResult<Json<ProductDetail>> {
    Ok(Json(state.shop.product_detail(id).await?))
}

#[derive(Debug, Serialize)]
pub struct ReviewAdded {
    pub review: Review,
}

pub async fn add_review(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ProductId>,
    Json(form): Json<ReviewForm>,
) -> ApiResult<(StatusCode, Json<Notice<ReviewAdded>>)> {
    let user = state.shop.require_user(session.user_id()).await?;
    let review = state.shop.add_review(user.id, id, form, Utc::now()).await?;
    Ok((StatusCode::CREATED, Notice::new("Your review has been added!", ReviewAdded { review })))
}

pub async fn advanced_search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> ApiResult<Json<Value>> {
    let products = state.shop.advanced_search(params.clone()).await?;
    Ok(Json(json!({
        "products": products,
        "query": params.q,
        "category": params.category,
        "min_price": params.min_price,
        "max_price": params.max_price,
        "sort": params.sort,
    })))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ContactForm {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    pub subject: String,
    #[validate(length(min = 1))]
    pub message: String,
}

/// Messages are logged for staff rather than stored.
pub async fn contact(Json(form): Json<ContactForm>) -> ApiResult<Json<Value>> {
    form.validate().map_err(|_| ApiError::bad_request("Please fill in all fields correctly."))?;
    info!(email = %form.email, subject = %form.subject, "contact message received");
    Ok(Json(json!({
        "message": format!("Thank you {}! Your message has been sent. We will get back to you soon.", form.name.trim()),
    })))
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct NewsletterForm {
    #[validate(email)]
    pub email: String,
}

pub async fn newsletter(Json(form): Json<NewsletterForm>) -> ApiResult<Json<Value>> {
    if form.email.trim().is_empty() || form.validate().is_err() {
        return Err(ApiError::bad_request("Please enter a valid email address."));
    }
    info!(email = %form.email, "newsletter subscription");
    Ok(Json(json!({ "message": "Thank you for subscribing to our newsletter!" })))
}
