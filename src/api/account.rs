//! Registration, login, profile and wishlist endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{ApiResult, AppState, Notice, Session, SessionCookie};
use crate::domain::aggregates::{ProductId, ProfileUpdate, RegistrationForm, User, UserProfile};
use crate::repository::WishlistEntry;
use crate::services::ProfileOverview;
use crate::StorefrontError;

#[derive(Debug, Serialize)]
pub struct UserBody {
    pub user: User,
}

/// Unexpected storage failures surface as "Error creating account: ...".
pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<RegistrationForm>,
) -> ApiResult<(StatusCode, Json<Notice<UserBody>>)> {
    let user = state.shop.register(form, Utc::now()).await.map_err(|e| match e {
        StorefrontError::Storage(inner) => StorefrontError::Invalid(format!("Error creating account: {inner}")),
        other => other,
    })?;
    Ok((StatusCode::CREATED, Notice::new("Account created successfully! Please login to continue.", UserBody { user })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    #[serde(alias = "username")]
    pub email: String,
    pub password: String,
}

/// Keeps the cart across login but issues a new session id.
pub async fn login(
    State(state): State<AppState>,
    mut session: Session,
    Json(form): Json<LoginForm>,
) -> ApiResult<(SessionCookie, Json<Notice<UserBody>>)> {
    let email = form.email.trim().to_lowercase();
    let user = state.shop.authenticate(&email, &form.password).await?;
    session.rotate(state.sessions.as_ref()).await?;
    session.data.user_id = Some(user.id);
    let cookie = session.save(state.sessions.as_ref()).await?;
    info!(user_id = user.id, "user logged in");
    let message = format!("Welcome back, {}!", user.first_name);
    Ok((cookie, Notice::new(message, UserBody { user })))
}

pub async fn logout(State(state): State<AppState>, session: Session) -> ApiResult<(SessionCookie, Json<Value>)> {
    let cookie = session.destroy(state.sessions.as_ref()).await?;
    Ok((cookie, Json(json!({ "message": "You have been logged out successfully." }))))
}

pub async fn profile(State(state): State<AppState>, session: Session) -> ApiResult<Json<ProfileOverview>> {
    let user = state.shop.require_user(session.user_id()).await?;
    Ok(Json(state.shop.profile_overview(user).await?))
}

#[derive(Debug, Serialize)]
pub struct ProfileBody {
    pub user: User,
    pub profile: UserProfile,
}

pub async fn update_profile(
    State(state): State<AppState>,
    session: Session,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<Notice<ProfileBody>>> {
    let user = state.shop.require_user(session.user_id()).await?;
    let (user, profile) = state.shop.update_profile(user, update, Utc::now()).await?;
    Ok(Notice::new("Profile updated successfully!", ProfileBody { user, profile }))
}

#[derive(Debug, Serialize)]
pub struct WishlistBody {
    pub items: Vec<WishlistEntry>,
}

pub async fn wishlist(State(state): State<AppState>, session: Session) -> ApiResult<Json<WishlistBody>> {
    let user = state.shop.require_user(session.user_id()).await?;
    Ok(Json(WishlistBody { items: state.shop.wishlist(user.id).await? }))
}

#[derive(Debug, Serialize)]
pub struct WishlistChange {
    pub product_id: ProductId,
    pub in_wishlist: bool,
}

pub async fn add_to_wishlist(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ProductId>,
) -> ApiResult<Json<Notice<WishlistChange>>> {
    let user = state.shop.require_user(session.user_id()).await?;
    let (product, added) = state.shop.add_to_wishlist(user.id, id, Utc::now()).await?;
    let message = if added {
        format!("{} added to your wishlist!", product.name)
    } else {
        format!("{} is already in your wishlist!", product.name)
    };
    Ok(Notice::new(message, WishlistChange { product_id: product.id, in_wishlist: true }))
}

pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<ProductId>,
) -> ApiResult<Json<Notice<WishlistChange>>> {
    let user = state.shop.require_user(session.user_id()).await?;
    let product = state.shop.remove_from_wishlist(user.id, id).await?;
    let message = format!("{} removed from your wishlist!", product.name);
    Ok(Notice::new(message, WishlistChange { product_id: product.id, in_wishlist: false }))
}
