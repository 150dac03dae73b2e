//! Per-visitor session state.
//!
//! The cart, the applied coupon and the logged-in user travel together as one
//! value, loaded at the start of a request and written back explicitly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CouponId, UserId};
use crate::repository::StoreResult;

pub const SESSION_COOKIE: &str = "sessionid";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionData {
    pub cart: Cart,
    pub applied_coupon: Option<CouponId>,
    pub user_id: Option<UserId>,
}

impl SessionData {
    /// Counts shown in the cart badge on every page: (units, distinct products).
    pub fn cart_badge(&self) -> (u32, usize) { (self.cart.item_count(), self.cart.distinct_items()) }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, id: &str) -> StoreResult<Option<SessionData>>;
    async fn save(&self, id: &str, data: &SessionData) -> StoreResult<()>;
    async fn delete(&self, id: &str) -> StoreResult<()>;
}

pub fn new_session_id() -> String { Uuid::new_v4().simple().to_string() }

/// Pulls the session id out of a `Cookie` header value.
pub fn session_id_from_cookies(header: &str) -> Option<&str> {
    header.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|v| !v.is_empty() && v.len() <= 64 && v.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'))
}

pub fn session_cookie(id: &str) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax")
}
