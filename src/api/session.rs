//! Session extractor and the `Set-Cookie` part that goes with it.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponseParts, ResponseParts};
use serde::Serialize;

use super::error::ApiResult;
use super::AppState;
use crate::domain::aggregates::UserId;
use crate::session::{new_session_id, session_cookie, session_id_from_cookies, SessionData, SessionStore, SESSION_COOKIE};

/// The visitor's session, loaded from the `sessionid` cookie. Unknown or
/// missing ids start a fresh, unsaved session under a newly minted id.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub data: SessionData,
    is_new: bool,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = super::ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let cookie_id = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(session_id_from_cookies)
            .map(str::to_owned);
        if let Some(id) = cookie_id {
            if let Some(data) = state.sessions.load(&id).await? {
                return Ok(Self { id, data, is_new: false });
            }
        }
        Ok(Self { id: new_session_id(), data: SessionData::default(), is_new: true })
    }
}

impl Session {
    pub fn user_id(&self) -> Option<UserId> { self.data.user_id }

    pub fn badge(&self) -> CartBadge {
        let (item_count, distinct_items) = self.data.cart_badge();
        CartBadge { item_count, distinct_items }
    }

    /// Writes the session back; a new session also gets its cookie set.
    pub async fn save(&self, store: &dyn SessionStore) -> ApiResult<SessionCookie> {
        store.save(&self.id, &self.data).await?;
        Ok(SessionCookie(self.is_new.then(|| session_cookie(&self.id))))
    }

    /// Moves the data to a fresh id so a pre-login id cannot be reused.
    pub async fn rotate(&mut self, store: &dyn SessionStore) -> ApiResult<()> {
        if !self.is_new {
            store.delete(&self.id).await?;
        }
        self.id = new_session_id();
        self.is_new = true;
        Ok(())
    }

    pub async fn destroy(self, store: &dyn SessionStore) -> ApiResult<SessionCookie> {
        if !self.is_new {
            store.delete(&self.id).await?;
        }
        Ok(SessionCookie(Some(format!("{SESSION_COOKIE}=; Max-Age=0; Path=/"))))
    }
}

/// Counts shown next to the cart icon.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct CartBadge {
    pub item_count: u32,
    pub distinct_items: usize,
}

/// Optional `Set-Cookie` header for the session id.
#[derive(Debug, Default)]
pub struct SessionCookie(pub Option<String>);

impl IntoResponseParts for SessionCookie {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if let Some(value) = self.0.and_then(|cookie| HeaderValue::from_str(&cookie).ok()) {
            res.headers_mut().append(header::SET_COOKIE, value);
        }
        Ok(res)
    }
}
