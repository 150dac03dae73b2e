//! Mapping from storefront errors to HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::domain::aggregates::{CartError, CouponError, OrderError, PrescriptionError};
use crate::StorefrontError;

/// Error body is always `{"error": "<message>"}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self { Self::new(StatusCode::BAD_REQUEST, message) }
}

fn status_of(err: &StorefrontError) -> StatusCode {
    match err {
        StorefrontError::NotFound(_) | StorefrontError::NotInWishlist => StatusCode::NOT_FOUND,
        StorefrontError::LoginRequired | StorefrontError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        StorefrontError::Forbidden => StatusCode::FORBIDDEN,
        StorefrontError::Invalid(_) | StorefrontError::Registration(_) => StatusCode::BAD_REQUEST,
        StorefrontError::Cart(CartError::OutOfStock { .. }) => StatusCode::CONFLICT,
        StorefrontError::Coupon(CouponError::DuplicateCode(_)) => StatusCode::CONFLICT,
        StorefrontError::Coupon(_) => StatusCode::BAD_REQUEST,
        StorefrontError::Order(OrderError::NotFound) => StatusCode::NOT_FOUND,
        StorefrontError::Order(OrderError::InvalidTransition { .. } | OrderError::InsufficientStock(_)) => StatusCode::CONFLICT,
        StorefrontError::Order(_) => StatusCode::BAD_REQUEST,
        StorefrontError::Prescription(PrescriptionError::NotFound) => StatusCode::NOT_FOUND,
        StorefrontError::Prescription(PrescriptionError::InvalidTransition { .. }) => StatusCode::CONFLICT,
        StorefrontError::Prescription(_) => StatusCode::BAD_REQUEST,
        StorefrontError::Storage(_) | StorefrontError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<StorefrontError> for ApiError {
    fn from(err: StorefrontError) -> Self {
        let status = status_of(&err);
        if status.is_server_error() {
            error!(error = %err, "request failed");
            return Self::new(status, "Something went wrong. Please try again.");
        }
        Self::new(status, err.to_string())
    }
}

impl From<crate::repository::StoreError> for ApiError {
    fn from(err: crate::repository::StoreError) -> Self { StorefrontError::from(err).into() }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::StoreError;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (StorefrontError::NotFound("Product"), StatusCode::NOT_FOUND),
            (StorefrontError::LoginRequired, StatusCode::UNAUTHORIZED),
            (StorefrontError::Forbidden, StatusCode::FORBIDDEN),
            (CouponError::NotValid.into(), StatusCode::BAD_REQUEST),
            (OrderError::NoItems.into(), StatusCode::BAD_REQUEST),
            (OrderError::InsufficientStock("Aspirin".into()).into(), StatusCode::CONFLICT),
            (PrescriptionError::NotFound.into(), StatusCode::NOT_FOUND),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status, expected);
        }
    }

    #[test]
    fn test_storage_errors_are_not_leaked() {
        let api = ApiError::from(StorefrontError::Storage(StoreError::CouponExhausted));
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message, "Something went wrong. Please try again.");

        let api = ApiError::from(StorefrontError::Coupon(CouponError::NotFound));
        assert_eq!(api.message, "Invalid coupon code.");
    }
}
