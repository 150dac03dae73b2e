//! Customer accounts, profiles and wishlists

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

use super::product::ProductId;
use crate::domain::value_objects::is_valid_mobile;

pub type UserId = i64;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    /// Always equal to the email address.
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub user_id: UserId,
    pub mobile: String,
    pub date_of_birth: Option<NaiveDate>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
    pub newsletter: bool,
    pub loyalty_points: i32,
    pub medical_conditions: String,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: UserId, mobile: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id, mobile: mobile.into(), date_of_birth: None, address: String::new(), city: String::new(),
            state: String::new(), zip_code: String::new(), country: "India".into(), newsletter: false,
            loyalty_points: 0, medical_conditions: String::new(), updated_at: now,
        }
    }
}

fn validate_mobile(mobile: &str) -> Result<(), ValidationError> {
    if is_valid_mobile(mobile) { return Ok(()); }
    let mut err = ValidationError::new("mobile");
    err.message = Some("Please enter a valid mobile number with at least 10 digits.".into());
    Err(err)
}

/// Sign-up form.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RegistrationForm {
    pub first_name: String,
    pub last_name: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    #[validate(custom = "validate_mobile")]
    pub mobile: String,
    pub password1: String,
    pub password2: String,
    pub address: String,
    pub city: String,
    pub zip_code: String,
    pub newsletter: bool,
}

impl RegistrationForm {
    /// Checks that need no storage access: required fields and matching passwords.
    pub fn check_fields(&self) -> Result<(), RegistrationError> {
        let required = [&self.first_name, &self.last_name, &self.email, &self.mobile, &self.password1, &self.password2];
        if required.iter().any(|f| f.trim().is_empty()) {
            return Err(RegistrationError::MissingFields);
        }
        if self.password1 != self.password2 {
            return Err(RegistrationError::PasswordMismatch);
        }
        Ok(())
    }

    /// Password length and field formats; run after the duplicate-email lookup.
    pub fn check_strength_and_format(&self) -> Result<(), RegistrationError> {
        if self.password1.chars().count() < MIN_PASSWORD_LEN {
            return Err(RegistrationError::PasswordTooShort);
        }
        self.validate().map_err(|e| RegistrationError::Invalid(first_message(&e)))
    }

    pub fn normalised_email(&self) -> String { self.email.trim().to_lowercase() }
}

/// Profile edit form.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,
    pub mobile: String,
    pub address: String,
    pub city: String,
    pub zip_code: String,
}

impl ProfileUpdate {
    pub fn apply(&self, user: &mut User, profile: &mut UserProfile, now: DateTime<Utc>) {
        user.first_name = self.first_name.clone();
        user.last_name = self.last_name.clone();
        user.email = self.email.trim().to_lowercase();
        user.username = user.email.clone();
        profile.mobile = self.mobile.clone();
        profile.address = self.address.clone();
        profile.city = self.city.clone();
        profile.zip_code = self.zip_code.clone();
        profile.updated_at = now;
    }
}

/// Picks a user-facing message out of a validator error set.
pub fn first_message(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by_key(|(name, _)| *name);
    fields.into_iter()
        .flat_map(|(field, errs)| errs.iter().map(move |e| (field, e)))
        .next()
        .map(|(field, e)| e.message.as_ref().map_or_else(|| format!("Invalid value for {field}."), |m| m.to_string()))
        .unwrap_or_else(|| "Invalid input.".to_string())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct WishlistItem {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Please fill in all required fields.")]
    MissingFields,
    #[error("Passwords do not match.")]
    PasswordMismatch,
    #[error("Email already registered.")]
    EmailTaken,
    #[error("Password must be at least 8 characters long.")]
    PasswordTooShort,
    #[error("{0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> RegistrationForm {
        RegistrationForm {
            first_name: "Asha".into(), last_name: "Rao".into(), email: "Asha@Example.com".into(),
            mobile: "98765 43210".into(), password1: "s3cretpass".into(), password2: "s3cretpass".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_registration_happy_path() {
        let f = form();
        assert!(f.check_fields().is_ok());
        assert!(f.check_strength_and_format().is_ok());
        assert_eq!(f.normalised_email(), "asha@example.com");
    }

    #[test]
    fn test_registration_failures() {
        let mut f = form();
        f.last_name.clear();
        assert_eq!(f.check_fields(), Err(RegistrationError::MissingFields));

        let mut f = form();
        f.password2 = "different".into();
        assert_eq!(f.check_fields(), Err(RegistrationError::PasswordMismatch));

        let mut f = form();
        f.password1 = "short".into();
        f.password2 = "short".into();
        assert_eq!(f.check_strength_and_format(), Err(RegistrationError::PasswordTooShort));

        let mut f = form();
        f.mobile = "12345".into();
        assert_eq!(
            f.check_strength_and_format(),
            Err(RegistrationError::Invalid("Please enter a valid mobile number with at least 10 digits.".into()))
        );
    }

    #[test]
    fn test_profile_update_applies() {
        let now = Utc::now();
        let mut user = User {
            id: 1, username: "a@b.com".into(), email: "a@b.com".into(), first_name: String::new(), last_name: String::new(),
            password_hash: String::new(), is_staff: false, date_joined: now,
        };
        let mut profile = UserProfile::new(1, "9999999999", now);
        let update = ProfileUpdate { first_name: "A".into(), email: "New@B.com".into(), city: "Pune".into(), ..Default::default() };
        update.apply(&mut user, &mut profile, now);
        assert_eq!(user.email, "new@b.com");
        assert_eq!(profile.city, "Pune");
        assert_eq!(profile.country, "India");
    }
}
