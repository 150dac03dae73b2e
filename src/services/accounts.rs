//! Registration, login, profile and wishlist.

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use validator::Validate;

use super::Storefront;
use crate::domain::aggregates::account::first_message;
use crate::domain::aggregates::order::total_spent;
use crate::domain::aggregates::{Order, Product, ProductId, ProfileUpdate, RegistrationError, RegistrationForm, User, UserId, UserProfile};
use crate::repository::{NewUser, StoreError, WishlistEntry};
use crate::{Result, StorefrontError};

const RECENT_ORDERS: usize = 5;

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| StorefrontError::PasswordHash(e.to_string()))
}

/// False for a wrong password and for a hash that cannot be parsed.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

#[derive(Clone, Debug, Serialize)]
pub struct ProfileOverview {
    pub user: User,
    pub profile: Option<UserProfile>,
    pub orders_count: usize,
    pub prescriptions_count: usize,
    pub reviews_count: i64,
    pub total_spent: Decimal,
    pub recent_orders: Vec<Order>,
}

impl Storefront {
    pub async fn register(&self, form: RegistrationForm, now: DateTime<Utc>) -> Result<User> {
        form.check_fields()?;
        let email = form.normalised_email();
        if self.store.user_by_email(&email).await?.is_some() {
            return Err(RegistrationError::EmailTaken.into());
        }
        form.check_strength_and_format()?;

        let new_user = NewUser {
            email: email.clone(),
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            password_hash: hash_password(&form.password1)?,
            is_staff: false,
        };
        let mut profile = UserProfile::new(0, form.mobile.trim(), now);
        profile.address = form.address;
        profile.city = form.city;
        profile.zip_code = form.zip_code;
        profile.newsletter = form.newsletter;

        let user = self.store.create_user(new_user, profile, now).await.map_err(|e| match e {
            StoreError::Conflict(_) => StorefrontError::Registration(RegistrationError::EmailTaken),
            other => other.into(),
        })?;
        info!(user_id = user.id, "account registered");
        Ok(user)
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let user = self.store.user_by_email(email).await?.ok_or(StorefrontError::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash) {
            return Err(StorefrontError::InvalidCredentials);
        }
        Ok(user)
    }

    /// The logged-in user, or `LoginRequired`. A session pointing at a deleted user counts as logged out.
    pub async fn require_user(&self, user_id: Option<UserId>) -> Result<User> {
        let id = user_id.ok_or(StorefrontError::LoginRequired)?;
        self.store.user(id).await?.ok_or(StorefrontError::LoginRequired)
    }

    pub async fn profile_overview(&self, user: User) -> Result<ProfileOverview> {
        let profile = self.store.profile(user.id).await?;
        let orders = self.store.orders_for_user(user.id).await?;
        let prescriptions_count = self.store.prescriptions_for_user(user.id).await?.len();
        let reviews_count = self.store.review_count(user.id).await?;
        Ok(ProfileOverview {
            orders_count: orders.len(),
            total_spent: total_spent(&orders),
            recent_orders: orders.into_iter().take(RECENT_ORDERS).collect(),
            prescriptions_count,
            reviews_count,
            profile,
            user,
        })
    }

    /// Any failure is reported as "Error updating profile: ...".
    pub async fn update_profile(&self, mut user: User, update: ProfileUpdate, now: DateTime<Utc>) -> Result<(User, UserProfile)> {
        let failed = |msg: String| StorefrontError::Invalid(format!("Error updating profile: {msg}"));
        update.validate().map_err(|e| failed(first_message(&e)))?;
        let mut profile = self.store.profile(user.id).await
            .map_err(|e| failed(e.to_string()))?
            .unwrap_or_else(|| UserProfile::new(user.id, "", now));
        update.apply(&mut user, &mut profile, now);
        self.store.save_account(&user, &profile).await.map_err(|e| match e {
            StoreError::Conflict(_) => failed("Email already registered.".into()),
            other => failed(other.to_string()),
        })?;
        Ok((user, profile))
    }

    pub async fn wishlist(&self, user_id: UserId) -> Result<Vec<WishlistEntry>> {
        Ok(self.store.wishlist(user_id).await?)
    }

    /// The flag is false when the product was already on the list.
    pub async fn add_to_wishlist(&self, user_id: UserId, product_id: ProductId, now: DateTime<Utc>) -> Result<(Product, bool)> {
        let product = self.store.product(product_id).await?.ok_or(StorefrontError::NotFound("Product"))?;
        let added = self.store.add_to_wishlist(user_id, product_id, now).await?;
        Ok((product, added))
    }

    pub async fn remove_from_wishlist(&self, user_id: UserId, product_id: ProductId) -> Result<Product> {
        let product = self.store.product(product_id).await?.ok_or(StorefrontError::NotInWishlist)?;
        if !self.store.remove_from_wishlist(user_id, product_id).await? {
            return Err(StorefrontError::NotInWishlist);
        }
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::pricing::PricingPolicy;
    use crate::infrastructure::{EventPublisher, InMemoryStore};

    fn shop() -> Storefront {
        Storefront {
            store: Arc::new(InMemoryStore::new()),
            events: EventPublisher::disabled(),
            pricing: PricingPolicy::default(),
            count_coupon_redemptions: false,
        }
    }

    fn form(email: &str) -> RegistrationForm {
        RegistrationForm {
            first_name: "Asha".into(), last_name: "Rao".into(), email: email.into(), mobile: "9876543210".into(),
            password1: "s3cretpass".into(), password2: "s3cretpass".into(), city: "Pune".into(), ..Default::default()
        }
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let shop = shop();
        let now = Utc::now();
        let user = shop.register(form("Asha@Example.com"), now).await.unwrap();
        assert_eq!(user.username, "asha@example.com");
        let profile = shop.store.profile(user.id).await.unwrap().unwrap();
        assert_eq!(profile.city, "Pune");

        assert_eq!(shop.authenticate("asha@example.com", "s3cretpass").await.unwrap().id, user.id);
        let err = shop.authenticate("asha@example.com", "nope").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid email or password.");
    }

    #[tokio::test]
    async fn test_duplicate_email_checked_before_password_length() {
        let shop = shop();
        shop.register(form("a@b.com"), Utc::now()).await.unwrap();
        let mut again = form("A@B.com");
        again.password1 = "short".into();
        again.password2 = "short".into();
        let err = shop.register(again, Utc::now()).await.unwrap_err();
        assert_eq!(err.to_string(), "Email already registered.");
    }

    #[tokio::test]
    async fn test_profile_update_reports_failures() {
        let shop = shop();
        let now = Utc::now();
        let user = shop.register(form("a@b.com"), now).await.unwrap();
        let bad = ProfileUpdate { email: "nope".into(), ..Default::default() };
        let err = shop.update_profile(user.clone(), bad, now).await.unwrap_err();
        assert!(err.to_string().starts_with("Error updating profile: "));

        let good = ProfileUpdate { first_name: "A".into(), email: "c@d.com".into(), city: "Goa".into(), ..Default::default() };
        let (user, profile) = shop.update_profile(user, good, now).await.unwrap();
        assert_eq!(user.email, "c@d.com");
        assert_eq!(profile.city, "Goa");
    }

    #[tokio::test]
    async fn test_wishlist_add_and_remove() {
        let shop = shop();
        let err = shop.remove_from_wishlist(1, 42).await.unwrap_err();
        assert_eq!(err.to_string(), "Product not found in your wishlist!");

        let store = Arc::new(InMemoryStore::new());
        store.insert_product(crate::domain::aggregates::product::sample_product(3, Decimal::ONE, 5)).await;
        let shop = Storefront { store, ..shop };
        let now = Utc::now();
        assert!(shop.add_to_wishlist(1, 3, now).await.unwrap().1);
        assert!(!shop.add_to_wishlist(1, 3, now).await.unwrap().1);
        assert_eq!(shop.wishlist(1).await.unwrap().len(), 1);
        assert_eq!(shop.remove_from_wishlist(1, 3).await.unwrap().id, 3);
        assert!(shop.remove_from_wishlist(1, 3).await.is_err());
    }
}
