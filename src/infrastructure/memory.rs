//! Process-local store. Backs the `memory` storage backend and the HTTP tests.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::seed::SampleData;
use crate::domain::aggregates::{
    product::average_rating, Banner, Category, CategoryId, Coupon, CouponId, Doctor, NewCoupon, Order, OrderId,
    PaymentMethod, Prescription, PrescriptionId, Product, ProductId, Review, Specialization, StatusChange, User, UserId,
    UserProfile, WishlistItem,
};
use crate::domain::value_objects::CouponCode;
use crate::repository::*;
use crate::session::{SessionData, SessionStore};

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    banners: Vec<Banner>,
    payment_methods: Vec<PaymentMethod>,
    reviews: Vec<Review>,
    coupons: BTreeMap<CouponId, Coupon>,
    orders: BTreeMap<OrderId, Order>,
    users: BTreeMap<UserId, User>,
    profiles: HashMap<UserId, UserProfile>,
    wishlist: Vec<WishlistItem>,
    specializations: Vec<Specialization>,
    doctors: Vec<Doctor>,
    prescriptions: BTreeMap<PrescriptionId, Prescription>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn bump(&mut self, id: i64) { self.next_id = self.next_id.max(id); }

    fn category_name(&self, id: CategoryId) -> &str {
        self.categories.get(&id).map_or("", |c| c.name.as_str())
    }

    fn rating_of(&self, product_id: ProductId) -> rust_decimal::Decimal {
        let reviews: Vec<Review> = self.reviews.iter().filter(|r| r.product_id == product_id).cloned().collect();
        average_rating(&reviews)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self { Self::default() }

    pub async fn seeded(data: &SampleData) -> Self {
        let store = Self::new();
        for c in &data.categories { store.insert_category(c.clone()).await; }
        for p in &data.products { store.insert_product(p.clone()).await; }
        for m in &data.payment_methods { store.insert_payment_method(m.clone()).await; }
        for c in &data.coupons { store.insert_coupon(c.clone()).await; }
        for b in &data.banners { store.insert_banner(b.clone()).await; }
        for s in &data.specializations { store.insert_specialization(s.clone()).await; }
        for d in &data.doctors { store.insert_doctor(d.clone()).await; }
        store
    }

    pub async fn insert_category(&self, category: Category) {
        let mut t = self.tables.write().await;
        t.bump(category.id);
        t.categories.insert(category.id, category);
    }

    pub async fn insert_product(&self, product: Product) {
        let mut t = self.tables.write().await;
        t.bump(product.id);
        t.products.insert(product.id, product);
    }

    /// Hard-deletes a product, leaving any cart entries pointing at it dangling.
    pub async fn delete_product(&self, id: ProductId) -> bool {
        self.tables.write().await.products.remove(&id).is_some()
    }

    pub async fn insert_payment_method(&self, method: PaymentMethod) {
        let mut t = self.tables.write().await;
        t.bump(method.id);
        t.payment_methods.push(method);
    }

    pub async fn insert_coupon(&self, coupon: Coupon) {
        let mut t = self.tables.write().await;
        t.bump(coupon.id);
        t.coupons.insert(coupon.id, coupon);
    }

    pub async fn insert_banner(&self, banner: Banner) {
        let mut t = self.tables.write().await;
        t.bump(banner.id);
        t.banners.push(banner);
    }

    pub async fn insert_specialization(&self, specialization: Specialization) {
        let mut t = self.tables.write().await;
        t.bump(specialization.id);
        t.specializations.push(specialization);
    }

    pub async fn insert_doctor(&self, doctor: Doctor) {
        let mut t = self.tables.write().await;
        t.bump(doctor.id);
        t.doctors.push(doctor);
    }

    pub async fn set_staff(&self, user_id: UserId, is_staff: bool) -> bool {
        match self.tables.write().await.users.get_mut(&user_id) {
            Some(user) => { user.is_staff = is_staff; true }
            None => false,
        }
    }
}

#[async_trait]
impl CatalogRepository for InMemoryStore {
    async fn featured_products(&self, limit: i64) -> StoreResult<Vec<Product>> {
        let t = self.tables.read().await;
        Ok(t.products.values().filter(|p| p.is_in_stock()).take(limit.max(0) as usize).cloned().collect())
    }

    async fn categories(&self) -> StoreResult<Vec<Category>> {
        Ok(self.tables.read().await.categories.values().cloned().collect())
    }

    async fn active_banners(&self) -> StoreResult<Vec<Banner>> {
        let mut banners: Vec<Banner> = self.tables.read().await.banners.iter().filter(|b| b.is_active).cloned().collect();
        banners.sort_by_key(|b| (b.display_order, b.created_at));
        Ok(banners)
    }

    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self.tables.read().await.products.get(&id).cloned())
    }

    async fn products_by_ids(&self, ids: &[ProductId]) -> StoreResult<HashMap<ProductId, Product>> {
        let t = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| t.products.get(id)).map(|p| (p.id, p.clone())).collect())
    }

    async fn search_products(&self, search: &ProductSearch) -> StoreResult<Vec<Product>> {
        let t = self.tables.read().await;
        let mut found: Vec<Product> = t.products.values()
            .filter(|p| search.matches(p, t.category_name(p.category_id)))
            .cloned()
            .collect();
        match search.sort {
            ProductSort::Name => found.sort_by(|a, b| a.name.cmp(&b.name)),
            ProductSort::PriceLow => found.sort_by(|a, b| a.price.cmp(&b.price)),
            ProductSort::PriceHigh => found.sort_by(|a, b| b.price.cmp(&a.price)),
            ProductSort::Newest => found.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ProductSort::Rating => found.sort_by(|a, b| t.rating_of(b.id).cmp(&t.rating_of(a.id))),
        }
        Ok(found)
    }

    async fn suggested_products(&self, category_id: CategoryId, exclude: ProductId, limit: i64) -> StoreResult<Vec<Product>> {
        let t = self.tables.read().await;
        Ok(t.products.values()
            .filter(|p| p.category_id == category_id && p.id != exclude)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn reviews_for(&self, product_id: ProductId) -> StoreResult<Vec<Review>> {
        let t = self.tables.read().await;
        let mut reviews: Vec<Review> = t.reviews.iter().filter(|r| r.product_id == product_id).cloned().collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(reviews)
    }

    async fn add_review(&self, review: NewReview, now: DateTime<Utc>) -> StoreResult<Review> {
        let mut t = self.tables.write().await;
        if t.reviews.iter().any(|r| r.product_id == review.product_id && r.user_id == review.user_id) {
            return Err(StoreError::Conflict(format!("review of product {} by user {}", review.product_id, review.user_id)));
        }
        let review = Review {
            id: t.next_id(), product_id: review.product_id, user_id: review.user_id, rating: review.rating,
            comment: review.comment, is_approved: true, created_at: now,
        };
        t.reviews.push(review.clone());
        Ok(review)
    }

    async fn low_stock_products(&self) -> StoreResult<Vec<Product>> {
        let t = self.tables.read().await;
        Ok(t.products.values().filter(|p| p.is_low_stock()).cloned().collect())
    }

    async fn payment_methods(&self, active_only: bool) -> StoreResult<Vec<PaymentMethod>> {
        let t = self.tables.read().await;
        Ok(t.payment_methods.iter().filter(|m| !active_only || m.is_active).cloned().collect())
    }
}

#[async_trait]
impl CouponRepository for InMemoryStore {
    async fn coupon(&self, id: CouponId) -> StoreResult<Option<Coupon>> {
        Ok(self.tables.read().await.coupons.get(&id).cloned())
    }

    async fn coupon_by_code(&self, code: &CouponCode) -> StoreResult<Option<Coupon>> {
        Ok(self.tables.read().await.coupons.values().find(|c| &c.code == code).cloned())
    }

    async fn coupons(&self) -> StoreResult<Vec<Coupon>> {
        Ok(self.tables.read().await.coupons.values().cloned().collect())
    }

    async fn create_coupon(&self, new: NewCoupon, now: DateTime<Utc>) -> StoreResult<Coupon> {
        let mut t = self.tables.write().await;
        if t.coupons.values().any(|c| c.code == new.code) {
            return Err(StoreError::Conflict(format!("coupon code {}", new.code)));
        }
        let coupon = Coupon {
            id: t.next_id(), code: new.code, discount_kind: new.discount_kind, discount_value: new.discount_value,
            minimum_amount: new.minimum_amount, maximum_uses: new.maximum_uses, used_count: 0,
            valid_from: new.valid_from, valid_to: new.valid_to, is_active: new.is_active, created_at: now,
        };
        t.coupons.insert(coupon.id, coupon.clone());
        Ok(coupon)
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn place_order(&self, order: &Order, redeem_coupon: bool) -> StoreResult<Order> {
        let mut t = self.tables.write().await;
        // Stock is checked before anything is touched.
        for item in &order.items {
            let product = t.products.get(&item.product_id).ok_or_else(|| StoreError::InsufficientStock(item.product_name.clone()))?;
            if i64::from(product.stock) < i64::from(item.quantity) {
                return Err(StoreError::InsufficientStock(item.product_name.clone()));
            }
        }
        // Redeem before any stock moves.
        if let Some(id) = order.coupon_id.filter(|_| redeem_coupon) {
            let coupon = t.coupons.get_mut(&id).ok_or(StoreError::CouponExhausted)?;
            coupon.redeem(order.created_at).map_err(|_| StoreError::CouponExhausted)?;
        }
        for item in &order.items {
            if let Some(product) = t.products.get_mut(&item.product_id) {
                let qty = i32::try_from(item.quantity).unwrap_or(i32::MAX);
                product.stock -= qty;
                product.purchase_count = product.purchase_count.saturating_add(qty);
            }
        }
        let mut stored = order.clone();
        stored.id = t.next_id();
        stored.events.clear();
        t.orders.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn orders_for_user(&self, user_id: UserId) -> StoreResult<Vec<Order>> {
        let t = self.tables.read().await;
        let mut orders: Vec<Order> = t.orders.values().filter(|o| o.user_id == user_id).cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(orders)
    }

    async fn record_status_change(&self, order: &Order, change: &StatusChange) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let stored = t.orders.get_mut(&order.id).ok_or_else(|| StoreError::Database(format!("order {} missing", order.id)))?;
        stored.status = order.status;
        stored.delivered_at = order.delivered_at;
        stored.updated_at = order.updated_at;
        stored.status_history.push(change.clone());
        Ok(())
    }

    async fn mark_paid(&self, order: &Order) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        let stored = t.orders.get_mut(&order.id).ok_or_else(|| StoreError::Database(format!("order {} missing", order.id)))?;
        stored.is_paid = order.is_paid;
        stored.payment_id = order.payment_id.clone();
        stored.updated_at = order.updated_at;
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for InMemoryStore {
    async fn user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim().to_lowercase();
        Ok(self.tables.read().await.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, new: NewUser, profile: UserProfile, now: DateTime<Utc>) -> StoreResult<User> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::Conflict(format!("email {}", new.email)));
        }
        let user = User {
            id: t.next_id(), username: new.email.clone(), email: new.email, first_name: new.first_name,
            last_name: new.last_name, password_hash: new.password_hash, is_staff: new.is_staff, date_joined: now,
        };
        t.profiles.insert(user.id, UserProfile { user_id: user.id, ..profile });
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn profile(&self, user_id: UserId) -> StoreResult<Option<UserProfile>> {
        Ok(self.tables.read().await.profiles.get(&user_id).cloned())
    }

    async fn save_account(&self, user: &User, profile: &UserProfile) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.id != user.id && u.email == user.email) {
            return Err(StoreError::Conflict(format!("email {}", user.email)));
        }
        t.users.insert(user.id, user.clone());
        t.profiles.insert(user.id, profile.clone());
        Ok(())
    }

    async fn review_count(&self, user_id: UserId) -> StoreResult<i64> {
        Ok(self.tables.read().await.reviews.iter().filter(|r| r.user_id == user_id).count() as i64)
    }

    async fn wishlist(&self, user_id: UserId) -> StoreResult<Vec<WishlistEntry>> {
        let t = self.tables.read().await;
        Ok(t.wishlist.iter()
            .filter(|w| w.user_id == user_id)
            .filter_map(|w| t.products.get(&w.product_id).map(|p| WishlistEntry { product: p.clone(), added_at: w.created_at }))
            .collect())
    }

    async fn add_to_wishlist(&self, user_id: UserId, product_id: ProductId, now: DateTime<Utc>) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        if t.wishlist.iter().any(|w| w.user_id == user_id && w.product_id == product_id) {
            return Ok(false);
        }
        t.wishlist.push(WishlistItem { user_id, product_id, created_at: now });
        Ok(true)
    }

    async fn remove_from_wishlist(&self, user_id: UserId, product_id: ProductId) -> StoreResult<bool> {
        let mut t = self.tables.write().await;
        let before = t.wishlist.len();
        t.wishlist.retain(|w| !(w.user_id == user_id && w.product_id == product_id));
        Ok(t.wishlist.len() != before)
    }
}

#[async_trait]
impl ClinicRepository for InMemoryStore {
    async fn specializations(&self) -> StoreResult<Vec<Specialization>> {
        Ok(self.tables.read().await.specializations.clone())
    }

    async fn doctors(&self, specialization_id: Option<i64>) -> StoreResult<Vec<Doctor>> {
        let t = self.tables.read().await;
        let mut doctors: Vec<Doctor> = t.doctors.iter()
            .filter(|d| d.is_active && specialization_id.map_or(true, |s| d.specialization_id == s))
            .cloned()
            .collect();
        doctors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(doctors)
    }

    async fn find_doctor_by_name(&self, name: &str) -> StoreResult<Option<Doctor>> {
        let t = self.tables.read().await;
        Ok(t.doctors.iter().find(|d| d.is_active && d.name_matches(name)).cloned())
    }

    async fn create_prescription(&self, prescription: &Prescription) -> StoreResult<Prescription> {
        let mut t = self.tables.write().await;
        let stored = Prescription { id: t.next_id(), ..prescription.clone() };
        t.prescriptions.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn prescription(&self, id: PrescriptionId) -> StoreResult<Option<Prescription>> {
        Ok(self.tables.read().await.prescriptions.get(&id).cloned())
    }

    async fn prescriptions_for_user(&self, user_id: UserId) -> StoreResult<Vec<Prescription>> {
        let t = self.tables.read().await;
        let mut found: Vec<Prescription> = t.prescriptions.values().filter(|p| p.user_id == Some(user_id)).cloned().collect();
        found.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(b.id.cmp(&a.id)));
        Ok(found)
    }

    async fn save_review(&self, prescription: &Prescription) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        t.prescriptions.insert(prescription.id, prescription.clone());
        Ok(())
    }
}

/// Session storage held in process memory.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionData>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, id: &str) -> StoreResult<Option<SessionData>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn save(&self, id: &str, data: &SessionData) -> StoreResult<()> {
        self.sessions.write().await.insert(id.to_string(), data.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }
}
