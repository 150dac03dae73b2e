//! Postgres-backed storage.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder};
use tracing::debug;

use super::seed::SampleData;
use crate::domain::aggregates::{
    Banner, Category, CategoryId, Coupon, CouponId, DeliveryDetails, Doctor, NewCoupon, Order, OrderId, OrderItem,
    PaymentMethod, Prescription, PrescriptionId, Product, ProductId, Review, Specialization, StatusChange, User, UserId,
    UserProfile, WishlistItem,
};
use crate::domain::value_objects::CouponCode;
use crate::repository::*;
use crate::session::{SessionData, SessionStore};

#[derive(Clone)]
pub struct PgStore { pool: PgPool }

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub fn pool(&self) -> &PgPool { &self.pool }

    async fn hydrate_order(&self, row: OrderRow) -> StoreResult<Order> {
        let items = sqlx::query_as::<_, OrderItemRow>(
            "SELECT product_id, product_name, quantity, unit_price FROM order_items WHERE order_id = $1 ORDER BY id",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;
        let history = sqlx::query_as::<_, StatusChangeRow>(
            "SELECT status, notes, changed_by, created_at FROM order_status_history WHERE order_id = $1 ORDER BY created_at, id",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?;
        row.into_order(items, history)
    }

    /// Inserts the sample catalog, skipping anything already present.
    pub async fn seed(&self, data: &SampleData) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for c in &data.categories {
            sqlx::query("INSERT INTO categories (name, description) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
                .bind(&c.name).bind(&c.description)
                .execute(&mut *tx).await?;
        }
        for p in &data.products {
            let category = data.categories.iter().find(|c| c.id == p.category_id).map(|c| c.name.as_str()).unwrap_or_default();
            sqlx::query(
                "INSERT INTO products (name, slug, category_id, description, price, mrp, stock, min_stock_level, is_active) \
                 SELECT $1, $2, c.id, $4, $5, $6, $7, $8, $9 FROM categories c WHERE c.name = $3 \
                 ON CONFLICT (slug) DO NOTHING",
            )
            .bind(&p.name).bind(&p.slug).bind(category).bind(&p.description).bind(p.price).bind(p.mrp)
            .bind(p.stock).bind(p.min_stock_level).bind(p.is_active)
            .execute(&mut *tx).await?;
        }
        for m in &data.payment_methods {
            sqlx::query(
                "INSERT INTO payment_methods (name, payment_type, is_active, processing_fee, icon) VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (name) DO NOTHING",
            )
            .bind(&m.name).bind(&m.payment_type).bind(m.is_active).bind(m.processing_fee).bind(&m.icon)
            .execute(&mut *tx).await?;
        }
        for c in &data.coupons {
            sqlx::query(
                "INSERT INTO coupons (code, discount_type, discount_value, minimum_amount, maximum_uses, valid_from, valid_to, is_active, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) ON CONFLICT (code) DO NOTHING",
            )
            .bind(c.code.as_str()).bind(c.discount_kind.as_str()).bind(c.discount_value).bind(c.minimum_amount)
            .bind(c.maximum_uses).bind(c.valid_from).bind(c.valid_to).bind(c.is_active).bind(c.created_at)
            .execute(&mut *tx).await?;
        }
        for b in &data.banners {
            sqlx::query(
                "INSERT INTO banners (title, icon, link_url, is_active, display_order) \
                 SELECT $1, $2, $3, $4, $5 WHERE NOT EXISTS (SELECT 1 FROM banners WHERE title = $1)",
            )
            .bind(&b.title).bind(&b.icon).bind(&b.link_url).bind(b.is_active).bind(b.display_order)
            .execute(&mut *tx).await?;
        }
        for s in &data.specializations {
            sqlx::query("INSERT INTO specializations (name, description) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
                .bind(&s.name).bind(&s.description)
                .execute(&mut *tx).await?;
        }
        for d in &data.doctors {
            let specialization = data.specializations.iter()
                .find(|s| s.id == d.specialization_id)
                .map(|s| s.name.as_str())
                .unwrap_or_default();
            sqlx::query(
                "INSERT INTO doctors (name, specialization_id, license_number, experience_years, is_active) \
                 SELECT $1, s.id, $3, $4, $5 FROM specializations s WHERE s.name = $2 \
                 ON CONFLICT (license_number) DO NOTHING",
            )
            .bind(&d.name).bind(specialization).bind(&d.license_number).bind(d.experience_years).bind(d.is_active)
            .execute(&mut *tx).await?;
        }
        tx.commit().await?;
        debug!("🗃️ Sample data seeded");
        Ok(())
    }
}

// =============================================================================
// Row types for tables whose columns hold enum text
// =============================================================================

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: i64,
    code: String,
    discount_type: String,
    discount_value: Decimal,
    minimum_amount: Decimal,
    maximum_uses: i32,
    used_count: i32,
    valid_from: DateTime<Utc>,
    valid_to: DateTime<Utc>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = StoreError;
    fn try_from(r: CouponRow) -> Result<Self, Self::Error> {
        Ok(Coupon {
            id: r.id,
            code: CouponCode::parse(&r.code).map_err(|e| StoreError::Corrupt(format!("coupon {}: {e}", r.id)))?,
            discount_kind: r.discount_type.parse().map_err(|e| StoreError::Corrupt(format!("coupon {}: {e}", r.id)))?,
            discount_value: r.discount_value,
            minimum_amount: r.minimum_amount,
            maximum_uses: r.maximum_uses,
            used_count: r.used_count,
            valid_from: r.valid_from,
            valid_to: r.valid_to,
            is_active: r.is_active,
            created_at: r.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    order_number: String,
    user_id: i64,
    status: String,
    subtotal: Decimal,
    tax_amount: Decimal,
    shipping_cost: Decimal,
    discount_amount: Decimal,
    total_price: Decimal,
    coupon_id: Option<i64>,
    payment_method_id: Option<i64>,
    is_paid: bool,
    payment_id: String,
    shipping_address: String,
    billing_address: String,
    phone: String,
    email: String,
    notes: String,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow { product_id: i64, product_name: String, quantity: i32, unit_price: Decimal }

#[derive(sqlx::FromRow)]
struct StatusChangeRow { status: String, notes: String, changed_by: Option<i64>, created_at: DateTime<Utc> }

impl OrderRow {
    fn into_order(self, items: Vec<OrderItemRow>, history: Vec<StatusChangeRow>) -> StoreResult<Order> {
        let corrupt = |e: crate::domain::aggregates::OrderError| StoreError::Corrupt(format!("order {}: {e}", self.order_number));
        let status = self.status.parse().map_err(corrupt)?;
        let status_history = history.into_iter()
            .map(|h| -> StoreResult<StatusChange> {
                Ok(StatusChange { status: h.status.parse().map_err(corrupt)?, notes: h.notes, changed_by: h.changed_by, created_at: h.created_at })
            })
            .collect::<StoreResult<Vec<_>>>()?;
        let items = items.into_iter()
            .map(|i| OrderItem { product_id: i.product_id, product_name: i.product_name, quantity: i.quantity.max(0) as u32, unit_price: i.unit_price })
            .collect();
        Ok(Order {
            id: self.id,
            order_number: self.order_number.clone(),
            user_id: self.user_id,
            status,
            items,
            subtotal: self.subtotal,
            tax_amount: self.tax_amount,
            shipping_cost: self.shipping_cost,
            discount_amount: self.discount_amount,
            total_price: self.total_price,
            coupon_id: self.coupon_id,
            payment_method_id: self.payment_method_id,
            is_paid: self.is_paid,
            payment_id: self.payment_id.clone(),
            delivery: DeliveryDetails {
                shipping_address: self.shipping_address.clone(),
                billing_address: self.billing_address.clone(),
                phone: self.phone.clone(),
                email: self.email.clone(),
                notes: self.notes.clone(),
            },
            delivered_at: self.delivered_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            status_history,
            events: vec![],
        })
    }
}

#[derive(sqlx::FromRow)]
struct PrescriptionRow {
    id: i64,
    user_id: Option<i64>,
    doctor_id: Option<i64>,
    patient_name: String,
    patient_phone: String,
    patient_email: String,
    doctor_name: String,
    image_ref: String,
    delivery_address: String,
    special_instructions: String,
    is_urgent: bool,
    status: String,
    uploaded_at: DateTime<Utc>,
    reviewed_at: Option<DateTime<Utc>>,
    reviewed_by: Option<i64>,
    notes: String,
}

impl TryFrom<PrescriptionRow> for Prescription {
    type Error = StoreError;
    fn try_from(r: PrescriptionRow) -> Result<Self, Self::Error> {
        Ok(Prescription {
            status: r.status.parse().map_err(|e| StoreError::Corrupt(format!("prescription {}: {e}", r.id)))?,
            id: r.id,
            user_id: r.user_id,
            doctor_id: r.doctor_id,
            patient_name: r.patient_name,
            patient_phone: r.patient_phone,
            patient_email: r.patient_email,
            doctor_name: r.doctor_name,
            image_ref: r.image_ref,
            delivery_address: r.delivery_address,
            special_instructions: r.special_instructions,
            is_urgent: r.is_urgent,
            uploaded_at: r.uploaded_at,
            reviewed_at: r.reviewed_at,
            reviewed_by: r.reviewed_by,
            notes: r.notes,
        })
    }
}

fn like_pattern(text: &str) -> String {
    let escaped = text.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

// =============================================================================
// Repository implementations
// =============================================================================

#[async_trait]
impl CatalogRepository for PgStore {
    async fn featured_products(&self, limit: i64) -> StoreResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE stock > 0 ORDER BY id LIMIT $1")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    async fn categories(&self) -> StoreResult<Vec<Category>> {
        Ok(sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY id").fetch_all(&self.pool).await?)
    }

    async fn active_banners(&self) -> StoreResult<Vec<Banner>> {
        let banners = sqlx::query_as::<_, Banner>("SELECT * FROM banners WHERE is_active ORDER BY display_order, created_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(banners)
    }

    async fn product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(&self.pool).await?)
    }

    async fn products_by_ids(&self, ids: &[ProductId]) -> StoreResult<HashMap<ProductId, Product>> {
        if ids.is_empty() { return Ok(HashMap::new()); }
        let products = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(products.into_iter().map(|p| (p.id, p)).collect())
    }

    async fn search_products(&self, search: &ProductSearch) -> StoreResult<Vec<Product>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT p.* FROM products p JOIN categories c ON c.id = p.category_id WHERE TRUE");
        if search.active_only {
            builder.push(" AND p.is_active");
        }
        if let Some(text) = search.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = like_pattern(text);
            let columns: &[&str] = match search.scope {
                SearchScope::Catalog => &["p.name", "p.description", "c.name"],
                SearchScope::Extended => &["p.name", "p.description", "p.brand", "p.manufacturer"],
            };
            builder.push(" AND (");
            let mut any = builder.separated(" OR ");
            for column in columns {
                any.push(format!("{column} ILIKE "));
                any.push_bind_unseparated(pattern.clone());
            }
            builder.push(")");
        }
        match &search.category {
            Some(CategoryFilter::Id(id)) => { builder.push(" AND p.category_id = ").push_bind(*id); }
            Some(CategoryFilter::Name(name)) => { builder.push(" AND c.name ILIKE ").push_bind(like_pattern(name)); }
            None => {}
        }
        if let Some(min) = search.min_price { builder.push(" AND p.price >= ").push_bind(min); }
        if let Some(max) = search.max_price { builder.push(" AND p.price <= ").push_bind(max); }
        builder.push(match search.sort {
            ProductSort::Name => " ORDER BY p.name",
            ProductSort::PriceLow => " ORDER BY p.price, p.name",
            ProductSort::PriceHigh => " ORDER BY p.price DESC, p.name",
            ProductSort::Newest => " ORDER BY p.created_at DESC",
            ProductSort::Rating => {
                " ORDER BY (SELECT COALESCE(AVG(r.rating), 0) FROM reviews r WHERE r.product_id = p.id AND r.is_approved) DESC, p.name"
            }
        });
        Ok(builder.build_query_as::<Product>().fetch_all(&self.pool).await?)
    }

    async fn suggested_products(&self, category_id: CategoryId, exclude: ProductId, limit: i64) -> StoreResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE category_id = $1 AND id <> $2 ORDER BY id LIMIT $3")
            .bind(category_id).bind(exclude).bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    async fn reviews_for(&self, product_id: ProductId) -> StoreResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE product_id = $1 ORDER BY created_at DESC, id DESC")
            .bind(product_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(reviews)
    }

    async fn add_review(&self, review: NewReview, now: DateTime<Utc>) -> StoreResult<Review> {
        let review = sqlx::query_as::<_, Review>(
            "INSERT INTO reviews (product_id, user_id, rating, comment, is_approved, created_at) VALUES ($1, $2, $3, $4, TRUE, $5) RETURNING *",
        )
        .bind(review.product_id).bind(review.user_id).bind(review.rating).bind(&review.comment).bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(review)
    }

    async fn low_stock_products(&self) -> StoreResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE stock <= min_stock_level ORDER BY stock, name")
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    async fn payment_methods(&self, active_only: bool) -> StoreResult<Vec<PaymentMethod>> {
        let methods = sqlx::query_as::<_, PaymentMethod>("SELECT * FROM payment_methods WHERE is_active OR NOT $1 ORDER BY id")
            .bind(active_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(methods)
    }
}

#[async_trait]
impl CouponRepository for PgStore {
    async fn coupon(&self, id: CouponId) -> StoreResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        row.map(Coupon::try_from).transpose()
    }

    async fn coupon_by_code(&self, code: &CouponCode) -> StoreResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons WHERE code = $1")
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Coupon::try_from).transpose()
    }

    async fn coupons(&self) -> StoreResult<Vec<Coupon>> {
        let rows = sqlx::query_as::<_, CouponRow>("SELECT * FROM coupons ORDER BY created_at DESC, id DESC").fetch_all(&self.pool).await?;
        rows.into_iter().map(Coupon::try_from).collect()
    }

    async fn create_coupon(&self, new: NewCoupon, now: DateTime<Utc>) -> StoreResult<Coupon> {
        let row = sqlx::query_as::<_, CouponRow>(
            "INSERT INTO coupons (code, discount_type, discount_value, minimum_amount, maximum_uses, valid_from, valid_to, is_active, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
        )
        .bind(new.code.as_str()).bind(new.discount_kind.as_str()).bind(new.discount_value).bind(new.minimum_amount)
        .bind(new.maximum_uses).bind(new.valid_from).bind(new.valid_to).bind(new.is_active).bind(now)
        .fetch_one(&self.pool)
        .await?;
        Coupon::try_from(row)
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn place_order(&self, order: &Order, redeem_coupon: bool) -> StoreResult<Order> {
        let mut tx = self.pool.begin().await?;
        for item in &order.items {
            let quantity = i32::try_from(item.quantity).map_err(|_| StoreError::InsufficientStock(item.product_name.clone()))?;
            let taken = sqlx::query(
                "UPDATE products SET stock = stock - $2, purchase_count = purchase_count + $2, updated_at = NOW() \
                 WHERE id = $1 AND stock >= $2",
            )
            .bind(item.product_id).bind(quantity)
            .execute(&mut *tx)
            .await?;
            if taken.rows_affected() == 0 {
                return Err(StoreError::InsufficientStock(item.product_name.clone()));
            }
        }
        if let Some(coupon_id) = order.coupon_id.filter(|_| redeem_coupon) {
            let redeemed = sqlx::query("UPDATE coupons SET used_count = used_count + 1 WHERE id = $1 AND used_count < maximum_uses")
                .bind(coupon_id)
                .execute(&mut *tx)
                .await?;
            if redeemed.rows_affected() == 0 {
                return Err(StoreError::CouponExhausted);
            }
        }
        let d = &order.delivery;
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO orders (order_number, user_id, status, subtotal, tax_amount, shipping_cost, discount_amount, total_price, \
             coupon_id, payment_method_id, is_paid, payment_id, shipping_address, billing_address, phone, email, notes, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19) RETURNING id",
        )
        .bind(&order.order_number).bind(order.user_id).bind(order.status.as_str())
        .bind(order.subtotal).bind(order.tax_amount).bind(order.shipping_cost).bind(order.discount_amount).bind(order.total_price)
        .bind(order.coupon_id).bind(order.payment_method_id).bind(order.is_paid).bind(&order.payment_id)
        .bind(&d.shipping_address).bind(&d.billing_address).bind(&d.phone).bind(&d.email).bind(&d.notes)
        .bind(order.created_at).bind(order.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        for item in &order.items {
            sqlx::query("INSERT INTO order_items (order_id, product_id, product_name, quantity, unit_price) VALUES ($1, $2, $3, $4, $5)")
                .bind(id).bind(item.product_id).bind(&item.product_name).bind(item.quantity as i32).bind(item.unit_price)
                .execute(&mut *tx)
                .await?;
        }
        for change in &order.status_history {
            sqlx::query("INSERT INTO order_status_history (order_id, status, notes, changed_by, created_at) VALUES ($1, $2, $3, $4, $5)")
                .bind(id).bind(change.status.as_str()).bind(&change.notes).bind(change.changed_by).bind(change.created_at)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        debug!("🗃️ Order {} saved with id {id}", order.order_number);
        let mut stored = order.clone();
        stored.id = id;
        stored.events.clear();
        Ok(stored)
    }

    async fn order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => Ok(Some(self.hydrate_order(row).await?)),
            None => Ok(None),
        }
    }

    async fn orders_for_user(&self, user_id: UserId) -> StoreResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.hydrate_order(row).await?);
        }
        Ok(orders)
    }

    async fn record_status_change(&self, order: &Order, change: &StatusChange) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE orders SET status = $2, delivered_at = $3, updated_at = $4 WHERE id = $1")
            .bind(order.id).bind(order.status.as_str()).bind(order.delivered_at).bind(order.updated_at)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO order_status_history (order_id, status, notes, changed_by, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(order.id).bind(change.status.as_str()).bind(&change.notes).bind(change.changed_by).bind(change.created_at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn mark_paid(&self, order: &Order) -> StoreResult<()> {
        sqlx::query("UPDATE orders SET is_paid = $2, payment_id = $3, updated_at = $4 WHERE id = $1")
            .bind(order.id).bind(order.is_paid).bind(&order.payment_id).bind(order.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for PgStore {
    async fn user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(&self.pool).await?)
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create_user(&self, new: NewUser, profile: UserProfile, now: DateTime<Utc>) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, first_name, last_name, password_hash, is_staff, date_joined) \
             VALUES ($1, $1, $2, $3, $4, $5, $6) RETURNING *",
        )
        .bind(&new.email).bind(&new.first_name).bind(&new.last_name).bind(&new.password_hash).bind(new.is_staff).bind(now)
        .fetch_one(&mut *tx)
        .await?;
        upsert_profile(&mut tx, &UserProfile { user_id: user.id, ..profile }).await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn profile(&self, user_id: UserId) -> StoreResult<Option<UserProfile>> {
        let profile = sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    async fn save_account(&self, user: &User, profile: &UserProfile) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE users SET username = $2, email = $2, first_name = $3, last_name = $4 WHERE id = $1")
            .bind(user.id).bind(&user.email).bind(&user.first_name).bind(&user.last_name)
            .execute(&mut *tx)
            .await?;
        upsert_profile(&mut tx, profile).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn review_count(&self, user_id: UserId) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM reviews WHERE user_id = $1").bind(user_id).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn wishlist(&self, user_id: UserId) -> StoreResult<Vec<WishlistEntry>> {
        let items = sqlx::query_as::<_, WishlistItem>("SELECT * FROM wishlist_items WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        let ids: Vec<ProductId> = items.iter().map(|w| w.product_id).collect();
        let mut products = self.products_by_ids(&ids).await?;
        Ok(items.into_iter()
            .filter_map(|w| products.remove(&w.product_id).map(|product| WishlistEntry { product, added_at: w.created_at }))
            .collect())
    }

    async fn add_to_wishlist(&self, user_id: UserId, product_id: ProductId, now: DateTime<Utc>) -> StoreResult<bool> {
        let inserted = sqlx::query("INSERT INTO wishlist_items (user_id, product_id, created_at) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING")
            .bind(user_id).bind(product_id).bind(now)
            .execute(&self.pool)
            .await?;
        Ok(inserted.rows_affected() == 1)
    }

    async fn remove_from_wishlist(&self, user_id: UserId, product_id: ProductId) -> StoreResult<bool> {
        let deleted = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id).bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected() > 0)
    }
}

async fn upsert_profile(tx: &mut sqlx::Transaction<'_, Postgres>, p: &UserProfile) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO user_profiles (user_id, mobile, date_of_birth, address, city, state, zip_code, country, newsletter, \
         loyalty_points, medical_conditions, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
         ON CONFLICT (user_id) DO UPDATE SET mobile = EXCLUDED.mobile, date_of_birth = EXCLUDED.date_of_birth, \
         address = EXCLUDED.address, city = EXCLUDED.city, state = EXCLUDED.state, zip_code = EXCLUDED.zip_code, \
         country = EXCLUDED.country, newsletter = EXCLUDED.newsletter, loyalty_points = EXCLUDED.loyalty_points, \
         medical_conditions = EXCLUDED.medical_conditions, updated_at = EXCLUDED.updated_at",
    )
    .bind(p.user_id).bind(&p.mobile).bind(p.date_of_birth).bind(&p.address).bind(&p.city).bind(&p.state)
    .bind(&p.zip_code).bind(&p.country).bind(p.newsletter).bind(p.loyalty_points).bind(&p.medical_conditions).bind(p.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl ClinicRepository for PgStore {
    async fn specializations(&self) -> StoreResult<Vec<Specialization>> {
        Ok(sqlx::query_as::<_, Specialization>("SELECT * FROM specializations ORDER BY id").fetch_all(&self.pool).await?)
    }

    async fn doctors(&self, specialization_id: Option<i64>) -> StoreResult<Vec<Doctor>> {
        let doctors = sqlx::query_as::<_, Doctor>(
            "SELECT * FROM doctors WHERE is_active AND ($1::BIGINT IS NULL OR specialization_id = $1) ORDER BY name",
        )
        .bind(specialization_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(doctors)
    }

    async fn find_doctor_by_name(&self, name: &str) -> StoreResult<Option<Doctor>> {
        let name = name.trim();
        if name.is_empty() { return Ok(None); }
        let doctor = sqlx::query_as::<_, Doctor>("SELECT * FROM doctors WHERE is_active AND name ILIKE $1 ORDER BY id LIMIT 1")
            .bind(like_pattern(name))
            .fetch_optional(&self.pool)
            .await?;
        Ok(doctor)
    }

    async fn create_prescription(&self, p: &Prescription) -> StoreResult<Prescription> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO prescriptions (user_id, doctor_id, patient_name, patient_phone, patient_email, doctor_name, image_ref, \
             delivery_address, special_instructions, is_urgent, status, uploaded_at, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING id",
        )
        .bind(p.user_id).bind(p.doctor_id).bind(&p.patient_name).bind(&p.patient_phone).bind(&p.patient_email)
        .bind(&p.doctor_name).bind(&p.image_ref).bind(&p.delivery_address).bind(&p.special_instructions)
        .bind(p.is_urgent).bind(p.status.as_str()).bind(p.uploaded_at).bind(&p.notes)
        .fetch_one(&self.pool)
        .await?;
        Ok(Prescription { id, ..p.clone() })
    }

    async fn prescription(&self, id: PrescriptionId) -> StoreResult<Option<Prescription>> {
        let row = sqlx::query_as::<_, PrescriptionRow>("SELECT * FROM prescriptions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Prescription::try_from).transpose()
    }

    async fn prescriptions_for_user(&self, user_id: UserId) -> StoreResult<Vec<Prescription>> {
        let rows = sqlx::query_as::<_, PrescriptionRow>("SELECT * FROM prescriptions WHERE user_id = $1 ORDER BY uploaded_at DESC, id DESC")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Prescription::try_from).collect()
    }

    async fn save_review(&self, p: &Prescription) -> StoreResult<()> {
        sqlx::query("UPDATE prescriptions SET status = $2, reviewed_at = $3, reviewed_by = $4, notes = $5 WHERE id = $1")
            .bind(p.id).bind(p.status.as_str()).bind(p.reviewed_at).bind(p.reviewed_by).bind(&p.notes)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Sessions kept in the `sessions` table as JSONB.
#[derive(Clone)]
pub struct PgSessionStore { pool: PgPool }

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, id: &str) -> StoreResult<Option<SessionData>> {
        let row: Option<(Json<SessionData>,)> = sqlx::query_as("SELECT data FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(Json(data),)| data))
    }

    async fn save(&self, id: &str, data: &SessionData) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO sessions (id, data, updated_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()",
        )
        .bind(id).bind(Json(data))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(())
    }
}
