//! Catalog records: products, categories, reviews, banners and payment methods

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

pub type ProductId = i64;
pub type CategoryId = i64;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category { pub id: CategoryId, pub name: String, pub description: String }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub category_id: CategoryId,
    pub brand: String,
    pub manufacturer: String,
    pub description: String,
    pub short_description: String,
    pub price: Decimal,
    /// Maximum retail price printed on the pack.
    pub mrp: Decimal,
    pub stock: i32,
    pub min_stock_level: i32,
    pub is_prescription: bool,
    pub is_featured: bool,
    pub is_active: bool,
    pub expiry_date: Option<NaiveDate>,
    pub batch_number: String,
    pub image_url: Option<String>,
    pub view_count: i32,
    pub purchase_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_in_stock(&self) -> bool { self.stock > 0 }
    pub fn is_low_stock(&self) -> bool { self.stock <= self.min_stock_level }

    /// Whole-percent saving against the MRP. Ties round to even.
    pub fn discount_percentage(&self) -> Decimal {
        if self.mrp > self.price {
            ((self.mrp - self.price) / self.mrp * Decimal::ONE_HUNDRED)
                .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        } else {
            Decimal::ZERO
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: i64,
    pub product_id: ProductId,
    pub user_id: i64,
    pub rating: i16,
    pub comment: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

/// Mean of approved ratings to one decimal place, zero when there are none.
pub fn average_rating(reviews: &[Review]) -> Decimal {
    let approved: Vec<_> = reviews.iter().filter(|r| r.is_approved).collect();
    if approved.is_empty() { return Decimal::ZERO; }
    let sum: i64 = approved.iter().map(|r| i64::from(r.rating)).sum();
    (Decimal::from(sum) / Decimal::from(approved.len() as i64))
        .round_dp_with_strategy(1, RoundingStrategy::MidpointNearestEven)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Banner {
    pub id: i64,
    pub title: String,
    pub icon: String,
    pub photo_url: Option<String>,
    pub link_url: String,
    pub is_active: bool,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PaymentMethod {
    pub id: i64,
    pub name: String,
    /// One of card, upi, wallet, cod, bank.
    pub payment_type: String,
    pub is_active: bool,
    pub processing_fee: Decimal,
    pub icon: String,
}

#[cfg(test)]
pub(crate) fn sample_product(id: ProductId, price: Decimal, stock: i32) -> Product {
    let now = Utc::now();
    Product {
        id, name: format!("Product {id}"), slug: format!("product-{id}"), category_id: 1,
        brand: String::new(), manufacturer: String::new(), description: String::new(),
        short_description: String::new(), price, mrp: price, stock, min_stock_level: 10,
        is_prescription: false, is_featured: false, is_active: true, expiry_date: None,
        batch_number: String::new(), image_url: None, view_count: 0, purchase_count: 0,
        created_at: now, updated_at: now,
    }
}
