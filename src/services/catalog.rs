//! Catalog browsing, search and product reviews.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Storefront;
use crate::domain::aggregates::product::average_rating;
use crate::domain::aggregates::{Banner, Category, Product, ProductId, Review, UserId};
use crate::domain::value_objects::Rating;
use crate::repository::{CategoryFilter, NewReview, ProductSearch, ProductSort, SearchScope, StoreError};
use crate::{Result, StorefrontError};

const HOME_PRODUCTS: i64 = 4;
const SUGGESTED_PRODUCTS: i64 = 4;

#[derive(Clone, Debug, Serialize)]
pub struct HomePage {
    pub products: Vec<Product>,
    pub categories: Vec<Category>,
    pub banners: Vec<Banner>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProductDetail {
    pub product: Product,
    pub reviews: Vec<Review>,
    pub suggested_products: Vec<Product>,
    pub average_rating: Decimal,
    pub discount_percentage: Decimal,
    pub is_low_stock: bool,
}

/// Query string of the advanced search page.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReviewForm {
    pub rating: Option<u8>,
    pub comment: String,
}

impl Storefront {
    pub async fn home(&self) -> Result<HomePage> {
        Ok(HomePage {
            products: self.store.featured_products(HOME_PRODUCTS).await?,
            categories: self.store.categories().await?,
            banners: self.store.active_banners().await?,
        })
    }

    /// Product list filtered by free text over name, description and category name.
    pub async fn list_products(&self, search: Option<String>, category: Option<&str>) -> Result<Vec<Product>> {
        let query = ProductSearch {
            text: search,
            scope: SearchScope::Catalog,
            category: category.and_then(CategoryFilter::parse),
            ..Default::default()
        };
        Ok(self.store.search_products(&query).await?)
    }

    pub async fn advanced_search(&self, params: SearchParams) -> Result<Vec<Product>> {
        let query = ProductSearch {
            text: params.q,
            scope: SearchScope::Extended,
            category: params.category.as_deref().and_then(CategoryFilter::parse),
            min_price: params.min_price,
            max_price: params.max_price,
            active_only: true,
            sort: ProductSort::parse(params.sort.as_deref()),
        };
        Ok(self.store.search_products(&query).await?)
    }

    pub async fn product_detail(&self, id: ProductId) -> Result<ProductDetail> {
        let product = self.store.product(id).await?.ok_or(StorefrontError::NotFound("Product"))?;
        let reviews = self.store.reviews_for(id).await?;
        let suggested_products = self.store.suggested_products(product.category_id, id, SUGGESTED_PRODUCTS).await?;
        Ok(ProductDetail {
            average_rating: average_rating(&reviews),
            discount_percentage: product.discount_percentage(),
            is_low_stock: product.is_low_stock(),
            product,
            reviews,
            suggested_products,
        })
    }

    /// One review per user and product. The rating defaults to five stars.
    pub async fn add_review(&self, user_id: UserId, product_id: ProductId, form: ReviewForm, now: DateTime<Utc>) -> Result<Review> {
        self.store.product(product_id).await?.ok_or(StorefrontError::NotFound("Product"))?;
        let rating = match form.rating {
            None => Rating::default(),
            Some(r) => Rating::new(r).ok_or_else(|| StorefrontError::Invalid("Rating must be between 1 and 5.".into()))?,
        };
        let comment = form.comment.trim();
        if comment.is_empty() {
            return Err(StorefrontError::Invalid("Please write a comment.".into()));
        }
        let review = NewReview { product_id, user_id, rating: i16::from(rating.value()), comment: comment.to_string() };
        self.store.add_review(review, now).await.map_err(|e| match e {
            StoreError::Conflict(_) => StorefrontError::Invalid("You have already reviewed this product.".into()),
            other => other.into(),
        })
    }
}
