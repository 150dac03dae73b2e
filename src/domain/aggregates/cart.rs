//! Cart Aggregate
//!
//! The cart is a per-session value: a mapping from product id to quantity.
//! Prices are never stored in it; they are resolved against the catalog each
//! time the cart is rendered or checked out.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::product::{Product, ProductId};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: BTreeMap<ProductId, u32>,
}

/// Anything that can resolve a product id to the current catalog record.
pub trait CatalogLookup {
    fn product(&self, id: ProductId) -> Option<&Product>;
}

impl CatalogLookup for HashMap<ProductId, Product> {
    fn product(&self, id: ProductId) -> Option<&Product> { self.get(&id) }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CartLine {
    pub product: Product,
    pub quantity: u32,
    pub line_total: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CartSummary {
    pub lines: Vec<CartLine>,
    pub subtotal: Decimal,
}

impl CartSummary {
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
}

impl Cart {
    pub fn new() -> Self { Self::default() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn quantity_of(&self, id: ProductId) -> Option<u32> { self.items.get(&id).copied() }
    pub fn product_ids(&self) -> Vec<ProductId> { self.items.keys().copied().collect() }

    /// Total number of units across all lines (the cart badge count).
    pub fn item_count(&self) -> u32 { self.items.values().sum() }
    /// Number of distinct products in the cart.
    pub fn distinct_items(&self) -> usize { self.items.len() }

    /// Adds one unit of `product`, refusing products that have no stock left.
    pub fn add_product(&mut self, product: &Product) -> Result<u32, CartError> {
        if !product.is_in_stock() {
            return Err(CartError::OutOfStock { name: product.name.clone() });
        }
        Ok(self.add(product.id))
    }

    /// Adds one unit and returns the new quantity.
    pub fn add(&mut self, id: ProductId) -> u32 {
        let qty = self.items.entry(id).or_insert(0);
        *qty = qty.saturating_add(1);
        *qty
    }

    /// Removes one unit; a line at quantity one is dropped entirely.
    /// Returns the remaining quantity, or `None` if the product was not in the cart.
    pub fn decrease(&mut self, id: ProductId) -> Option<u32> {
        let qty = self.items.get_mut(&id)?;
        if *qty > 1 {
            *qty -= 1;
            Some(*qty)
        } else {
            self.items.remove(&id);
            Some(0)
        }
    }

    /// Returns true if the product was present.
    pub fn remove(&mut self, id: ProductId) -> bool { self.items.remove(&id).is_some() }

    pub fn clear(&mut self) { self.items.clear(); }

    /// Resolves every entry against the catalog. Entries whose product no
    /// longer exists are skipped without error.
    pub fn compute_lines(&self, catalog: &impl CatalogLookup) -> CartSummary {
        let lines: Vec<CartLine> = self.items.iter()
            .filter_map(|(id, qty)| {
                let product = catalog.product(*id)?;
                Some(CartLine { product: product.clone(), quantity: *qty, line_total: product.price * Decimal::from(*qty) })
            })
            .collect();
        let subtotal = lines.iter().map(|l| l.line_total).sum();
        CartSummary { lines, subtotal }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Sorry, {name} is out of stock.")]
    OutOfStock { name: String },
}
