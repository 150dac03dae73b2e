//! Storefront domain model: pure data and rules, no I/O.
pub mod aggregates;
pub mod events;
pub mod pricing;
pub mod value_objects;
