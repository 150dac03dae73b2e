//! Environment-driven configuration.

use std::env;
use std::str::FromStr;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::pricing::PricingPolicy;

const DEFAULT_PORT: u16 = 8083;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    /// Process-local store seeded with sample data; nothing survives a restart.
    Memory,
}

#[derive(Clone, Debug)]
pub struct StorefrontConfig {
    pub port: u16,
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub nats_url: Option<String>,
    pub pricing: PricingPolicy,
    /// Whether placing an order counts a use against its coupon's cap.
    pub count_coupon_redemptions: bool,
    pub seed_sample_data: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
    #[error("DATABASE_URL must be set when STORAGE_BACKEND=postgres")]
    MissingDatabaseUrl,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            storage: StorageBackend::Postgres,
            database_url: None,
            db_max_connections: DEFAULT_MAX_CONNECTIONS,
            nats_url: None,
            pricing: PricingPolicy::default(),
            count_coupon_redemptions: false,
            seed_sample_data: false,
        }
    }
}

impl StorefrontConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let storage = match lookup("STORAGE_BACKEND").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("postgres") => StorageBackend::Postgres,
            Some("memory") => StorageBackend::Memory,
            Some(other) => return Err(ConfigError::InvalidValue { name: "STORAGE_BACKEND", value: other.to_string() }),
        };
        let database_url = lookup("DATABASE_URL").filter(|s| !s.is_empty());
        if storage == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        let pricing = PricingPolicy {
            tax_rate: parse_or(&lookup, "TAX_RATE", defaults.pricing.tax_rate)?,
            shipping_fee: parse_or(&lookup, "SHIPPING_FEE", defaults.pricing.shipping_fee)?,
            free_shipping_threshold: parse_or(&lookup, "FREE_SHIPPING_THRESHOLD", defaults.pricing.free_shipping_threshold)?,
            currency: lookup("CURRENCY").unwrap_or(defaults.pricing.currency),
        };
        if pricing.tax_rate < Decimal::ZERO || pricing.tax_rate > Decimal::ONE {
            return Err(ConfigError::InvalidValue { name: "TAX_RATE", value: pricing.tax_rate.to_string() });
        }
        Ok(Self {
            port: parse_or(&lookup, "PORT", defaults.port)?,
            storage,
            database_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", defaults.db_max_connections)?,
            nats_url: lookup("NATS_URL").filter(|s| !s.is_empty()),
            pricing,
            count_coupon_redemptions: parse_flag(&lookup, "COUNT_COUPON_REDEMPTIONS")?,
            seed_sample_data: parse_flag(&lookup, "SEED_SAMPLE_DATA")?,
        })
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &'static str, default: T) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<bool, ConfigError> {
    match lookup(name).as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue { name, value: other.to_string() }),
    }
}
