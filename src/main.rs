//! Pharmacy storefront server

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use pharmacy_storefront::api::{self, AppState};
use pharmacy_storefront::config::{StorageBackend, StorefrontConfig};
use pharmacy_storefront::infrastructure::{EventPublisher, InMemorySessionStore, InMemoryStore, PgSessionStore, PgStore, SampleData};
use pharmacy_storefront::repository::Store;
use pharmacy_storefront::services::Storefront;
use pharmacy_storefront::session::SessionStore;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = StorefrontConfig::from_env()?;
    let (store, sessions) = open_storage(&config).await?;
    let events = match &config.nats_url {
        Some(url) => EventPublisher::connect(url).await,
        None => EventPublisher::disabled(),
    };
    let state = AppState { shop: Storefront::new(store, events, &config), sessions };
    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(%addr, storage = ?config.storage, "pharmacy storefront listening");
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}

async fn open_storage(config: &StorefrontConfig) -> Result<(Arc<dyn Store>, Arc<dyn SessionStore>)> {
    match config.storage {
        StorageBackend::Memory => {
            let store = InMemoryStore::seeded(&SampleData::build(Utc::now())).await;
            Ok((Arc::new(store), Arc::new(InMemorySessionStore::new())))
        }
        StorageBackend::Postgres => {
            let url = config.database_url.as_deref().context("DATABASE_URL is not set")?;
            let pool = PgPoolOptions::new().max_connections(config.db_max_connections).connect(url).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            let store = PgStore::new(pool.clone());
            if config.seed_sample_data {
                store.seed(&SampleData::build(Utc::now())).await?;
                tracing::info!("sample catalog loaded");
            }
            Ok((Arc::new(store), Arc::new(PgSessionStore::new(pool))))
        }
    }
}
