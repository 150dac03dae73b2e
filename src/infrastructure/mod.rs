//! Storage backends and outbound messaging.
pub mod memory;
pub mod nats;
pub mod postgres;
pub mod seed;

pub use memory::{InMemorySessionStore, InMemoryStore};
pub use nats::EventPublisher;
pub use postgres::{PgSessionStore, PgStore};
pub use seed::SampleData;
