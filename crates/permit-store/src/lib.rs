//! The Shared Counter Store (SPEC §4.1): a Redis-backed implementation of
//! the Atomic Permit Script and Observation Ingester, plus an in-memory
//! [`FakeStore`] for tests that shouldn't depend on a live Redis.

pub mod error;
pub mod redis_store;

#[cfg(feature = "testing")]
pub mod fake_store;

pub use error::StoreError;
pub use redis_store::RedisStore;

#[cfg(feature = "testing")]
pub use fake_store::FakeStore;
