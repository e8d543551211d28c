//! The Arbiter Service (SPEC §4.4): the axum HTTP front end over the Shared
//! Counter Store, exposing `request_token`, `report_result`, `healthz` and
//! `metrics` to Client Admission Gates.
//!
//! The store implementation is generic (`S: permit_core::Store`) so the
//! same router can run against a live `permit_store::RedisStore` or, in
//! tests, an in-memory `permit_store::FakeStore`.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ArbiterConfig;
pub use error::ServerError;
pub use routes::router;
pub use state::{ArbiterState, SharedState};
