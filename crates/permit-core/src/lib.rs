//! Shared types, configuration and event plumbing for the permit
//! arbitration workspace.
//!
//! This crate has no network dependency of its own: it defines the wire
//! protocol (SPEC §6), the Shared Counter Store contract (SPEC §4.1) that
//! `permit-store` implements, the enumerated configuration knobs (SPEC §6),
//! and the event system every other crate emits through.

pub mod config;
pub mod error;
pub mod events;
pub mod store;
pub mod types;

pub use config::{Limits, LimitsBuilder};
pub use error::ConfigError;
pub use events::{ArbiterEvent, EventListener, EventListeners, FnListener};
pub use store::{ObservationOutcome, PermitDecision, Store};
pub use types::{
    now_unix_ms, DenyReason, Group, Identity, ObservationReport, PermitRequest, PermitResponse,
    Priority, RateLimitScope, RouteKey,
};
