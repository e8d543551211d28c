//! The Local Pacer (SPEC §4.6): an in-process rate limiter used as the
//! fallback path when the Shared Counter Store is unreachable, both inside
//! the Client Admission Gate and (applied conservatively) inside the
//! Arbiter Service itself when configured fail-open.
//!
//! Unlike the arbiter's admission decision, the Local Pacer never denies —
//! it only paces. Each identity and each `(identity, route)` pair gets its
//! own independent schedule (SPEC §4.6), so one noisy identity can't starve
//! another's slot.
//!
//! ```
//! use permit_core::{Priority, RouteKey};
//! use permit_pacer::{LocalPacer, PacerConfig};
//!
//! # async fn example() {
//! let mut pacer = LocalPacer::new(PacerConfig::default());
//! pacer.start().await;
//!
//! let route = RouteKey::new("POST", "/channels/{channel_id}/messages", "123");
//! pacer.acquire(&"identity-a".to_string(), &route, Priority::Normal).await;
//! # }
//! ```

mod config;
mod events;
mod limiter;
mod pacer;

pub use config::{PacerConfig, PacerConfigBuilder};
pub use events::PacerEvent;
pub use pacer::LocalPacer;
