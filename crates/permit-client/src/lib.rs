//! The Client Admission Gate (SPEC §4.5): the wrapper a bot's HTTP layer
//! calls before each request to the external API, arbitrating it through
//! the Arbiter Service and falling back to an in-process [`LocalPacer`]
//! when the arbiter can't be reached.
//!
//! ```
//! use permit_client::{AdmissionGate, GateConfig};
//! use permit_core::{Priority, PermitRequest};
//! use permit_pacer::LocalPacer;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pacer = Arc::new(LocalPacer::new(Default::default()));
//! let gate = AdmissionGate::connect(
//!     GateConfig::builder("http://localhost:8088").build(),
//!     pacer,
//! );
//!
//! let request = PermitRequest {
//!     client_id: "bot-1".into(),
//!     group_id: "1.2.3.4".into(),
//!     discord_identity: "identity-a".into(),
//!     method: "POST".into(),
//!     route: "/channels/{channel_id}/messages".into(),
//!     major_parameter: "123".into(),
//!     priority: Priority::Normal,
//!     max_wait_ms: 0,
//!     request_id: String::new(),
//! };
//!
//! gate.with_permit(request, || async {
//!     // call the external API here, returning an ExecutorResponse or Err
//!     Ok::<_, std::convert::Infallible>(permit_client::ExecutorResponse::new(200, Default::default()))
//! }).await?;
//! # Ok(())
//! # }
//! ```

pub use permit_pacer::LocalPacer;

pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod gate;
pub mod transport;

pub use config::{GateConfig, GateConfigBuilder};
pub use error::{ArbiterClientError, GateError};
pub use events::GateEvent;
pub use executor::ExecutorResponse;
pub use gate::AdmissionGate;
pub use transport::{ArbiterClient, HttpArbiterClient};
