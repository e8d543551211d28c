//! Events emitted by the Local Pacer.

use permit_core::{ArbiterEvent, Priority};
use std::time::{Duration, Instant};

/// Events emitted by a [`crate::LocalPacer`].
#[derive(Debug, Clone)]
pub enum PacerEvent {
    /// A caller was granted a slot, possibly after waiting.
    SlotAcquired {
        pacer_name: String,
        timestamp: Instant,
        wait_duration: Duration,
        /// The priority of the call this slot was acquired for, carried
        /// through as metadata so operators can tell whether high-priority
        /// callers are being starved (SPEC_FULL §3). The Local Pacer's
        /// scheduling itself is priority-blind, same as the arbiter.
        priority: Priority,
    },
    /// A periodic cleanup pass evicted schedules unused for longer than
    /// `stale_after`.
    StaleKeysEvicted {
        pacer_name: String,
        timestamp: Instant,
        count: usize,
    },
}

impl ArbiterEvent for PacerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PacerEvent::SlotAcquired { .. } => "slot_acquired",
            PacerEvent::StaleKeysEvicted { .. } => "stale_keys_evicted",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            PacerEvent::SlotAcquired { timestamp, .. } => *timestamp,
            PacerEvent::StaleKeysEvicted { timestamp, .. } => *timestamp,
        }
    }

    fn component_name(&self) -> &str {
        match self {
            PacerEvent::SlotAcquired { pacer_name, .. } => pacer_name,
            PacerEvent::StaleKeysEvicted { pacer_name, .. } => pacer_name,
        }
    }
}
