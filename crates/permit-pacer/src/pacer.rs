//! The Local Pacer (SPEC §4.6): the fallback limiter a client or the
//! arbiter itself falls back on when the Shared Counter Store is
//! unreachable.

use crate::config::PacerConfig;
use crate::events::PacerEvent;
use crate::limiter::KeyedSpacer;
use permit_core::{EventListeners, Identity, Priority, RouteKey};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// In-process token-spacing limiter used as the fallback path when the
/// Shared Counter Store cannot be reached (SPEC §4.4/§4.5/§4.6).
///
/// Acquiring always succeeds, possibly after waiting: unlike the arbiter
/// path, the Local Pacer has no deny outcome, only pacing.
pub struct LocalPacer {
    name: String,
    config: PacerConfig,
    global: Arc<KeyedSpacer<Identity>>,
    route: Arc<KeyedSpacer<(Identity, RouteKey)>>,
    event_listeners: EventListeners<PacerEvent>,
    cleanup_task: Arc<RwLock<Option<JoinHandle<()>>>>,
}

impl LocalPacer {
    /// Builds a Local Pacer with the given configuration. Call
    /// [`LocalPacer::start`] to begin periodic cleanup of stale schedules.
    pub fn new(config: PacerConfig) -> Self {
        Self::with_name("local-pacer", config)
    }

    pub fn with_name(name: impl Into<String>, config: PacerConfig) -> Self {
        Self {
            name: name.into(),
            global: Arc::new(KeyedSpacer::new(config.limits.global_rps)),
            route: Arc::new(KeyedSpacer::new(config.limits.route_rps)),
            config,
            event_listeners: EventListeners::new(),
            cleanup_task: Arc::new(RwLock::new(None)),
        }
    }

    /// Registers an event listener. Must be called before [`Self::start`]
    /// if the caller wants cleanup events too; acquire events are always
    /// observed regardless.
    pub fn add_listener<L>(&mut self, listener: L)
    where
        L: permit_core::EventListener<PacerEvent> + 'static,
    {
        self.event_listeners.add(listener);
    }

    /// Starts the background task that evicts schedules unused for longer
    /// than `stale_after` (SPEC §4.6: "~30s cadence, 60s staleness").
    pub async fn start(&self) {
        let global = Arc::clone(&self.global);
        let route = Arc::clone(&self.route);
        let event_listeners = self.event_listeners.clone();
        let name = self.name.clone();
        let cleanup_interval = self.config.cleanup_interval;
        let stale_after = self.config.stale_after;

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let now = Instant::now();
                let count =
                    global.evict_stale(now, stale_after) + route.evict_stale(now, stale_after);
                if count > 0 {
                    event_listeners.emit(&PacerEvent::StaleKeysEvicted {
                        pacer_name: name.clone(),
                        timestamp: now,
                        count,
                    });
                }
            }
        });
        *self.cleanup_task.write().await = Some(task);
    }

    /// Stops the background cleanup task, if running.
    pub async fn stop(&self) {
        if let Some(task) = self.cleanup_task.write().await.take() {
            task.abort();
        }
    }

    /// Acquires a pacing slot for `identity`/`route_key`, waiting as long
    /// as necessary. Acquires the global-by-identity slot first, then the
    /// route slot, per the nested acquire order in SPEC §4.6: the route
    /// wait is computed from the time after the global wait completes, not
    /// from the original call time.
    ///
    /// `priority` never changes the schedule a caller is given — the Local
    /// Pacer, like the arbiter, is priority-blind — it is only forwarded as
    /// metadata on [`PacerEvent::SlotAcquired`] (SPEC_FULL §3).
    pub async fn acquire(&self, identity: &Identity, route_key: &RouteKey, priority: Priority) {
        let start = Instant::now();

        let global_scheduled = self.global.reserve(identity, start);
        sleep_until(global_scheduled).await;

        let after_global = Instant::now();
        let route_key_tuple = (identity.clone(), route_key.clone());
        let route_scheduled = self.route.reserve(&route_key_tuple, after_global);
        sleep_until(route_scheduled).await;

        let wait_duration = Instant::now().saturating_duration_since(start);
        self.event_listeners.emit(&PacerEvent::SlotAcquired {
            pacer_name: self.name.clone(),
            timestamp: Instant::now(),
            wait_duration,
            priority,
        });
    }
}

async fn sleep_until(instant: Instant) {
    let now = Instant::now();
    if instant > now {
        tokio::time::sleep(instant - now).await;
    }
}
