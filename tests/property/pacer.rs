//! Property tests for the Local Pacer (SPEC_FULL §8, invariants 5 and 6).
//!
//! Invariant 5: acquires for an identical key complete in arrival order,
//! with pairwise spacing of at least `ceil(1000/rps) - 1` ms.
//! Invariant 6: per-identity global schedules are independent — acquires
//! for distinct identities never wait on each other.

use proptest::prelude::*;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

use permit_core::{Priority, RouteKey};
use permit_pacer::{LocalPacer, PacerConfigBuilder};

fn route() -> RouteKey {
    RouteKey::new("POST", "/channels/{channel_id}/messages", "123")
}

fn interval_ms(rps: u32) -> u64 {
    (1000 + rps as u64 - 1) / rps as u64
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Invariant 5: same-key acquires complete in the order they arrived,
    /// spaced at least `ceil(1000/rps) - 1`ms apart.
    #[test]
    fn same_key_acquires_are_fifo_and_spaced(
        global_rps in 2u32..=40,
        num_acquires in 2usize..=6,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let config = PacerConfigBuilder::new()
                .global_rps(global_rps)
                .route_rps(10_000)
                .build();
            let pacer = Arc::new(LocalPacer::new(config));
            let identity = "identity-shared".to_string();
            let r = route();

            let completions: Arc<Mutex<Vec<(usize, Instant)>>> = Arc::new(Mutex::new(Vec::new()));
            let start = Instant::now();

            let mut handles = Vec::new();
            for i in 0..num_acquires {
                let pacer = Arc::clone(&pacer);
                let identity = identity.clone();
                let r = r.clone();
                let completions = Arc::clone(&completions);
                handles.push(tokio::spawn(async move {
                    // Stagger arrival deterministically: task i reaches the
                    // spacer's reservation lock strictly after task i-1,
                    // mirroring arrival order without relying on scheduler
                    // luck for who reaches the mutex first.
                    tokio::time::sleep(Duration::from_millis(5 * i as u64)).await;
                    pacer.acquire(&identity, &r, Priority::Normal).await;
                    completions.lock().unwrap().push((i, Instant::now()));
                }));
            }
            for handle in handles {
                handle.await.unwrap();
            }

            let mut completed = completions.lock().unwrap().clone();
            completed.sort_by_key(|(_, t)| *t);
            let arrival_order: Vec<usize> = completed.iter().map(|(i, _)| *i).collect();
            let expected_order: Vec<usize> = (0..num_acquires).collect();
            prop_assert_eq!(
                arrival_order,
                expected_order,
                "acquires must complete in arrival order"
            );

            let min_spacing = interval_ms(global_rps).saturating_sub(1);
            for window in completed.windows(2) {
                let gap = window[1].1.saturating_duration_since(window[0].1);
                prop_assert!(
                    gap >= Duration::from_millis(min_spacing),
                    "expected spacing >= {min_spacing}ms, got {gap:?}"
                );
            }

            let _ = start;
            Ok(())
        })?;
    }

    /// Invariant 6: distinct identities never wait on each other's global
    /// schedule, regardless of how many identities race concurrently.
    #[test]
    fn distinct_identities_never_cross_wait(
        global_rps in 1u32..=5,
        num_identities in 2usize..=12,
    ) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let config = PacerConfigBuilder::new()
                .global_rps(global_rps)
                .route_rps(10_000)
                .build();
            let pacer = Arc::new(LocalPacer::new(config));
            let r = route();

            let start = Instant::now();
            let mut handles = Vec::new();
            for n in 0..num_identities {
                let pacer = Arc::clone(&pacer);
                let r = r.clone();
                let identity = format!("identity-{n}");
                handles.push(tokio::spawn(async move {
                    pacer.acquire(&identity, &r, Priority::Normal).await;
                }));
            }
            for handle in handles {
                handle.await.unwrap();
            }
            let elapsed = start.elapsed();

            // Every identity's first acquire is immediate (no prior
            // schedule to wait on); a low ceiling here catches any
            // accidental sharing of one global key across identities.
            prop_assert!(
                elapsed < Duration::from_millis(200),
                "identities appear to share a schedule: took {elapsed:?} for {num_identities} identities"
            );
            Ok(())
        })?;
    }
}
