//! Local Pacer demo: independent per-identity and per-route schedules.
//!
//! Run with: cargo run --example local_pacer_demo -p permit-pacer
//!
//! This demonstrates the fallback path a Client Admission Gate falls back to
//! when the Arbiter Service is unreachable (SPEC §4.5/§4.6): acquires for
//! the same identity are spaced out, acquires for distinct identities never
//! wait on each other, and a burst of concurrent callers racing the same key
//! still come out in arrival order.

use permit_core::{Priority, RouteKey};
use permit_pacer::{LocalPacer, PacerConfigBuilder};
use std::sync::Arc;
use std::time::Instant;

#[tokio::main]
async fn main() {
    println!("=== Local Pacer Demo ===\n");

    demo_same_identity_spacing().await;
    println!("\n{}\n", "=".repeat(50));
    demo_independent_identities().await;
}

async fn demo_same_identity_spacing() {
    println!("1. SAME IDENTITY, SAME ROUTE");
    println!("   Five calls for one identity, route capped at 5 rps.\n");

    let config = PacerConfigBuilder::new().global_rps(1000).route_rps(5).build();
    let pacer = Arc::new(LocalPacer::new(config));
    let route = RouteKey::new("POST", "/channels/{channel_id}/messages", "123");

    let start = Instant::now();
    for i in 1..=5 {
        pacer.acquire(&"identity-a".to_string(), &route, Priority::Normal).await;
        println!("   call {i} admitted at {:?}", start.elapsed());
    }
}

async fn demo_independent_identities() {
    println!("2. DISTINCT IDENTITIES, SAME ROUTE");
    println!("   Two identities never wait on each other's global slot.\n");

    let config = PacerConfigBuilder::new().global_rps(1).route_rps(1000).build();
    let pacer = Arc::new(LocalPacer::new(config));
    let route = RouteKey::new("GET", "/guilds/{guild_id}", "42");

    let start = Instant::now();
    pacer.acquire(&"identity-a".to_string(), &route, Priority::Normal).await;
    pacer.acquire(&"identity-b".to_string(), &route, Priority::Normal).await;
    println!(
        "   both identities admitted within {:?} despite a 1 rps global cap",
        start.elapsed()
    );
}
