//! Replays the allocation stress loop: pin one large array, churn
//! short-lived allocations while it is pinned, release, repeat.
//!
//! Run with `cargo run -p pinshim-bench --example critical_window`.

use pinshim_bench::{critical_window, hyperalloc_profile};
use pinshim_heap::PinStrategy;

const ITERS: usize = 10;
const ATTEMPTS: usize = 100_000;
const OBJECT_LEN: usize = 64;

fn main() {
    let (mut shim, array) = hyperalloc_profile(PinStrategy::InPlace);
    for i in 0..ITERS {
        println!("Acquired");
        let report = match critical_window(&mut shim, array, ATTEMPTS, OBJECT_LEN) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("iteration {i}: {e}");
                return;
            }
        };
        println!(
            "Releasing: {} allocated, {} blocked, {} collections so far",
            report.allocated, report.blocked, report.collections
        );
    }
    let counters = shim.counters();
    println!(
        "{} acquires, {} releases, balanced: {}",
        counters.acquires,
        counters.releases,
        counters.is_balanced()
    );
}
