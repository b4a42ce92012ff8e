//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates the domain to implement the round lifecycle. The first
//! four are synchronous, I/O-free operations on a `Session`; the last two
//! add concurrency and timing around them.
//!
//! Use cases:
//! - `auction_runner`: Fix-seat auction and round opening
//! - `tick_engine`: One pooling-market tick
//! - `round_aggregator`: Ledger settlement into round results
//! - `phase_machine`: Phase transitions and forced round end
//! - `registry`: Concurrent session ownership
//! - `scheduler`: Wall-clock tick driver with persistence

pub mod auction_runner;
pub mod phase_machine;
pub mod registry;
pub mod round_aggregator;
pub mod scheduler;
pub mod tick_engine;
