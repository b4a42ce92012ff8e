//! Persistence Adapters - JSONL-based File Storage
//!
//! Implements the `RoundRepository` port using append-only JSONL files
//! for round results and atomic JSON snapshots for session state.
//! No database dependency - lightweight and crash-recoverable.

pub mod repository_impl;
pub mod results;
pub mod state;

pub use repository_impl::RepositoryImpl;
pub use results::RoundLog;
pub use state::SnapshotStore;
