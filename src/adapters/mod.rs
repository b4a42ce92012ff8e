//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! infrastructure (file I/O, HTTP). Each sub-module groups adapters by
//! infrastructure concern.
//!
//! Adapter categories:
//! - `metrics`: Prometheus metrics export and health checks
//! - `persistence`: JSONL round results and session snapshots

pub mod metrics;
pub mod persistence;
