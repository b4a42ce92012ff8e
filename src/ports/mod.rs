//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the use case layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `RoundRepository`: Round results and session snapshots (file-based)
//! - `MarketObserver`: Auction, tick and round event sink

pub mod observer;
pub mod repository;
