//! Airline Market Simulation - Library Root
//!
//! Demand model, fix-seat auction, tick-driven pooling market and round
//! settlement for a multi-team airline revenue-management game.
//! Re-exports all modules for integration tests and benchmarks.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
