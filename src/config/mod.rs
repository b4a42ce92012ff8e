//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml`. Every section
//! and field has a default, so a minimal file only lists teams. Market
//! parameters live in `[simulation]` and map one-to-one onto
//! [`SessionParams`]; nothing is hardcoded in the domain layer beyond
//! their documented defaults.

pub mod loader;

use serde::Deserialize;

use crate::domain::params::SessionParams;
use crate::domain::team::TeamDecisions;

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// Service identity and runtime behavior.
  pub service: ServiceConfig,
  /// Market parameters of the hosted session.
  pub simulation: SessionParams,
  /// Round and tick cadence.
  pub scheduler: SchedulerConfig,
  /// Persistence configuration.
  pub persistence: PersistenceConfig,
  /// Metrics and monitoring.
  pub metrics: MetricsConfig,
  /// Teams registered at startup.
  pub teams: Vec<TeamConfig>,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error), overridden by `RUST_LOG`.
  pub log_level: String,
  /// Fixed RNG seed for reproducible runs; unset uses OS entropy.
  pub seed: Option<u64>,
  /// Resume this session from its snapshot instead of starting fresh.
  pub resume_session: Option<String>,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      name: default_service_name(),
      log_level: default_log_level(),
      seed: None,
      resume_session: None,
    }
  }
}

/// Round scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
  /// Rounds to play before the service stops scheduling.
  pub rounds: u32,
  /// Wall-clock time between ticks (milliseconds).
  pub tick_interval_ms: u64,
  /// Pre-purchase window between rounds (milliseconds).
  pub pre_purchase_ms: u64,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      rounds: default_rounds(),
      tick_interval_ms: default_tick_interval(),
      pre_purchase_ms: default_pre_purchase(),
    }
  }
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
  /// Directory holding `results/` and `sessions/`.
  pub data_dir: String,
  /// Save a session snapshot every N ticks (0 = only at round end).
  pub snapshot_every_ticks: u32,
}

impl Default for PersistenceConfig {
  fn default() -> Self {
    Self {
      data_dir: default_data_dir(),
      snapshot_every_ticks: default_snapshot_every_ticks(),
    }
  }
}

/// Metrics and monitoring configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  pub enabled: bool,
  /// Metrics server bind address.
  pub bind_address: String,
  /// Health check endpoint port.
  pub health_port: u16,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

/// A team registered at startup with its opening decisions.
#[derive(Debug, Clone, Deserialize)]
pub struct TeamConfig {
  pub id: String,
  /// Display name; defaults to the id.
  pub name: Option<String>,
  #[serde(default = "default_retail_price")]
  pub retail_price: f64,
  #[serde(default)]
  pub fix_seats_requested: u32,
  pub fix_seat_bid_price: Option<f64>,
  #[serde(default)]
  pub pooling_allocation_pct: f64,
}

impl TeamConfig {
  pub fn display_name(&self) -> &str {
    self.name.as_deref().unwrap_or(&self.id)
  }

  pub fn decisions(&self) -> TeamDecisions {
    TeamDecisions {
      retail_price: self.retail_price,
      fix_seats_requested: self.fix_seats_requested,
      fix_seat_bid_price: self.fix_seat_bid_price,
      pooling_allocation_pct: self.pooling_allocation_pct,
    }
  }
}

// Default value functions for serde

fn default_service_name() -> String {
  "airline-market-sim".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_rounds() -> u32 {
  3
}

fn default_tick_interval() -> u64 {
  1000
}

fn default_pre_purchase() -> u64 {
  5000
}

fn default_data_dir() -> String {
  "data".to_string()
}

fn default_snapshot_every_ticks() -> u32 {
  5
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8080
}

fn default_retail_price() -> f64 {
  199.0
}
