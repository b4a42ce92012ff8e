//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    teams = config.teams.len(),
    rounds = config.scheduler.rounds,
    seats = config.simulation.total_aircraft_seats,
    seeded = config.service.seed.is_some(),
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration from TOML text.
///
/// # Errors
/// TOML syntax errors or violated validation rules.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let mut config: AppConfig =
    toml::from_str(content).with_context(|| "Failed to parse config.toml")?;
  config.simulation = config.simulation.sanitized();
  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Valid session parameters (non-negative prices, ordered price band)
/// - Positive scheduler cadence
/// - Unique, valid team definitions
fn validate_config(config: &AppConfig) -> Result<()> {
  config
    .simulation
    .validate()
    .context("Invalid [simulation] parameters")?;

  // Scheduler validation
  anyhow::ensure!(
    config.scheduler.rounds > 0,
    "scheduler.rounds must be positive"
  );
  anyhow::ensure!(
    config.scheduler.tick_interval_ms > 0,
    "scheduler.tick_interval_ms must be positive"
  );

  // Persistence validation
  anyhow::ensure!(
    !config.persistence.data_dir.is_empty(),
    "persistence.data_dir must not be empty"
  );

  // Team validation
  anyhow::ensure!(
    !config.teams.is_empty() || config.service.resume_session.is_some(),
    "At least one team must be configured"
  );
  let mut seen = HashSet::new();
  for (i, team) in config.teams.iter().enumerate() {
    anyhow::ensure!(!team.id.is_empty(), "Team {} has an empty id", i);
    anyhow::ensure!(
      seen.insert(team.id.as_str()),
      "Team id {} is configured twice",
      team.id
    );
    team
      .decisions()
      .validate_for(&config.simulation)
      .with_context(|| format!("Team {} ({}) has invalid decisions", i, team.id))?;
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::params::ReservePolicy;

  const MINIMAL: &str = r#"
    [[teams]]
    id = "alpha"
    fix_seats_requested = 120
    fix_seat_bid_price = 65.0
    pooling_allocation_pct = 10.0

    [[teams]]
    id = "bravo"
    name = "Bravo Airways"
    retail_price = 179.0
  "#;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = parse_config(MINIMAL).unwrap();
    assert_eq!(config.teams.len(), 2);
    assert_eq!(config.teams[0].display_name(), "alpha");
    assert_eq!(config.teams[1].display_name(), "Bravo Airways");
    assert_eq!(config.teams[0].decisions().fix_seat_bid_price, Some(65.0));
    assert_eq!(config.simulation.price_elasticity, -1.5);
    assert_eq!(config.scheduler.rounds, 3);
    assert_eq!(config.metrics.health_port, 8080);
    assert_eq!(config.simulation.reserve, ReservePolicy::Fixed { ratio: 0.3 });
  }

  #[test]
  fn test_simulation_section_overrides() {
    let toml = format!(
      "{MINIMAL}\n[simulation]\nbase_demand = 250.0\npool_price_max = 400.0\n"
    );
    let config = parse_config(&toml).unwrap();
    assert_eq!(config.simulation.base_demand, 250.0);
    assert_eq!(config.simulation.pool_price_max, 400.0);
  }

  #[test]
  fn test_rejects_invalid_simulation() {
    let toml = format!("{MINIMAL}\n[simulation]\npooling_cost = -5.0\n");
    assert!(parse_config(&toml).is_err());
  }

  #[test]
  fn test_rejects_fix_request_larger_than_aircraft() {
    let toml = r#"
      [simulation]
      total_aircraft_seats = 500

      [[teams]]
      id = "greedy"
      fix_seats_requested = 3000000000
    "#;
    let err = parse_config(toml).unwrap_err();
    assert!(format!("{err:#}").contains("fix_seats_requested"));
  }

  #[test]
  fn test_rejects_duplicate_team() {
    let toml = r#"
      [[teams]]
      id = "a"
      [[teams]]
      id = "a"
    "#;
    assert!(parse_config(toml).is_err());
  }

  #[test]
  fn test_rejects_no_teams() {
    assert!(parse_config("").is_err());
  }
}
