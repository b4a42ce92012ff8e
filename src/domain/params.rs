//! Session parameters and the versioned patch operation.
//!
//! A session holds an immutable [`VersionedParams`] snapshot. Changes go
//! through [`VersionedParams::apply`], which merges a [`ParamsPatch`],
//! sanitizes, validates and returns a *new* snapshot with a bumped
//! version. The previous snapshot is left untouched.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;

/// Upper end of the per-tick demand factor `U(0.8, 1.2)`.
pub const MAX_DEMAND_FACTOR: f64 = 1.2;

/// How much of the aircraft is withheld from the fix-seat auction to seed
/// the pooling market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReservePolicy {
    /// Constant share of total seats.
    Fixed { ratio: f64 },
    /// `per_team × team_count`, clamped to `[min, max]`.
    ScaledByTeams { per_team: f64, min: f64, max: f64 },
}

impl Default for ReservePolicy {
    fn default() -> Self {
        Self::Fixed { ratio: 0.3 }
    }
}

impl ReservePolicy {
    /// Reserve ratio for a session with `team_count` teams.
    pub fn ratio(&self, team_count: usize) -> f64 {
        match *self {
            Self::Fixed { ratio } => ratio,
            Self::ScaledByTeams { per_team, min, max } => {
                (per_team * team_count as f64).clamp(min, max)
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Fixed { ratio } => unit_interval("reserve.ratio", ratio),
            Self::ScaledByTeams { per_team, min, max } => {
                non_negative("reserve.per_team", per_team)?;
                unit_interval("reserve.min", min)?;
                unit_interval("reserve.max", max)?;
                if min > max {
                    return Err(ConfigError::OutOfRange {
                        field: "reserve.min",
                        value: min,
                        min: 0.0,
                        max,
                    });
                }
                Ok(())
            }
        }
    }
}

/// Numeric parameter set of one game session.
///
/// Every field has a documented default, so a partial TOML table or an
/// empty patch still yields a playable session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionParams {
    /// Baseline passenger demand (per round for the one-shot model, per
    /// tick for the pooling simulator).
    pub base_demand: f64,
    /// Standard deviation of the multiplicative demand shock.
    pub demand_volatility: f64,
    /// Team-level price elasticity (negative: dearer sells less).
    pub price_elasticity: f64,
    /// Market-level elasticity; `None` means `price_elasticity × 0.6`.
    pub market_price_elasticity: Option<f64>,
    /// Price at which the price index equals 1.
    pub reference_price: f64,
    /// Share dispersion used by the one-shot calculator, in `[0, 1]`.
    pub market_concentration: f64,
    /// Seats on the aircraft, shared by fix-seat and pooling inventory.
    pub total_aircraft_seats: u32,
    /// Bid price assumed for teams that submit no explicit bid.
    pub fix_seat_price: f64,
    /// Bids strictly below this are disqualified.
    pub fix_seat_min_bid: f64,
    /// Reference unit cost of pooled capacity.
    pub pooling_cost: f64,
    /// Standard deviation of the pooled-cost shock in the one-shot model.
    pub cost_volatility: f64,
    /// Per-team budget: fix-seat spend cap in round 0 and insolvency limit.
    pub per_team_budget: f64,
    pub reserve: ReservePolicy,
    /// Simulated days consumed by one tick.
    pub days_per_tick: u32,
    /// Simulated days from round open to departure.
    pub departure_horizon_days: u32,
    pub pool_price_min: f64,
    pub pool_price_max: f64,
    pub pool_start_price: f64,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            base_demand: 100.0,
            demand_volatility: 0.1,
            price_elasticity: -1.5,
            market_price_elasticity: None,
            reference_price: 199.0,
            market_concentration: 0.7,
            total_aircraft_seats: 1000,
            fix_seat_price: 60.0,
            fix_seat_min_bid: 50.0,
            pooling_cost: 90.0,
            cost_volatility: 0.05,
            per_team_budget: 20_000.0,
            reserve: ReservePolicy::default(),
            days_per_tick: 1,
            departure_horizon_days: 30,
            pool_price_min: 80.0,
            pool_price_max: 300.0,
            pool_start_price: 150.0,
        }
    }
}

impl SessionParams {
    /// Market elasticity with the `price_elasticity × 0.6` fallback applied.
    pub fn effective_market_price_elasticity(&self) -> f64 {
        self.market_price_elasticity
            .unwrap_or(self.price_elasticity * 0.6)
    }

    /// Ticks needed to run down the departure horizon.
    pub fn horizon_ticks(&self) -> u32 {
        self.departure_horizon_days
            .div_ceil(self.days_per_tick.max(1))
            .max(1)
    }

    /// Replace non-finite values with their defaults.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let d = Self::default();
        let fix = |v: &mut f64, def: f64| {
            if !v.is_finite() {
                *v = def;
            }
        };
        fix(&mut self.base_demand, d.base_demand);
        fix(&mut self.demand_volatility, d.demand_volatility);
        fix(&mut self.price_elasticity, d.price_elasticity);
        fix(&mut self.reference_price, d.reference_price);
        fix(&mut self.market_concentration, d.market_concentration);
        fix(&mut self.fix_seat_price, d.fix_seat_price);
        fix(&mut self.fix_seat_min_bid, d.fix_seat_min_bid);
        fix(&mut self.pooling_cost, d.pooling_cost);
        fix(&mut self.cost_volatility, d.cost_volatility);
        fix(&mut self.per_team_budget, d.per_team_budget);
        fix(&mut self.pool_price_min, d.pool_price_min);
        fix(&mut self.pool_price_max, d.pool_price_max);
        fix(&mut self.pool_start_price, d.pool_start_price);
        if self.market_price_elasticity.is_some_and(|e| !e.is_finite()) {
            self.market_price_elasticity = None;
        }
        self
    }

    /// Reject values the simulation cannot run with.
    ///
    /// # Errors
    /// Returns the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_negative("base_demand", self.base_demand)?;
        non_negative("demand_volatility", self.demand_volatility)?;
        positive("reference_price", self.reference_price)?;
        if !(0.0..=1.0).contains(&self.market_concentration) {
            return Err(ConfigError::OutOfRange {
                field: "market_concentration",
                value: self.market_concentration,
                min: 0.0,
                max: 1.0,
            });
        }
        positive("total_aircraft_seats", f64::from(self.total_aircraft_seats))?;
        non_negative("fix_seat_price", self.fix_seat_price)?;
        non_negative("fix_seat_min_bid", self.fix_seat_min_bid)?;
        non_negative("pooling_cost", self.pooling_cost)?;
        non_negative("cost_volatility", self.cost_volatility)?;
        non_negative("per_team_budget", self.per_team_budget)?;
        self.reserve.validate()?;
        positive("days_per_tick", f64::from(self.days_per_tick))?;
        positive("departure_horizon_days", f64::from(self.departure_horizon_days))?;
        let max_base_demand =
            f64::from(u32::MAX) / (MAX_DEMAND_FACTOR * f64::from(self.horizon_ticks()));
        if self.base_demand > max_base_demand {
            return Err(ConfigError::OutOfRange {
                field: "base_demand",
                value: self.base_demand,
                min: 0.0,
                max: max_base_demand.floor(),
            });
        }
        positive("pool_price_min", self.pool_price_min)?;
        if self.pool_price_min > self.pool_price_max {
            return Err(ConfigError::InvertedPriceBand {
                min: self.pool_price_min,
                max: self.pool_price_max,
            });
        }
        if !(self.pool_price_min..=self.pool_price_max).contains(&self.pool_start_price) {
            return Err(ConfigError::OutOfRange {
                field: "pool_start_price",
                value: self.pool_start_price,
                min: self.pool_price_min,
                max: self.pool_price_max,
            });
        }
        Ok(())
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value < 0.0 {
        return Err(ConfigError::Negative { field, value });
    }
    Ok(())
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value <= 0.0 {
        return Err(ConfigError::NonPositive { field, value });
    }
    Ok(())
}

fn unit_interval(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..1.0).contains(&value) {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min: 0.0,
            max: 1.0,
        });
    }
    Ok(())
}

/// Partial update of [`SessionParams`]; `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamsPatch {
    pub base_demand: Option<f64>,
    pub demand_volatility: Option<f64>,
    pub price_elasticity: Option<f64>,
    pub market_price_elasticity: Option<f64>,
    pub reference_price: Option<f64>,
    pub market_concentration: Option<f64>,
    pub total_aircraft_seats: Option<u32>,
    pub fix_seat_price: Option<f64>,
    pub fix_seat_min_bid: Option<f64>,
    pub pooling_cost: Option<f64>,
    pub cost_volatility: Option<f64>,
    pub per_team_budget: Option<f64>,
    pub reserve: Option<ReservePolicy>,
    pub days_per_tick: Option<u32>,
    pub departure_horizon_days: Option<u32>,
    pub pool_price_min: Option<f64>,
    pub pool_price_max: Option<f64>,
    pub pool_start_price: Option<f64>,
}

impl ParamsPatch {
    fn merge_into(&self, p: &mut SessionParams) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = self.$field { p.$field = v; })*
            };
        }
        merge!(
            base_demand,
            demand_volatility,
            price_elasticity,
            reference_price,
            market_concentration,
            total_aircraft_seats,
            fix_seat_price,
            fix_seat_min_bid,
            pooling_cost,
            cost_volatility,
            per_team_budget,
            reserve,
            days_per_tick,
            departure_horizon_days,
            pool_price_min,
            pool_price_max,
            pool_start_price,
        );
        if let Some(e) = self.market_price_elasticity {
            p.market_price_elasticity = Some(e);
        }
    }
}

/// Immutable, versioned parameter snapshot.
#[derive(Debug, Clone)]
pub struct VersionedParams {
    version: u64,
    params: Arc<SessionParams>,
}

impl VersionedParams {
    /// Initial snapshot (version 1).
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the sanitized parameters are invalid.
    pub fn new(params: SessionParams) -> Result<Self, ConfigError> {
        let params = params.sanitized();
        params.validate()?;
        Ok(Self {
            version: 1,
            params: Arc::new(params),
        })
    }

    /// Merge `patch` and return the next snapshot.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the merged parameters are invalid; `self`
    /// is unchanged either way.
    pub fn apply(&self, patch: &ParamsPatch) -> Result<Self, ConfigError> {
        let mut next = (*self.params).clone();
        patch.merge_into(&mut next);
        let next = next.sanitized();
        next.validate()?;
        Ok(Self {
            version: self.version + 1,
            params: Arc::new(next),
        })
    }

    /// Rebuild a snapshot persisted at `version`.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the stored parameters are invalid.
    pub fn restore(version: u64, params: SessionParams) -> Result<Self, ConfigError> {
        let params = params.sanitized();
        params.validate()?;
        Ok(Self {
            version: version.max(1),
            params: Arc::new(params),
        })
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    /// Shared handle to the snapshot.
    pub fn shared(&self) -> Arc<SessionParams> {
        Arc::clone(&self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SessionParams::default().validate().is_ok());
    }

    #[test]
    fn test_market_elasticity_fallback() {
        let p = SessionParams::default();
        assert!((p.effective_market_price_elasticity() - (-0.9)).abs() < 1e-12);

        let p = SessionParams {
            market_price_elasticity: Some(-0.4),
            ..SessionParams::default()
        };
        assert_eq!(p.effective_market_price_elasticity(), -0.4);
    }

    #[test]
    fn test_non_finite_falls_back_to_default() {
        let p = SessionParams {
            price_elasticity: f64::NAN,
            pooling_cost: f64::INFINITY,
            market_price_elasticity: Some(f64::NAN),
            ..SessionParams::default()
        }
        .sanitized();
        assert_eq!(p.price_elasticity, -1.5);
        assert_eq!(p.pooling_cost, 90.0);
        assert_eq!(p.market_price_elasticity, None);
    }

    #[test]
    fn test_negative_capacity_price_rejected() {
        let p = SessionParams {
            pooling_cost: -1.0,
            ..SessionParams::default()
        };
        assert_eq!(
            p.validate(),
            Err(ConfigError::Negative {
                field: "pooling_cost",
                value: -1.0
            })
        );

        let p = SessionParams {
            total_aircraft_seats: 0,
            ..SessionParams::default()
        };
        assert!(matches!(p.validate(), Err(ConfigError::NonPositive { .. })));
    }

    #[test]
    fn test_base_demand_bounded_by_horizon() {
        let p = SessionParams {
            base_demand: 3.0e9,
            ..SessionParams::default()
        };
        assert!(matches!(
            p.validate(),
            Err(ConfigError::OutOfRange {
                field: "base_demand",
                ..
            })
        ));

        // 30 ticks at the top demand factor must fit in a u32 ledger.
        let limit = f64::from(u32::MAX) / (MAX_DEMAND_FACTOR * 30.0);
        let p = SessionParams {
            base_demand: limit.floor(),
            ..SessionParams::default()
        };
        assert!(p.validate().is_ok());

        // Fewer ticks allow a larger base.
        let p = SessionParams {
            base_demand: limit * 2.0,
            days_per_tick: 3,
            ..SessionParams::default()
        };
        assert_eq!(p.horizon_ticks(), 10);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_inverted_band_rejected() {
        let p = SessionParams {
            pool_price_min: 300.0,
            pool_price_max: 80.0,
            ..SessionParams::default()
        };
        assert!(matches!(
            p.validate(),
            Err(ConfigError::InvertedPriceBand { .. })
        ));
    }

    #[test]
    fn test_reserve_policy_scaled() {
        let policy = ReservePolicy::ScaledByTeams {
            per_team: 0.1,
            min: 0.2,
            max: 0.5,
        };
        assert!((policy.ratio(1) - 0.2).abs() < 1e-12);
        assert!((policy.ratio(3) - 0.3).abs() < 1e-12);
        assert!((policy.ratio(9) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_apply_patch_returns_new_snapshot() {
        let v1 = VersionedParams::new(SessionParams::default()).unwrap();
        let patch = ParamsPatch {
            base_demand: Some(250.0),
            ..ParamsPatch::default()
        };
        let v2 = v1.apply(&patch).unwrap();

        assert_eq!(v1.version(), 1);
        assert_eq!(v1.params().base_demand, 100.0);
        assert_eq!(v2.version(), 2);
        assert_eq!(v2.params().base_demand, 250.0);
    }

    #[test]
    fn test_invalid_patch_leaves_snapshot_untouched() {
        let v1 = VersionedParams::new(SessionParams::default()).unwrap();
        let patch = ParamsPatch {
            fix_seat_min_bid: Some(-5.0),
            ..ParamsPatch::default()
        };
        assert!(v1.apply(&patch).is_err());
        assert_eq!(v1.version(), 1);
        assert_eq!(v1.params().fix_seat_min_bid, 50.0);
    }

    #[test]
    fn test_reserve_policy_toml_shape() {
        let p: SessionParams = toml::from_str(
            r#"
            base_demand = 80.0
            [reserve]
            kind = "scaled_by_teams"
            per_team = 0.05
            min = 0.1
            max = 0.4
            "#,
        )
        .unwrap();
        assert_eq!(p.base_demand, 80.0);
        assert_eq!(p.reference_price, 199.0);
        assert!(matches!(p.reserve, ReservePolicy::ScaledByTeams { .. }));
    }
}
