//! Demand model: total market demand and per-team market share.
//!
//! Pure functions of the team set and session parameters; the only
//! hidden input is the injected [`MarketRng`].
//!
//! - Total demand: `base × (1 + N(0, vol)) × U(0.9, 1.1)`, floored at 10,
//!   then scaled by `priceIndex ^ marketElasticity`.
//! - Competitiveness: `clamp((p / ref)^e, 0.05, 3) × clamp(cap / 50, 0.1, 2)`.
//! - Share: competitiveness share × `U(0.85, 1.15)`, clamped to
//!   `[0.01, 0.99]`, renormalized to sum to one.

use std::collections::BTreeMap;

use super::params::SessionParams;
use super::rng::MarketRng;
use super::team::{Team, TeamId};

pub const MIN_TOTAL_DEMAND: u32 = 10;
pub const SHARE_MIN: f64 = 0.01;
pub const SHARE_MAX: f64 = 0.99;

const PRICE_FACTOR_MIN: f64 = 0.05;
const PRICE_FACTOR_MAX: f64 = 3.0;
const CAPACITY_SCALE: f64 = 50.0;
const CAPACITY_FACTOR_MIN: f64 = 0.1;
const CAPACITY_FACTOR_MAX: f64 = 2.0;
const PRICE_INDEX_MIN: f64 = 0.5;
const PRICE_INDEX_MAX: f64 = 1.5;

/// Parameter view used by the demand computations.
#[derive(Debug, Clone, Copy)]
pub struct DemandModel {
    base_demand: f64,
    demand_volatility: f64,
    price_elasticity: f64,
    market_price_elasticity: f64,
    reference_price: f64,
    total_seats: u32,
}

impl DemandModel {
    pub fn from_params(params: &SessionParams) -> Self {
        Self {
            base_demand: params.base_demand,
            demand_volatility: params.demand_volatility,
            price_elasticity: params.price_elasticity,
            market_price_elasticity: params.effective_market_price_elasticity(),
            reference_price: params.reference_price,
            total_seats: params.total_aircraft_seats,
        }
    }

    /// Price × capacity attractiveness of one offer.
    pub fn competitiveness(&self, price: f64, capacity: u32) -> f64 {
        let relative = (price / self.reference_price).max(f64::MIN_POSITIVE);
        let price_factor = relative
            .powf(self.price_elasticity)
            .clamp(PRICE_FACTOR_MIN, PRICE_FACTOR_MAX);
        let capacity_factor = (f64::from(capacity) / CAPACITY_SCALE)
            .clamp(CAPACITY_FACTOR_MIN, CAPACITY_FACTOR_MAX);
        price_factor * capacity_factor
    }

    /// Market shares keyed by team id.
    ///
    /// One jitter draw per team, in slice order. A single team receives the
    /// whole market.
    pub fn market_shares(&self, teams: &[Team], rng: &mut dyn MarketRng) -> BTreeMap<TeamId, f64> {
        if teams.is_empty() {
            return BTreeMap::new();
        }

        let scores: Vec<f64> = teams
            .iter()
            .map(|t| self.competitiveness(t.decisions.retail_price, t.capacity(self.total_seats)))
            .collect();
        let total: f64 = scores.iter().sum();

        let mut shares: Vec<f64> = scores
            .iter()
            .map(|s| {
                let raw = if total > 0.0 {
                    s / total
                } else {
                    1.0 / teams.len() as f64
                };
                (raw * rng.uniform(0.85, 1.15)).clamp(SHARE_MIN, SHARE_MAX)
            })
            .collect();
        bounded_normalize(&mut shares, SHARE_MIN, SHARE_MAX);

        teams
            .iter()
            .zip(shares)
            .map(|(t, s)| (t.id.clone(), s))
            .collect()
    }

    /// Realized total demand for a round, never below [`MIN_TOTAL_DEMAND`].
    pub fn total_demand(&self, weighted_price: f64, rng: &mut dyn MarketRng) -> u32 {
        let shock = rng.normal(0.0, self.demand_volatility);
        let seasonal = rng.uniform(0.9, 1.1);
        let base = (self.base_demand * (1.0 + shock) * seasonal).max(f64::from(MIN_TOTAL_DEMAND));

        let price_index =
            (weighted_price / self.reference_price).clamp(PRICE_INDEX_MIN, PRICE_INDEX_MAX);
        let demand = base * price_index.powf(self.market_price_elasticity);

        (demand.round() as u32).max(MIN_TOTAL_DEMAND)
    }
}

/// Capacity-weighted average retail price. Falls back to the plain mean
/// when nobody has capacity, and to `fallback` with no teams.
pub fn capacity_weighted_price(teams: &[Team], total_seats: u32, fallback: f64) -> f64 {
    if teams.is_empty() {
        return fallback;
    }
    let (weighted, capacity) = teams.iter().fold((0.0, 0.0), |(w, c), t| {
        let cap = f64::from(t.capacity(total_seats));
        (w + t.decisions.retail_price * cap, c + cap)
    });
    if capacity > 0.0 {
        weighted / capacity
    } else {
        teams.iter().map(|t| t.decisions.retail_price).sum::<f64>() / teams.len() as f64
    }
}

/// `computeMarketShares` entry point.
pub fn compute_market_shares(
    teams: &[Team],
    params: &SessionParams,
    rng: &mut dyn MarketRng,
) -> BTreeMap<TeamId, f64> {
    DemandModel::from_params(params).market_shares(teams, rng)
}

/// Normalize `values` to sum to one while keeping each in `[lo, hi]`.
///
/// Values that land outside the band are pinned to the bound and the
/// remaining mass is spread over the free values in proportion to their
/// weight. Lows are pinned before highs. If the band cannot hold a unit sum
/// for this many values, a plain normalization is returned.
pub(crate) fn bounded_normalize(values: &mut [f64], lo: f64, hi: f64) {
    let n = values.len();
    match n {
        0 => return,
        1 => {
            values[0] = 1.0;
            return;
        }
        _ => {}
    }

    let sum: f64 = values.iter().sum();
    if sum > 0.0 {
        values.iter_mut().for_each(|v| *v /= sum);
    } else {
        values.iter_mut().for_each(|v| *v = 1.0 / n as f64);
    }
    if n as f64 * lo > 1.0 || (n as f64) * hi < 1.0 {
        return;
    }

    let mut pinned = vec![false; n];
    for _ in 0..n {
        let pinned_mass: f64 = (0..n).filter(|&i| pinned[i]).map(|i| values[i]).sum();
        let free_weight: f64 = (0..n).filter(|&i| !pinned[i]).map(|i| values[i]).sum();
        if free_weight <= 0.0 {
            break;
        }
        let scale = (1.0 - pinned_mass) / free_weight;
        for i in (0..n).filter(|&i| !pinned[i]) {
            values[i] *= scale;
        }

        let lows: Vec<usize> = (0..n).filter(|&i| !pinned[i] && values[i] < lo).collect();
        let targets = if lows.is_empty() {
            (0..n).filter(|&i| !pinned[i] && values[i] > hi).collect()
        } else {
            lows
        };
        if targets.is_empty() {
            break;
        }
        for i in targets {
            values[i] = values[i].clamp(lo, hi);
            pinned[i] = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rng::seeded_rng;
    use crate::domain::team::TeamDecisions;

    fn team(id: &str, price: f64, fix: u32) -> Team {
        Team::new(
            id,
            id,
            TeamDecisions {
                retail_price: price,
                fix_seats_requested: fix,
                ..TeamDecisions::default()
            },
        )
    }

    #[test]
    fn test_shares_sum_to_one() {
        let teams = vec![team("a", 150.0, 100), team("b", 199.0, 60), team("c", 260.0, 20)];
        let mut rng = seeded_rng(11);
        let shares = compute_market_shares(&teams, &SessionParams::default(), &mut rng);
        let sum: f64 = shares.values().sum();
        assert!((sum - 1.0).abs() < 1e-9, "sum = {sum}");
        assert!(shares.values().all(|s| (SHARE_MIN..=SHARE_MAX).contains(s)));
    }

    #[test]
    fn test_cheaper_team_wins_more_on_average() {
        let teams = vec![team("cheap", 150.0, 100), team("dear", 260.0, 100)];
        let params = SessionParams::default();
        let mut rng = seeded_rng(5);
        let mut cheap = 0.0;
        for _ in 0..200 {
            cheap += compute_market_shares(&teams, &params, &mut rng)["cheap"];
        }
        assert!(cheap / 200.0 > 0.6);
    }

    #[test]
    fn test_single_team_takes_market() {
        let teams = vec![team("solo", 199.0, 10)];
        let mut rng = seeded_rng(2);
        let shares = compute_market_shares(&teams, &SessionParams::default(), &mut rng);
        assert_eq!(shares["solo"], 1.0);
    }

    #[test]
    fn test_competitiveness_clamps() {
        let model = DemandModel::from_params(&SessionParams::default());
        // Extreme price and zero capacity hit both lower clamps.
        let c = model.competitiveness(10_000.0, 0);
        assert!((c - PRICE_FACTOR_MIN * CAPACITY_FACTOR_MIN).abs() < 1e-12);
        // Very cheap and huge capacity hit both upper clamps.
        let c = model.competitiveness(1.0, 10_000);
        assert!((c - PRICE_FACTOR_MAX * CAPACITY_FACTOR_MAX).abs() < 1e-12);
    }

    #[test]
    fn test_total_demand_floor() {
        let params = SessionParams {
            base_demand: 0.0,
            ..SessionParams::default()
        };
        let model = DemandModel::from_params(&params);
        let mut rng = seeded_rng(9);
        for _ in 0..50 {
            assert!(model.total_demand(299.0, &mut rng) >= MIN_TOTAL_DEMAND);
        }
    }

    #[test]
    fn test_total_demand_falls_with_price() {
        let params = SessionParams {
            demand_volatility: 0.0,
            base_demand: 1000.0,
            ..SessionParams::default()
        };
        let model = DemandModel::from_params(&params);
        let low = model.total_demand(120.0, &mut seeded_rng(4));
        let high = model.total_demand(280.0, &mut seeded_rng(4));
        assert!(low > high, "low={low} high={high}");
    }

    #[test]
    fn test_bounded_normalize_pins_lows() {
        let mut v = vec![0.99, 0.01, 0.01];
        bounded_normalize(&mut v, SHARE_MIN, SHARE_MAX);
        assert!((v.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!((v[0] - 0.98).abs() < 1e-12);
        assert_eq!(v[1], 0.01);
    }

    #[test]
    fn test_capacity_weighted_price() {
        let teams = vec![team("a", 100.0, 100), team("b", 200.0, 300)];
        let p = capacity_weighted_price(&teams, 1000, 199.0);
        assert!((p - 175.0).abs() < 1e-9);
        assert_eq!(capacity_weighted_price(&[], 1000, 199.0), 199.0);
    }
}
