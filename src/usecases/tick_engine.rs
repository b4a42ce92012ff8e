//! Tick Engine - Pooling Market Simulation Step
//!
//! Advances a session in simulation by one tick:
//! 1. Alive set: teams with a ledger that are not insolvent
//! 2. Tick demand: `round(base × U(0.8, 1.2))` plus a share of returned demand
//! 3. Split across alive teams by softmax on price distance from their mean
//! 4. Pooling demand: what fix inventory cannot cover
//! 5. Pool price update from the supply/demand ratio
//! 6. Matching: fix seats first, then the shared pool, cheapest team first
//! 7. Insolvency check; sold seats of a failed team become returned demand
//! 8. Advance the simulated clock
//!
//! No I/O. Two random draws per tick: the demand factor, then the price
//! noise.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::domain::apportion::largest_remainder;
use crate::domain::error::SimError;
use crate::domain::params::MAX_DEMAND_FACTOR;
use crate::domain::pooling::{PriceDynamics, PricePoint};
use crate::domain::rng::MarketRng;
use crate::domain::session::{Phase, Session};
use crate::domain::team::TeamId;

const DEMAND_FACTOR_MIN: f64 = 0.8;
const PRICE_SENSITIVITY_SCALE: f64 = 50.0;
const PRICE_SENSITIVITY_MIN: f64 = 0.008;
const PRICE_SENSITIVITY_MAX: f64 = 0.08;

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
  pub tick: u32,
  /// Simulated days left after this tick.
  pub remaining_days: u32,
  /// Pool price set by this tick.
  pub price: f64,
  /// Total demand distributed, returned demand included.
  pub tick_demand: u32,
  pub returned_demand_injected: u32,
  pub pooling_demand: u32,
  pub served: u32,
  pub newly_insolvent: Vec<TeamId>,
  /// The horizon is exhausted; the round can be finalized.
  pub phase_completed: bool,
}

/// Softmax sensitivity `k = clamp(|elasticity| / 50, 0.008, 0.08)`.
pub fn price_sensitivity(price_elasticity: f64) -> f64 {
  (price_elasticity.abs() / PRICE_SENSITIVITY_SCALE)
    .clamp(PRICE_SENSITIVITY_MIN, PRICE_SENSITIVITY_MAX)
}

/// Split `total` across `(team, price)` offers by `exp(-k × (p − mean))`.
///
/// Returns per-team demand in input order, summing exactly to `total`.
pub fn split_demand(total: u32, offers: &[(&str, f64)], k: f64) -> Vec<u32> {
  if offers.is_empty() {
    return Vec::new();
  }
  let mean = offers.iter().map(|(_, p)| p).sum::<f64>() / offers.len() as f64;
  let weights: Vec<(&str, f64)> = offers
    .iter()
    .map(|&(id, p)| (id, (-k * (p - mean)).exp()))
    .collect();
  largest_remainder(total, &weights)
}

/// `ceil(pending / remaining_ticks)`, capped at `pending`.
fn returned_share(pending: u32, remaining_days: u32, days_per_tick: u32) -> u32 {
  let remaining_ticks = remaining_days.div_ceil(days_per_tick.max(1)).max(1);
  pending.div_ceil(remaining_ticks).min(pending)
}

/// Advance the session by one tick.
///
/// Calling it after the horizon is exhausted changes nothing and reports
/// `phase_completed`.
///
/// # Errors
/// [`SimError::WrongPhase`] outside simulation.
#[instrument(skip(session, rng), fields(session_id = %session.id, tick = session.tick + 1))]
pub fn advance_one_tick(
  session: &mut Session,
  rng: &mut dyn MarketRng,
) -> Result<TickReport, SimError> {
  session.ensure_phase(Phase::Simulation)?;
  if session.remaining_days == 0 {
    return Ok(TickReport {
      tick: session.tick,
      remaining_days: 0,
      price: session.pooling.price,
      tick_demand: 0,
      returned_demand_injected: 0,
      pooling_demand: 0,
      served: 0,
      newly_insolvent: Vec::new(),
      phase_completed: true,
    });
  }

  let params = session.params.shared();
  session.tick += 1;
  let tick = session.tick;
  let day_step = params.days_per_tick.min(session.remaining_days);

  // 1. Alive set in pool draw order: cheapest retail price first.
  let mut alive: Vec<(TeamId, f64)> = session
    .alive_team_ids()
    .into_iter()
    .filter_map(|id| {
      let price = session.team(&id)?.decisions.retail_price;
      Some((id, price))
    })
    .collect();
  alive.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

  // 2. Tick demand.
  let factor = rng.uniform(DEMAND_FACTOR_MIN, MAX_DEMAND_FACTOR);
  let base = (params.base_demand * factor).round() as u32;
  let injected = if alive.is_empty() {
    0
  } else {
    returned_share(
      session.returned_demand_pending,
      session.remaining_days,
      params.days_per_tick,
    )
  };
  session.returned_demand_pending -= injected;
  let tick_demand = base.saturating_add(injected);

  // 3. Split across the alive set.
  let offers: Vec<(&str, f64)> = alive.iter().map(|(id, p)| (id.as_str(), *p)).collect();
  let demands = split_demand(tick_demand, &offers, price_sensitivity(params.price_elasticity));

  // 4. Demand fix inventory cannot cover.
  let mut pooling_demand = 0;
  let mut pool_remaining = 0;
  for ((id, _), &d) in alive.iter().zip(&demands) {
    if let Some(ledger) = session.ledgers.get(id) {
      pooling_demand += d.saturating_sub(ledger.fix_remaining);
      pool_remaining = ledger.pool_remaining.saturating_add(pool_remaining);
    }
  }
  let supply = pool_remaining.min(session.pooling.available_capacity);

  // 5. Price update.
  let dynamics = PriceDynamics::from_params(&params);
  let price = dynamics.next_price(session.pooling.price, supply, pooling_demand, rng);
  if price <= params.pool_price_min || price >= params.pool_price_max {
    debug!(price, supply, pooling_demand, "Pool price at band limit");
  }
  let day = params
    .departure_horizon_days
    .saturating_sub(session.remaining_days)
    + day_step;
  session.pooling.record(PricePoint {
    tick,
    day,
    price,
    demand: tick_demand,
  });
  let unit_pool_cost = session.pooling.average_price();

  // 6. Matching, fix seats first, then the shared pool.
  let mut served = 0;
  for ((id, retail_price), &d) in alive.iter().zip(&demands) {
    let Some(ledger) = session.ledgers.get_mut(id) else {
      continue;
    };
    let unmet = ledger.serve_fixed(d);
    let from_fix = d - unmet;
    let granted = session.pooling.draw(unmet.min(ledger.pool_remaining));
    ledger.serve_pooled(granted, unit_pool_cost);
    ledger.book_sale(from_fix + granted, *retail_price);
    served += from_fix + granted;
  }

  // 7. Insolvency.
  let mut newly_insolvent = Vec::new();
  for (id, _) in &alive {
    let Some(ledger) = session.ledgers.get_mut(id) else {
      continue;
    };
    if ledger.exceeds_budget(params.per_team_budget) && ledger.mark_insolvent(tick) {
      session.returned_demand_pending =
        session.returned_demand_pending.saturating_add(ledger.sold);
      warn!(
        team = %id,
        tick,
        profit = %ledger.profit(),
        returned = ledger.sold,
        "Team insolvent, demand returned to market"
      );
      newly_insolvent.push(id.clone());
    }
  }
  session.pooling.offered_capacity = session
    .ledgers
    .values()
    .filter(|l| !l.insolvent)
    .fold(0u32, |acc, l| acc.saturating_add(l.pool_entitlement))
    .min(session.pooling.total_capacity);

  // 8. Clock.
  session.remaining_days -= day_step;
  let phase_completed = session.remaining_days == 0;

  debug!(
    tick_demand,
    injected,
    pooling_demand,
    served,
    price,
    remaining_days = session.remaining_days,
    "Tick complete"
  );

  Ok(TickReport {
    tick,
    remaining_days: session.remaining_days,
    price,
    tick_demand,
    returned_demand_injected: injected,
    pooling_demand,
    served,
    newly_insolvent,
    phase_completed,
  })
}
