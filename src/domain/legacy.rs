//! One-shot round calculator.
//!
//! Settles a whole round in a single step, without ticks: market shares,
//! dispersed by `market_concentration`, applied to one total-demand draw.
//! Only used for teams that have no tick ledger when a round is finalized.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::demand::{capacity_weighted_price, DemandModel};
use super::ledger::{average_price, money, RoundResult};
use super::params::SessionParams;
use super::rng::MarketRng;
use super::team::{Team, TeamId};

/// One-shot outcome for a single team.
#[derive(Debug, Clone, PartialEq)]
pub struct OneShotOutcome {
    pub demand: u32,
    pub sold: u32,
    pub capacity: u32,
    pub revenue: Decimal,
    pub cost: Decimal,
}

impl OneShotOutcome {
    pub fn profit(&self) -> Decimal {
        self.revenue - self.cost
    }

    pub fn into_result(
        self,
        team_id: &str,
        round_number: u32,
        retail_price: f64,
        insolvent: bool,
    ) -> RoundResult {
        RoundResult {
            team_id: team_id.to_string(),
            round_number,
            sold: self.sold,
            revenue: self.revenue,
            cost: self.cost,
            profit: self.profit(),
            unsold: self.demand.saturating_sub(self.sold),
            market_share: 0.0,
            demand: self.demand,
            avg_price: average_price(self.revenue, self.sold, retail_price),
            capacity: self.capacity,
            insolvent,
        }
    }
}

/// `share' = c × share + (1 − c) / n`.
pub fn disperse(share: f64, concentration: f64, team_count: usize) -> f64 {
    if team_count == 0 {
        return 0.0;
    }
    concentration * share + (1.0 - concentration) / team_count as f64
}

/// Settle the round for every team at once.
///
/// Draw order: share jitter per team, one total-demand draw, then one
/// cost shock per team, all in team order.
pub fn settle_round(
    teams: &[Team],
    params: &SessionParams,
    rng: &mut dyn MarketRng,
) -> BTreeMap<TeamId, OneShotOutcome> {
    let model = DemandModel::from_params(params);
    let seats = params.total_aircraft_seats;
    let shares = model.market_shares(teams, rng);
    let weighted = capacity_weighted_price(teams, seats, params.reference_price);
    let total_demand = f64::from(model.total_demand(weighted, rng));

    teams
        .iter()
        .map(|team| {
            let share = shares.get(&team.id).copied().unwrap_or(0.0);
            let share = disperse(share, params.market_concentration, teams.len());
            let demand = (total_demand * share).round() as u32;
            let capacity = team.capacity(seats);
            let sold = demand.min(capacity);

            let fix_allocated = team.fix_seats_allocated();
            let fix_cost = f64::from(fix_allocated) * team.clearing_price().unwrap_or(0.0);
            let shock = (1.0 + rng.normal(0.0, params.cost_volatility)).max(0.0);
            let pooled_cost =
                f64::from(sold.saturating_sub(fix_allocated)) * params.pooling_cost * shock;

            let outcome = OneShotOutcome {
                demand,
                sold,
                capacity,
                revenue: money(f64::from(sold) * team.decisions.retail_price),
                cost: money(fix_cost + pooled_cost),
            };
            (team.id.clone(), outcome)
        })
        .collect()
}
