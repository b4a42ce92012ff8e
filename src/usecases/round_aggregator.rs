//! Round Aggregator - Ledger Settlement
//!
//! Turns the per-team tick ledgers of the running round into
//! [`RoundResult`]s and commits them. Commit is all-or-nothing: every
//! result is computed first, then the session is updated in one pass.
//!
//! Teams without a ledger (joined after the auction) are settled by the
//! one-shot calculator in `domain::legacy`.

use std::collections::BTreeMap;

use tracing::{info, instrument, warn};

use crate::domain::ledger::{assign_market_shares, money, RoundResult};
use crate::domain::legacy;
use crate::domain::rng::MarketRng;
use crate::domain::session::{Phase, Session};

/// Finalize the running round.
///
/// Outside simulation there is nothing to settle: the last committed
/// batch is returned and the session is not touched, so repeated calls
/// never double-count.
#[instrument(skip(session, rng), fields(session_id = %session.id, round = session.round))]
pub fn finalize_round(
  session: &mut Session,
  rng: &mut dyn MarketRng,
) -> Vec<RoundResult> {
  if session.phase != Phase::Simulation {
    return session.last_results.clone();
  }

  let params = session.params.shared();
  let round = session.round;
  let budget = money(params.per_team_budget);

  let unledgered: Vec<&str> = session
    .teams
    .iter()
    .filter(|t| !session.ledgers.contains_key(&t.id))
    .map(|t| t.id.as_str())
    .collect();
  let mut one_shot = if unledgered.is_empty() {
    BTreeMap::new()
  } else {
    warn!(teams = ?unledgered, "No tick ledger, settling with one-shot calculator");
    legacy::settle_round(&session.teams, &params, rng)
  };

  // Compute everything before touching the session.
  let mut results: Vec<RoundResult> = session
    .teams
    .iter()
    .filter_map(|team| {
      let retail = team.decisions.retail_price;
      if let Some(ledger) = session.ledgers.get(&team.id) {
        let over_budget = round > 0 && ledger.profit() < -budget;
        Some(RoundResult::from_ledger(
          &team.id,
          round,
          ledger,
          retail,
          ledger.insolvent || over_budget,
        ))
      } else {
        let outcome = one_shot.remove(&team.id)?;
        let over_budget = round > 0 && outcome.profit() < -budget;
        Some(outcome.into_result(&team.id, round, retail, over_budget))
      }
    })
    .collect();
  assign_market_shares(&mut results);

  // Commit.
  for result in &results {
    if let Ok(i) = session
      .teams
      .binary_search_by(|t| t.id.as_str().cmp(&result.team_id))
    {
      let totals = &mut session.teams[i].totals;
      totals.profit += result.profit;
      totals.revenue += result.revenue;
      totals.rounds_played += 1;
    }
  }
  for team in &mut session.teams {
    team.award = None;
  }
  session.ledgers.clear();
  session.returned_demand_pending = 0;
  session.remaining_days = 0;
  session.round_history.extend(results.iter().cloned());
  session.last_results = results.clone();
  session.round += 1;
  session.phase = Phase::PrePurchase;

  info!(
    teams = results.len(),
    sold = results.iter().map(|r| r.sold).sum::<u32>(),
    insolvent = results.iter().filter(|r| r.insolvent).count(),
    next_round = session.round,
    "Round finalized"
  );

  results
}
