//! Auction Runner - Fix-Seat Auction and Round Opening
//!
//! Runs the sealed-bid fix-seat auction for the current round and opens
//! the round's market state from its outcome:
//! 1. Size the auction cap from the reserve policy
//! 2. Collect one bid per team (round 0 bids are budget-capped)
//! 3. Allocate and write each award back onto its team
//! 4. Open the pooling market on the unallocated seats
//! 5. Open one tick ledger per team, fix-seat cost booked upfront

use std::collections::BTreeMap;

use tracing::{info, instrument};

use crate::domain::auction::{
  allocate, capacity_cap, AllocationSummary, AuctionRules, FixSeatBid,
};
use crate::domain::error::SimError;
use crate::domain::ledger::TickLedger;
use crate::domain::pooling::PoolingMarket;
use crate::domain::session::{Phase, Session};
use crate::domain::team::FixSeatAward;

/// Run the fix-seat auction and open the round.
///
/// Leaves the session in [`Phase::PrePurchase`]; flipping to simulation is
/// the phase machine's job. Running it twice simply re-opens the round
/// from the current decisions.
///
/// # Errors
/// [`SimError::WrongPhase`] outside pre-purchase, [`SimError::NoTeams`]
/// on an empty session.
#[instrument(skip(session), fields(session_id = %session.id, round = session.round))]
pub fn run_fix_seat_auction(session: &mut Session) -> Result<AllocationSummary, SimError> {
  session.ensure_phase(Phase::PrePurchase)?;
  if session.teams.is_empty() {
    return Err(SimError::NoTeams);
  }

  let params = session.params.shared();
  let seats = params.total_aircraft_seats;
  let reserve_ratio = params.reserve.ratio(session.teams.len());
  let rules = AuctionRules {
    capacity_cap: capacity_cap(seats, reserve_ratio),
    min_bid: params.fix_seat_min_bid,
    budget_cap: (session.round == 0).then_some(params.per_team_budget),
  };

  let bids: Vec<FixSeatBid> = session
    .teams
    .iter()
    .map(|t| FixSeatBid {
      team_id: t.id.clone(),
      requested: t.decisions.fix_seats_requested,
      bid_price: t.decisions.bid_price(&params),
    })
    .collect();

  let outcome = allocate(&bids, &rules);
  let summary = AllocationSummary::from_outcome(session.round, outcome, reserve_ratio, seats);
  let reserve = summary.pooling_reserve_capacity;

  let mut ledgers = BTreeMap::new();
  let mut offered: u32 = 0;
  for team in &mut session.teams {
    let Some(line) = summary.allocations.iter().find(|l| l.team_id == team.id) else {
      continue;
    };
    team.award = Some(FixSeatAward {
      requested_original: line.requested_original,
      allocated: line.allocated,
      clearing_price: line.clearing_price,
      disqualified_for_low_bid: line.disqualified_for_low_bid,
    });

    let entitlement = team.pool_entitlement(seats).min(reserve);
    offered = entitlement.saturating_add(offered);
    ledgers.insert(
      team.id.clone(),
      TickLedger::open(line.allocated, line.clearing_price, entitlement),
    );
  }

  session.ledgers = ledgers;
  session.pooling = PoolingMarket::open(reserve, offered, params.pool_start_price);
  session.returned_demand_pending = 0;
  session.remaining_days = params.departure_horizon_days;
  session.tick = 0;
  session.last_allocation = Some(summary.clone());

  info!(
    capacity_cap = summary.capacity_cap,
    requested = summary.total_requested,
    allocated = summary.total_allocated,
    pooling_reserve = reserve,
    min_qualifying_bid = ?summary.min_qualifying_bid,
    "Fix-seat auction complete"
  );

  Ok(summary)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::params::SessionParams;
  use crate::domain::team::TeamDecisions;

  fn decisions(fix: u32, bid: f64, pool_pct: f64) -> TeamDecisions {
    TeamDecisions {
      fix_seats_requested: fix,
      fix_seat_bid_price: Some(bid),
      pooling_allocation_pct: pool_pct,
      ..TeamDecisions::default()
    }
  }

  #[test]
  fn test_auction_opens_round() {
    let mut s = Session::new("s", SessionParams::default()).unwrap();
    s.add_team("a", "A", decisions(100, 60.0, 10.0)).unwrap();
    s.add_team("b", "B", decisions(100, 70.0, 5.0)).unwrap();

    let summary = run_fix_seat_auction(&mut s).unwrap();

    assert_eq!(summary.capacity_cap, 700);
    assert_eq!(summary.total_allocated, 200);
    assert_eq!(summary.pooling_reserve_capacity, 800);
    assert_eq!(summary.min_qualifying_bid, Some(60.0));

    assert_eq!(s.pooling.total_capacity, 800);
    assert_eq!(s.pooling.offered_capacity, 150);
    assert_eq!(s.pooling.price, 150.0);
    assert_eq!(s.remaining_days, 30);

    let a = &s.ledgers["a"];
    assert_eq!(a.fix_remaining, 100);
    assert_eq!(a.pool_remaining, 100);
    assert_eq!(a.cost, crate::domain::ledger::money(6000.0));
    assert_eq!(s.team("b").unwrap().clearing_price(), Some(70.0));
  }

  #[test]
  fn test_round_zero_budget_cap() {
    let params = SessionParams {
      per_team_budget: 3000.0,
      ..SessionParams::default()
    };
    let mut s = Session::new("s", params).unwrap();
    s.add_team("a", "A", decisions(200, 60.0, 0.0)).unwrap();

    let summary = run_fix_seat_auction(&mut s).unwrap();
    let line = &summary.allocations[0];
    assert_eq!(line.requested_original, 200);
    assert_eq!(line.requested_effective, 50);
    assert_eq!(line.allocated, 50);
  }

  #[test]
  fn test_no_budget_cap_after_round_zero() {
    let params = SessionParams {
      per_team_budget: 3000.0,
      ..SessionParams::default()
    };
    let mut s = Session::new("s", params).unwrap();
    s.add_team("a", "A", decisions(200, 60.0, 0.0)).unwrap();
    s.round = 1;

    let summary = run_fix_seat_auction(&mut s).unwrap();
    assert_eq!(summary.allocations[0].allocated, 200);
  }

  #[test]
  fn test_empty_session_rejected() {
    let mut s = Session::new("s", SessionParams::default()).unwrap();
    assert_eq!(run_fix_seat_auction(&mut s), Err(SimError::NoTeams));
  }
}
