//! Phase Machine - Round Lifecycle
//!
//! `PrePurchase → Simulation → PrePurchase`, once per round:
//! - `start_simulation`: auction, then open the pooling market and ledgers
//! - ticks: `tick_engine::advance_one_tick`, driven by an external scheduler
//! - `end_phase_now`: finalize with whatever ledger state exists; safe to
//!   call at any time and any number of times

use tracing::{info, instrument};

use crate::domain::auction::AllocationSummary;
use crate::domain::error::SimError;
use crate::domain::ledger::RoundResult;
use crate::domain::rng::MarketRng;
use crate::domain::session::{Phase, Session};
use crate::usecases::auction_runner::run_fix_seat_auction;
use crate::usecases::round_aggregator::finalize_round;
use crate::usecases::tick_engine::{advance_one_tick, TickReport};

/// Close bidding: run the auction and enter simulation.
///
/// # Errors
/// Propagates auction errors; the session stays in pre-purchase.
#[instrument(skip(session), fields(session_id = %session.id))]
pub fn start_simulation(session: &mut Session) -> Result<AllocationSummary, SimError> {
  let summary = run_fix_seat_auction(session)?;
  session.phase = Phase::Simulation;
  info!(
    round = session.round,
    horizon_days = session.remaining_days,
    "Simulation phase started"
  );
  Ok(summary)
}

/// Force the end of the current phase.
///
/// In simulation this finalizes the round from the ledgers as they stand,
/// mid-horizon included. In pre-purchase it returns the last committed
/// results unchanged.
#[instrument(skip(session, rng), fields(session_id = %session.id, phase = %session.phase))]
pub fn end_phase_now(session: &mut Session, rng: &mut dyn MarketRng) -> Vec<RoundResult> {
  if session.phase == Phase::Simulation && session.remaining_days > 0 {
    info!(
      remaining_days = session.remaining_days,
      tick = session.tick,
      "Ending round early"
    );
  }
  finalize_round(session, rng)
}

/// Everything one round produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
  pub allocation: AllocationSummary,
  pub ticks: Vec<TickReport>,
  pub results: Vec<RoundResult>,
}

/// Play a full round without pauses: auction, every tick, finalize.
///
/// # Errors
/// Propagates auction errors.
pub fn play_round(
  session: &mut Session,
  rng: &mut dyn MarketRng,
) -> Result<RoundOutcome, SimError> {
  let allocation = start_simulation(session)?;
  let mut ticks = Vec::new();
  loop {
    let report = advance_one_tick(session, rng)?;
    let done = report.phase_completed;
    ticks.push(report);
    if done {
      break;
    }
  }
  let results = finalize_round(session, rng);
  Ok(RoundOutcome {
    allocation,
    ticks,
    results,
  })
}
