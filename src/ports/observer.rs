//! Observer Port - Market Event Sink
//!
//! Receives notifications as a session moves through its round. Used
//! for metrics and any other read-only view of the market; observers
//! never mutate the session.

use crate::domain::auction::AllocationSummary;
use crate::domain::ledger::RoundResult;
use crate::domain::pooling::PoolingMarket;
use crate::usecases::tick_engine::TickReport;

/// Trait for market event consumers.
///
/// Calls are synchronous and happen while the session is locked, so
/// implementations must be cheap and must not block.
pub trait MarketObserver: Send + Sync + 'static {
  /// The fix-seat auction for a round has run.
  fn on_auction(&self, session_id: &str, summary: &AllocationSummary);

  /// A tick completed; `market` is the pooling state after the tick.
  fn on_tick(&self, session_id: &str, report: &TickReport, market: &PoolingMarket);

  /// A round was finalized.
  fn on_round(&self, session_id: &str, results: &[RoundResult]);
}

/// Observer that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl MarketObserver for NoopObserver {
  fn on_auction(&self, _session_id: &str, _summary: &AllocationSummary) {}

  fn on_tick(&self, _session_id: &str, _report: &TickReport, _market: &PoolingMarket) {}

  fn on_round(&self, _session_id: &str, _results: &[RoundResult]) {}
}
