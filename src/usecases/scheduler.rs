//! Round Scheduler - External Tick Driver
//!
//! Owns all timing for one session. The core never sleeps; this loop
//! decides when each tick happens and when a round is cut short.
//!
//! Per round:
//! 1. Pre-purchase window (teams edit decisions through the registry)
//! 2. Auction and switch to simulation
//! 3. One tick per `tick_interval_ms` until the horizon is exhausted
//! 4. Finalize, persist results and snapshot, notify the observer
//!
//! On shutdown mid-round the round is force-finalized with whatever the
//! ledgers hold, persisted, and the loop exits.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{error, info, instrument, warn};

use crate::config::SchedulerConfig;
use crate::domain::ledger::RoundResult;
use crate::domain::session::SessionSnapshot;
use crate::ports::observer::MarketObserver;
use crate::ports::repository::RoundRepository;
use crate::usecases::phase_machine;
use crate::usecases::registry::{SessionId, SessionRegistry};
use crate::usecases::tick_engine::advance_one_tick;

/// What the scheduler did before it stopped.
#[derive(Debug, Clone, Default)]
pub struct SchedulerReport {
  /// Rounds finalized, forced ones included.
  pub rounds_completed: u32,
  /// Whether a shutdown signal cut the run short.
  pub stopped_early: bool,
  /// Every result persisted, in commit order.
  pub results: Vec<RoundResult>,
}

/// Drives one session through a configured number of rounds.
pub struct RoundScheduler<R: RoundRepository, O: MarketObserver> {
  registry: Arc<SessionRegistry>,
  repo: Arc<R>,
  observer: Arc<O>,
  session_id: SessionId,
  config: SchedulerConfig,
  /// Snapshot cadence in ticks; 0 disables mid-round snapshots.
  snapshot_every_ticks: u32,
}

impl<R: RoundRepository, O: MarketObserver> RoundScheduler<R, O> {
  /// Create a new scheduler.
  pub fn new(
    registry: Arc<SessionRegistry>,
    repo: Arc<R>,
    observer: Arc<O>,
    session_id: SessionId,
    config: SchedulerConfig,
  ) -> Self {
    Self {
      registry,
      repo,
      observer,
      session_id,
      config,
      snapshot_every_ticks: 0,
    }
  }

  /// Save a snapshot every `ticks` ticks as well as at round end.
  pub fn with_snapshot_cadence(mut self, ticks: u32) -> Self {
    self.snapshot_every_ticks = ticks;
    self
  }

  /// Run until the configured rounds are played or shutdown arrives.
  ///
  /// # Errors
  /// Unknown session, a failed auction, or a failure to persist round
  /// results. Snapshot failures are logged and skipped.
  #[instrument(skip(self, shutdown_rx), fields(session_id = %self.session_id))]
  pub async fn run(
    &self,
    mut shutdown_rx: broadcast::Receiver<()>,
  ) -> Result<SchedulerReport> {
    let mut report = SchedulerReport::default();
    info!(rounds = self.config.rounds, "Round scheduler started");

    for _ in 0..self.config.rounds {
      // Pre-purchase window.
      tokio::select! {
        _ = shutdown_rx.recv() => {
          info!("Shutdown during pre-purchase, stopping scheduler");
          report.stopped_early = true;
          return Ok(report);
        }
        () = sleep(Duration::from_millis(self.config.pre_purchase_ms)) => {}
      }

      self.open_round().await?;

      let mut ticker = interval(Duration::from_millis(self.config.tick_interval_ms));
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      let forced = loop {
        tokio::select! {
          _ = shutdown_rx.recv() => {
            warn!("Shutdown mid-round, forcing round end");
            break true;
          }
          _ = ticker.tick() => {
            if self.tick().await? {
              break false;
            }
          }
        }
      };

      let results = self.close_round().await?;
      report.rounds_completed += 1;
      report.results.extend(results);
      if forced {
        report.stopped_early = true;
        return Ok(report);
      }
    }

    info!(
      rounds = report.rounds_completed,
      "Round scheduler finished"
    );
    Ok(report)
  }

  async fn open_round(&self) -> Result<()> {
    let handle = self.registry.handle(&self.session_id).await?;
    let mut slot = handle.lock().await;
    let summary = phase_machine::start_simulation(&mut slot.session)
      .context("Failed to open round")?;
    self.observer.on_auction(&self.session_id, &summary);
    Ok(())
  }

  /// One tick; returns whether the horizon is exhausted.
  async fn tick(&self) -> Result<bool> {
    let handle = self.registry.handle(&self.session_id).await?;
    let snapshot = {
      let mut guard = handle.lock().await;
      let slot = &mut *guard;
      let report = advance_one_tick(&mut slot.session, &mut slot.rng)
        .context("Failed to advance tick")?;
      self
        .observer
        .on_tick(&self.session_id, &report, &slot.session.pooling);
      if report.phase_completed {
        return Ok(true);
      }
      let due = self.snapshot_every_ticks > 0 && report.tick % self.snapshot_every_ticks == 0;
      due.then(|| slot.session.snapshot())
    };
    if let Some(snapshot) = snapshot {
      self.save_snapshot(&snapshot).await;
    }
    Ok(false)
  }

  async fn close_round(&self) -> Result<Vec<RoundResult>> {
    let handle = self.registry.handle(&self.session_id).await?;
    let (results, snapshot) = {
      let mut guard = handle.lock().await;
      let slot = &mut *guard;
      let results = phase_machine::end_phase_now(&mut slot.session, &mut slot.rng);
      self.observer.on_round(&self.session_id, &results);
      (results, slot.session.snapshot())
    };

    self
      .repo
      .save_round_results(&self.session_id, &results)
      .await
      .context("Failed to persist round results")?;
    self.save_snapshot(&snapshot).await;
    Ok(results)
  }

  async fn save_snapshot(&self, snapshot: &SessionSnapshot) {
    if let Err(e) = self.repo.save_snapshot(snapshot).await {
      error!(error = %e, round = snapshot.round, "Failed to save session snapshot");
    }
  }
}
