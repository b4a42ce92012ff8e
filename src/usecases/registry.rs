//! Session Registry - Concurrent Session Ownership
//!
//! Maps session ids to session handles. Each handle is a per-session
//! mutex owning the [`Session`] and its random source, so operations on
//! one session are serialized while different sessions run concurrently.
//! There is no process-wide current session: callers pass the id.

use std::collections::HashMap;
use std::sync::Arc;

use rand_chacha::ChaCha8Rng;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::auction::AllocationSummary;
use crate::domain::error::SimError;
use crate::domain::ledger::RoundResult;
use crate::domain::params::{ParamsPatch, SessionParams};
use crate::domain::rng::{entropy_rng, seeded_rng};
use crate::domain::session::{Session, SessionSnapshot};
use crate::domain::team::{DecisionsPatch, TeamDecisions};
use crate::usecases::{phase_machine, round_aggregator};
use crate::usecases::tick_engine::{advance_one_tick, TickReport};

/// Session identifier (UUID v4 string).
pub type SessionId = String;

/// A session and the random source that drives it.
pub struct SessionSlot {
  pub session: Session,
  pub rng: ChaCha8Rng,
}

impl SessionSlot {
  /// `seed` gives deterministic replay; `None` draws from OS entropy.
  pub fn new(session: Session, seed: Option<u64>) -> Self {
    let rng = seed.map_or_else(entropy_rng, seeded_rng);
    Self { session, rng }
  }
}

/// Shared handle to one session.
pub type SessionHandle = Arc<Mutex<SessionSlot>>;

/// Registry of live sessions.
#[derive(Default)]
pub struct SessionRegistry {
  sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl SessionRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Create a session with a fresh UUID.
  ///
  /// # Errors
  /// [`SimError::Config`] for invalid parameters.
  #[instrument(skip(self, params))]
  pub async fn create(
    &self,
    params: SessionParams,
    seed: Option<u64>,
  ) -> Result<SessionId, SimError> {
    let id = Uuid::new_v4().to_string();
    let session = Session::new(id.clone(), params)?;
    self.insert(session, seed).await;
    Ok(id)
  }

  /// Register an existing session (e.g. restored from a snapshot),
  /// replacing any session with the same id.
  pub async fn insert(&self, session: Session, seed: Option<u64>) -> SessionHandle {
    let id = session.id.clone();
    let handle = Arc::new(Mutex::new(SessionSlot::new(session, seed)));
    self.sessions.write().await.insert(id.clone(), Arc::clone(&handle));
    info!(session_id = %id, seeded = seed.is_some(), "Session registered");
    handle
  }

  /// Drop a session. Returns whether it existed.
  pub async fn remove(&self, id: &str) -> bool {
    let removed = self.sessions.write().await.remove(id).is_some();
    if removed {
      info!(session_id = %id, "Session removed");
    }
    removed
  }

  /// Ids of all registered sessions, sorted.
  pub async fn ids(&self) -> Vec<SessionId> {
    let mut ids: Vec<_> = self.sessions.read().await.keys().cloned().collect();
    ids.sort();
    ids
  }

  /// Handle for direct, multi-step access under one lock.
  ///
  /// # Errors
  /// [`SimError::UnknownSession`].
  pub async fn handle(&self, id: &str) -> Result<SessionHandle, SimError> {
    self
      .sessions
      .read()
      .await
      .get(id)
      .cloned()
      .ok_or_else(|| SimError::UnknownSession(id.to_string()))
  }

  /// Run `f` with exclusive access to one session.
  async fn with_slot<T>(
    &self,
    id: &str,
    f: impl FnOnce(&mut SessionSlot) -> Result<T, SimError>,
  ) -> Result<T, SimError> {
    let handle = self.handle(id).await?;
    let mut slot = handle.lock().await;
    f(&mut *slot)
  }

  /// # Errors
  /// [`SimError::UnknownSession`].
  pub async fn snapshot(&self, id: &str) -> Result<SessionSnapshot, SimError> {
    self.with_slot(id, |slot| Ok(slot.session.snapshot())).await
  }

  /// # Errors
  /// Unknown session, duplicate team or invalid decisions.
  pub async fn add_team(
    &self,
    id: &str,
    team_id: &str,
    name: &str,
    decisions: TeamDecisions,
  ) -> Result<(), SimError> {
    self
      .with_slot(id, |slot| slot.session.add_team(team_id, name, decisions))
      .await
  }

  /// # Errors
  /// Unknown session or team, wrong phase, invalid decisions.
  pub async fn update_decisions(
    &self,
    id: &str,
    team_id: &str,
    patch: &DecisionsPatch,
  ) -> Result<TeamDecisions, SimError> {
    self
      .with_slot(id, |slot| slot.session.update_decisions(team_id, patch))
      .await
  }

  /// # Errors
  /// Unknown session, wrong phase, invalid parameters.
  pub async fn apply_params_patch(&self, id: &str, patch: &ParamsPatch) -> Result<u64, SimError> {
    self
      .with_slot(id, |slot| slot.session.apply_params_patch(patch))
      .await
  }

  /// # Errors
  /// Unknown session, wrong phase, no teams.
  pub async fn start_simulation(&self, id: &str) -> Result<AllocationSummary, SimError> {
    self
      .with_slot(id, |slot| phase_machine::start_simulation(&mut slot.session))
      .await
  }

  /// # Errors
  /// Unknown session or wrong phase.
  pub async fn advance_tick(&self, id: &str) -> Result<TickReport, SimError> {
    self
      .with_slot(id, |slot| advance_one_tick(&mut slot.session, &mut slot.rng))
      .await
  }

  /// # Errors
  /// [`SimError::UnknownSession`].
  pub async fn end_phase_now(&self, id: &str) -> Result<Vec<RoundResult>, SimError> {
    self
      .with_slot(id, |slot| {
        Ok(phase_machine::end_phase_now(&mut slot.session, &mut slot.rng))
      })
      .await
  }

  /// # Errors
  /// [`SimError::UnknownSession`].
  pub async fn finalize_round(&self, id: &str) -> Result<Vec<RoundResult>, SimError> {
    self
      .with_slot(id, |slot| {
        Ok(round_aggregator::finalize_round(&mut slot.session, &mut slot.rng))
      })
      .await
  }
}
