//! Game session: phase, teams, pooling market and per-round ledgers.
//!
//! A session is a plain value. The use cases in `crate::usecases` drive
//! it through the auction, the ticks and round finalization; this module
//! only owns the state and the operations teams and admins perform in
//! between.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::auction::AllocationSummary;
use super::error::SimError;
use super::ledger::{RoundResult, TickLedger};
use super::params::{ParamsPatch, SessionParams, VersionedParams};
use super::pooling::PoolingMarket;
use super::team::{DecisionsPatch, Team, TeamDecisions, TeamId};

/// Session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Bidding open; teams edit their decisions.
    PrePurchase,
    /// Ticks running.
    Simulation,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrePurchase => write!(f, "pre_purchase"),
            Self::Simulation => write!(f, "simulation"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub phase: Phase,
    /// Number of rounds finalized so far; the round being played.
    pub round: u32,
    pub params: VersionedParams,
    /// Always sorted by team id.
    pub teams: Vec<Team>,
    pub pooling: PoolingMarket,
    /// Present only while a round is being simulated.
    pub ledgers: BTreeMap<TeamId, TickLedger>,
    /// Seats released by insolvent teams, not yet re-injected.
    pub returned_demand_pending: u32,
    pub remaining_days: u32,
    pub tick: u32,
    pub last_allocation: Option<AllocationSummary>,
    /// Results of the most recently finalized round.
    pub last_results: Vec<RoundResult>,
    pub round_history: Vec<RoundResult>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// New session in [`Phase::PrePurchase`], round 0.
    ///
    /// # Errors
    /// [`SimError::Config`] if the parameters are invalid.
    pub fn new(id: impl Into<String>, params: SessionParams) -> Result<Self, SimError> {
        Ok(Self {
            id: id.into(),
            phase: Phase::PrePurchase,
            round: 0,
            params: VersionedParams::new(params)?,
            teams: Vec::new(),
            pooling: PoolingMarket::default(),
            ledgers: BTreeMap::new(),
            returned_demand_pending: 0,
            remaining_days: 0,
            tick: 0,
            last_allocation: None,
            last_results: Vec::new(),
            round_history: Vec::new(),
            created_at: Utc::now(),
        })
    }

    pub fn params(&self) -> &SessionParams {
        self.params.params()
    }

    /// # Errors
    /// [`SimError::WrongPhase`] unless the session is in `expected`.
    pub fn ensure_phase(&self, expected: Phase) -> Result<(), SimError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(SimError::WrongPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    pub fn team(&self, id: &str) -> Option<&Team> {
        self.teams
            .binary_search_by(|t| t.id.as_str().cmp(id))
            .ok()
            .map(|i| &self.teams[i])
    }

    fn team_mut(&mut self, id: &str) -> Result<&mut Team, SimError> {
        let index = self
            .teams
            .binary_search_by(|t| t.id.as_str().cmp(id))
            .map_err(|_| SimError::UnknownTeam(id.to_string()))?;
        Ok(&mut self.teams[index])
    }

    /// Register a team.
    ///
    /// Allowed in either phase. A team joining mid-round has no ledger and
    /// sits out the ticks; its round is settled by the one-shot calculator.
    ///
    /// # Errors
    /// [`SimError::DuplicateTeam`] or [`SimError::InvalidDecision`].
    pub fn add_team(
        &mut self,
        id: impl Into<TeamId>,
        name: impl Into<String>,
        decisions: TeamDecisions,
    ) -> Result<(), SimError> {
        let id = id.into();
        decisions.validate_for(self.params())?;
        match self.teams.binary_search_by(|t| t.id.cmp(&id)) {
            Ok(_) => Err(SimError::DuplicateTeam(id)),
            Err(index) => {
                info!(session_id = %self.id, team = %id, phase = %self.phase, "Team joined");
                self.teams.insert(index, Team::new(id, name, decisions));
                Ok(())
            }
        }
    }

    /// Merge a team's decision patch. Pre-purchase only.
    ///
    /// # Errors
    /// Wrong phase, unknown team or an out-of-range value. On error the
    /// team's decisions are unchanged.
    pub fn update_decisions(
        &mut self,
        team_id: &str,
        patch: &DecisionsPatch,
    ) -> Result<TeamDecisions, SimError> {
        self.ensure_phase(Phase::PrePurchase)?;
        let params = self.params.shared();
        let team = self.team_mut(team_id)?;
        let next = patch.applied_to(&team.decisions);
        next.validate_for(&params)?;
        team.decisions = next.clone();
        debug!(team = %team_id, ?next, "Decisions updated");
        Ok(next)
    }

    /// Swap in a patched parameter snapshot. Pre-purchase only.
    ///
    /// # Errors
    /// Wrong phase or invalid merged parameters; the current snapshot is
    /// kept on error.
    pub fn apply_params_patch(&mut self, patch: &ParamsPatch) -> Result<u64, SimError> {
        self.ensure_phase(Phase::PrePurchase)?;
        let next = self.params.apply(patch)?;
        info!(
            session_id = %self.id,
            from = self.params.version(),
            to = next.version(),
            "Session parameters patched"
        );
        self.params = next;
        Ok(self.params.version())
    }

    /// Teams still receiving demand: ledger present and solvent.
    pub fn alive_team_ids(&self) -> Vec<TeamId> {
        self.ledgers
            .iter()
            .filter(|(_, l)| !l.insolvent)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Serializable copy of the whole session.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            phase: self.phase,
            round: self.round,
            params_version: self.params.version(),
            params: self.params().clone(),
            teams: self.teams.clone(),
            pooling: self.pooling.clone(),
            ledgers: self.ledgers.clone(),
            returned_demand_pending: self.returned_demand_pending,
            remaining_days: self.remaining_days,
            tick: self.tick,
            last_allocation: self.last_allocation.clone(),
            last_results: self.last_results.clone(),
            round_history: self.round_history.clone(),
            created_at: self.created_at,
            taken_at: Utc::now(),
        }
    }

    /// Rebuild a session from a snapshot.
    ///
    /// # Errors
    /// [`SimError::Config`] if the stored parameters no longer validate.
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Result<Self, SimError> {
        let params = VersionedParams::restore(snapshot.params_version, snapshot.params)?;
        let mut teams = snapshot.teams;
        teams.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(Self {
            id: snapshot.id,
            phase: snapshot.phase,
            round: snapshot.round,
            params,
            teams,
            pooling: snapshot.pooling,
            ledgers: snapshot.ledgers,
            returned_demand_pending: snapshot.returned_demand_pending,
            remaining_days: snapshot.remaining_days,
            tick: snapshot.tick,
            last_allocation: snapshot.last_allocation,
            last_results: snapshot.last_results,
            round_history: snapshot.round_history,
            created_at: snapshot.created_at,
        })
    }
}

/// Point-in-time copy of a [`Session`], as persisted and published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub phase: Phase,
    pub round: u32,
    pub params_version: u64,
    pub params: SessionParams,
    pub teams: Vec<Team>,
    pub pooling: PoolingMarket,
    pub ledgers: BTreeMap<TeamId, TickLedger>,
    pub returned_demand_pending: u32,
    pub remaining_days: u32,
    pub tick: u32,
    pub last_allocation: Option<AllocationSummary>,
    pub last_results: Vec<RoundResult>,
    pub round_history: Vec<RoundResult>,
    pub created_at: DateTime<Utc>,
    pub taken_at: DateTime<Utc>,
}
