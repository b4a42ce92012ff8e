//! Repository Port - Round Result and Session Persistence
//!
//! Defines the trait for persisting finalized round results and session
//! snapshots using plain files. No database dependency: results go to an
//! append-only JSONL log, snapshots to atomically replaced JSON files.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::ledger::RoundResult;
use crate::domain::session::SessionSnapshot;

/// One line of the round log: a finalized result tagged with its session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
  /// Session the result belongs to.
  pub session_id: String,
  /// Wall-clock time of the commit (Unix ms).
  pub recorded_at_ms: u64,
  #[serde(flatten)]
  pub result: RoundResult,
}

/// Trait for persistence providers.
///
/// Uses JSONL (JSON Lines) for round results so a partial write loses at
/// most the last line, and whole-file JSON for snapshots.
#[async_trait]
pub trait RoundRepository: Send + Sync + 'static {
  /// Append one round's results for a session.
  async fn save_round_results(
    &self,
    session_id: &str,
    results: &[RoundResult],
  ) -> anyhow::Result<()>;

  /// Load every result recorded for a session, oldest first.
  async fn load_round_results(&self, session_id: &str) -> anyhow::Result<Vec<RoundRecord>>;

  /// Save (replace) a session snapshot.
  async fn save_snapshot(&self, snapshot: &SessionSnapshot) -> anyhow::Result<()>;

  /// Load the latest snapshot of a session, if any.
  async fn load_snapshot(&self, session_id: &str) -> anyhow::Result<Option<SessionSnapshot>>;

  /// Check if the repository is healthy (directories writable).
  async fn is_healthy(&self) -> bool;
}
