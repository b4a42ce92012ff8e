//! Repository Implementation - Concrete Adapter for the Repository Port
//!
//! Wraps `SnapshotStore` (atomic JSON snapshots) and `RoundLog` (JSONL
//! append-only results) into a single struct that implements the
//! `RoundRepository` trait from `crate::ports::repository`.

use anyhow::Result;
use async_trait::async_trait;

use super::results::RoundLog;
use super::state::SnapshotStore;
use crate::domain::ledger::RoundResult;
use crate::domain::session::SessionSnapshot;
use crate::ports::repository::{RoundRecord, RoundRepository};

/// Concrete repository adapter combining snapshot and result persistence.
pub struct RepositoryImpl {
    snapshots: SnapshotStore,
    round_log: RoundLog,
}

impl RepositoryImpl {
    pub fn new(snapshots: SnapshotStore, round_log: RoundLog) -> Self {
        Self {
            snapshots,
            round_log,
        }
    }

    /// Create a repository rooted at `data_dir`, creating
    /// `results/` and `sessions/` as needed.
    pub async fn from_data_dir(data_dir: &str) -> Result<Self> {
        let snapshots = SnapshotStore::new(data_dir).await?;
        let round_log = RoundLog::new(data_dir).await?;
        Ok(Self::new(snapshots, round_log))
    }
}

#[async_trait]
impl RoundRepository for RepositoryImpl {
    async fn save_round_results(&self, session_id: &str, results: &[RoundResult]) -> Result<()> {
        self.round_log.append(session_id, results).await
    }

    async fn load_round_results(&self, session_id: &str) -> Result<Vec<RoundRecord>> {
        self.round_log.load(session_id).await
    }

    async fn save_snapshot(&self, snapshot: &SessionSnapshot) -> Result<()> {
        self.snapshots.save(snapshot).await
    }

    async fn load_snapshot(&self, session_id: &str) -> Result<Option<SessionSnapshot>> {
        self.snapshots.load(session_id).await
    }

    async fn is_healthy(&self) -> bool {
        self.snapshots.is_healthy().await && self.round_log.is_healthy().await
    }
}
