//! Snapshot Store - Atomic JSON Session Snapshots
//!
//! Saves session snapshots to `sessions/<session_id>.json` using atomic
//! writes (write to tmp file, then rename), so a file on disk is always
//! either the previous or the new snapshot, never a partial write.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::domain::session::SessionSnapshot;

/// Atomic JSON store, one file per session.
pub struct SnapshotStore {
    sessions_dir: PathBuf,
}

impl SnapshotStore {
    /// Create a snapshot store under `data_dir/sessions`.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let sessions_dir = Path::new(data_dir).join("sessions");
        fs::create_dir_all(&sessions_dir)
            .await
            .context("Failed to create sessions directory")?;
        Ok(Self { sessions_dir })
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{session_id}.json"))
    }

    /// Save a snapshot atomically (tmp → rename).
    #[instrument(skip(self, snapshot), fields(session_id = %snapshot.id, round = snapshot.round))]
    pub async fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let json =
            serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;

        let path = self.path_for(&snapshot.id);
        let tmp_path = path.with_extension("json.tmp");

        fs::write(&tmp_path, &json)
            .await
            .context("Failed to write tmp snapshot file")?;
        fs::rename(&tmp_path, &path)
            .await
            .context("Failed to rename snapshot file")?;

        debug!(path = %path.display(), "Session snapshot saved");
        Ok(())
    }

    /// Load a session's snapshot; `None` if it was never saved.
    #[instrument(skip(self))]
    pub async fn load(&self, session_id: &str) -> Result<Option<SessionSnapshot>> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&path)
            .await
            .context("Failed to read snapshot file")?;
        let snapshot: SessionSnapshot =
            serde_json::from_str(&json).context("Failed to parse snapshot JSON")?;

        info!(
            round = snapshot.round,
            phase = %snapshot.phase,
            teams = snapshot.teams.len(),
            "Session snapshot loaded"
        );
        Ok(Some(snapshot))
    }

    /// Check that the sessions directory is still there.
    pub async fn is_healthy(&self) -> bool {
        fs::metadata(&self.sessions_dir)
            .await
            .is_ok_and(|m| m.is_dir())
    }
}
