//! Round Log - Append-only JSONL Round Results
//!
//! Persists finalized round results to one JSONL file per session:
//! `results/<session_id>.jsonl`. Each line is one [`RoundRecord`], so a
//! crash mid-write loses at most the trailing line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::domain::ledger::RoundResult;
use crate::ports::repository::RoundRecord;

/// Append-only JSONL writer for round results.
pub struct RoundLog {
    /// Directory holding one file per session.
    results_dir: PathBuf,
}

impl RoundLog {
    /// Create a round log under `data_dir/results`.
    pub async fn new(data_dir: &str) -> Result<Self> {
        let results_dir = Path::new(data_dir).join("results");
        fs::create_dir_all(&results_dir)
            .await
            .context("Failed to create results directory")?;
        Ok(Self { results_dir })
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.results_dir.join(format!("{session_id}.jsonl"))
    }

    /// Append one round's results, all lines in a single write.
    #[instrument(skip(self, results), fields(count = results.len()))]
    pub async fn append(&self, session_id: &str, results: &[RoundResult]) -> Result<()> {
        if results.is_empty() {
            return Ok(());
        }
        let recorded_at_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);

        let mut buf = String::new();
        for result in results {
            let record = RoundRecord {
                session_id: session_id.to_string(),
                recorded_at_ms,
                result: result.clone(),
            };
            buf.push_str(
                &serde_json::to_string(&record).context("Failed to serialize round record")?,
            );
            buf.push('\n');
        }

        let path = self.path_for(session_id);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context("Failed to open round log file")?;
        file.write_all(buf.as_bytes())
            .await
            .context("Failed to write round records")?;
        file.flush().await.context("Failed to flush round log")?;

        info!(path = %path.display(), round = results[0].round_number, "Round results appended");
        Ok(())
    }

    /// Load every record of a session, in write order.
    ///
    /// Malformed lines are skipped with a warning.
    #[instrument(skip(self))]
    pub async fn load(&self, session_id: &str) -> Result<Vec<RoundRecord>> {
        let path = self.path_for(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)
            .await
            .context("Failed to read round log")?;
        let mut records = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RoundRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        file = %path.display(),
                        error = %e,
                        "Skipping malformed round record"
                    );
                }
            }
        }
        Ok(records)
    }

    /// Check if the results directory is writable.
    pub async fn is_healthy(&self) -> bool {
        let probe = self.results_dir.join(".health_check");
        let result = fs::write(&probe, b"ok").await;
        let _ = fs::remove_file(&probe).await;
        result.is_ok()
    }
}
