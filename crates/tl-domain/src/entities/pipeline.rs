//! Pipeline run accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal and non-terminal states of one pipeline run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RunStatus {
    /// The run is in progress.
    Running,
    /// All stages completed and outputs were persisted.
    Completed,
    /// A stage failed fatally; partial outputs were discarded.
    Failed,
    /// The run was cancelled; partial writes were rolled back.
    Cancelled,
}

/// Accounting record produced by every pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Run identity.
    pub id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Current status.
    pub status: RunStatus,
    /// Raw items fed into the pipeline.
    pub items_in: u64,
    /// Processed items surviving dedup.
    pub items_out: u64,
    /// Topics produced by clustering.
    pub topics: u64,
    /// Trends produced by ranking.
    pub trends: u64,
    /// Non-fatal errors collected along the way.
    #[serde(default)]
    pub errors: Vec<String>,
    /// Snapshot of the pipeline configuration used for this run.
    pub config_snapshot: serde_json::Value,
}

impl PipelineRun {
    /// Start a new run with the given configuration snapshot.
    #[must_use]
    pub fn start(config_snapshot: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            completed_at: None,
            status: RunStatus::Running,
            items_in: 0,
            items_out: 0,
            topics: 0,
            trends: 0,
            errors: Vec::new(),
            config_snapshot,
        }
    }

    /// Transition to a terminal status and stamp the completion time.
    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }
}
