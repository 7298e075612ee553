use serde::{Deserialize, Serialize};

/// A precondition the host should observe before running a job.
///
/// Stored as a JSON array in the `constraints` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// Any network connectivity.
    NetworkRequired,
    /// Wi-Fi or other unmetered connectivity.
    UnmeteredNetwork,
    /// Battery above the low threshold.
    BatteryNotLow,
    /// Device on external power.
    Charging,
    /// Free storage above the low threshold.
    StorageNotLow,
}

/// What to do when a submission targets an identifier that already has a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Leave the existing registration untouched — its timer is not reset.
    KeepExisting,
    /// Rewrite interval and constraints, restarting the schedule.
    Replace,
}

/// Which branch a submission took, so callers can audit the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// No job existed under the identifier; a new row was created.
    Created,
    /// A job existed and the policy was `KeepExisting`; nothing changed.
    KeptExisting,
    /// A job existed and the policy was `Replace`; the row was rewritten.
    Replaced,
}

/// A submission descriptor for a recurring job.
///
/// The identifier must be stable across app versions and restarts — it is
/// the dedup key the conflict policy operates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Stable identifier, unique within the registry.
    pub id: String,
    /// Human-readable label.
    pub name: String,
    /// Repeat interval in seconds. Must be at least
    /// [`crate::MIN_PERIODIC_INTERVAL_SECS`].
    pub interval_secs: u64,
    /// Preconditions for execution.
    pub constraints: Vec<Constraint>,
}

/// Lifecycle state of a registered job.
///
/// Recurring jobs never complete; `Missed` marks a window that passed while
/// the engine was offline, and a missed job fires on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its next_run time.
    Pending,
    /// The scheduled window was skipped (engine was offline).
    Missed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Missed => "missed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "missed" => Ok(JobStatus::Missed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A persisted job record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Stable identifier — primary key.
    pub id: String,
    /// Human-readable label.
    pub name: String,
    /// Repeat interval in seconds.
    pub interval_secs: u64,
    /// Preconditions for execution.
    pub constraints: Vec<Constraint>,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// ISO-8601 timestamp of the most recent fire, if any.
    pub last_run: Option<String>,
    /// ISO-8601 timestamp of the next planned fire.
    pub next_run: String,
    /// Total number of fires so far.
    pub run_count: u32,
    /// ISO-8601 timestamp of registration.
    pub created_at: String,
    /// ISO-8601 timestamp of the last row update.
    pub updated_at: String,
}
