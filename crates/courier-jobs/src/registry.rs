use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use rusqlite::Connection;
use tracing::info;

use crate::{
    db::init_db,
    error::{JobError, Result},
    types::{ConflictPolicy, Constraint, Job, JobSpec, JobStatus, SubmitOutcome},
    MAX_PERIODIC_INTERVAL_SECS, MIN_PERIODIC_INTERVAL_SECS,
};

/// The two operations the rest of the system consumes from the job
/// subsystem: query-by-identifier and submit-with-conflict-policy.
///
/// [`JobRegistry`] is the SQLite implementation; tests substitute failing
/// mocks to exercise the callers' error isolation.
pub trait JobHost: Send + Sync {
    /// Look up the job registered under `id`, if any.
    fn job(&self, id: &str) -> Result<Option<Job>>;

    /// Register `spec`, resolving an identifier collision per `policy`.
    fn submit(&self, spec: &JobSpec, policy: ConflictPolicy) -> Result<SubmitOutcome>;
}

/// SQLite-backed job registry.
///
/// Uses its own `Connection` behind a mutex so multiple startup units can
/// share one handle without conflicting with the engine's polling queries.
pub struct JobRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl JobRegistry {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| JobError::Unavailable("connection mutex poisoned".to_string()))
    }

    /// Remove a job by ID. Returns `NotFound` if no row is deleted.
    pub fn cancel(&self, id: &str) -> Result<()> {
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM jobs WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(JobError::NotFound { id: id.to_string() });
        }
        info!(job_id = %id, "job cancelled");
        Ok(())
    }

    /// Return all registered jobs ordered by creation time.
    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, interval_secs, constraints, status, last_run,
                    next_run, run_count, created_at, updated_at
             FROM jobs ORDER BY created_at",
        )?;
        let jobs = stmt
            .query_map([], row_to_parts)?
            .filter_map(|r| r.ok().and_then(parts_to_job))
            .collect();
        Ok(jobs)
    }
}

impl JobHost for JobRegistry {
    fn job(&self, id: &str) -> Result<Option<Job>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, interval_secs, constraints, status, last_run,
                    next_run, run_count, created_at, updated_at
             FROM jobs WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map([id], row_to_parts)?;
        match rows.next() {
            Some(parts) => Ok(parts_to_job(parts?)),
            None => Ok(None),
        }
    }

    fn submit(&self, spec: &JobSpec, policy: ConflictPolicy) -> Result<SubmitOutcome> {
        validate_spec(spec)?;

        let conn = self.lock()?;
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let next = (now + Duration::seconds(spec.interval_secs as i64)).to_rfc3339();
        let constraints_json = serde_json::to_string(&spec.constraints)
            .map_err(|e| JobError::SpecRejected(e.to_string()))?;

        let outcome = match policy {
            ConflictPolicy::KeepExisting => {
                // The conflict clause is the dedup mechanism: a concurrent
                // submitter for the same id loses inside SQLite, and the
                // winner's row — including its timer — is left untouched.
                let n = conn.execute(
                    "INSERT INTO jobs
                     (id, name, interval_secs, constraints, status, last_run,
                      next_run, run_count, created_at, updated_at)
                     VALUES (?1,?2,?3,?4,'pending',NULL,?5,0,?6,?6)
                     ON CONFLICT(id) DO NOTHING",
                    rusqlite::params![
                        spec.id,
                        spec.name,
                        spec.interval_secs,
                        constraints_json,
                        next,
                        now_str
                    ],
                )?;
                if n == 0 {
                    SubmitOutcome::KeptExisting
                } else {
                    SubmitOutcome::Created
                }
            }
            ConflictPolicy::Replace => {
                let existed: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM jobs WHERE id = ?1)",
                    [&spec.id],
                    |row| row.get(0),
                )?;
                conn.execute(
                    "INSERT INTO jobs
                     (id, name, interval_secs, constraints, status, last_run,
                      next_run, run_count, created_at, updated_at)
                     VALUES (?1,?2,?3,?4,'pending',NULL,?5,0,?6,?6)
                     ON CONFLICT(id) DO UPDATE SET
                       name          = excluded.name,
                       interval_secs = excluded.interval_secs,
                       constraints   = excluded.constraints,
                       status        = 'pending',
                       next_run      = excluded.next_run,
                       updated_at    = excluded.updated_at",
                    rusqlite::params![
                        spec.id,
                        spec.name,
                        spec.interval_secs,
                        constraints_json,
                        next,
                        now_str
                    ],
                )?;
                if existed {
                    SubmitOutcome::Replaced
                } else {
                    SubmitOutcome::Created
                }
            }
        };

        match outcome {
            SubmitOutcome::Created => info!(job_id = %spec.id, name = %spec.name, "job registered"),
            SubmitOutcome::Replaced => info!(job_id = %spec.id, "job replaced"),
            SubmitOutcome::KeptExisting => {}
        }
        Ok(outcome)
    }
}

/// The host's acceptance rules for a submission.
fn validate_spec(spec: &JobSpec) -> Result<()> {
    if spec.id.trim().is_empty() {
        return Err(JobError::SpecRejected("empty job identifier".to_string()));
    }
    if spec.interval_secs < MIN_PERIODIC_INTERVAL_SECS {
        return Err(JobError::SpecRejected(format!(
            "interval {}s below periodic minimum {}s",
            spec.interval_secs, MIN_PERIODIC_INTERVAL_SECS
        )));
    }
    // The ceiling keeps `interval_secs as i64` and the chrono arithmetic in
    // `submit` and the engine tick away from their overflow panics.
    if spec.interval_secs > MAX_PERIODIC_INTERVAL_SECS {
        return Err(JobError::SpecRejected(format!(
            "interval {}s above periodic maximum {}s",
            spec.interval_secs, MAX_PERIODIC_INTERVAL_SECS
        )));
    }
    for (i, c) in spec.constraints.iter().enumerate() {
        if spec.constraints[..i].contains(c) {
            return Err(JobError::SpecRejected(format!(
                "duplicate constraint: {c:?}"
            )));
        }
    }
    Ok(())
}

type JobParts = (
    String,
    String,
    u64,
    String,
    String,
    Option<String>,
    String,
    u32,
    String,
    String,
);

fn row_to_parts(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobParts> {
    Ok((
        row.get(0)?, // id
        row.get(1)?, // name
        row.get(2)?, // interval_secs
        row.get(3)?, // constraints JSON
        row.get(4)?, // status
        row.get(5)?, // last_run
        row.get(6)?, // next_run
        row.get(7)?, // run_count
        row.get(8)?, // created_at
        row.get(9)?, // updated_at
    ))
}

fn parts_to_job(parts: JobParts) -> Option<Job> {
    let (
        id,
        name,
        interval_secs,
        constraints_json,
        status_str,
        last_run,
        next_run,
        run_count,
        created_at,
        updated_at,
    ) = parts;
    let constraints: Vec<Constraint> = serde_json::from_str(&constraints_json).ok()?;
    let status: JobStatus = status_str.parse().ok()?;
    Some(Job {
        id,
        name,
        interval_secs,
        constraints,
        status,
        last_run,
        next_run,
        run_count,
        created_at,
        updated_at,
    })
}
