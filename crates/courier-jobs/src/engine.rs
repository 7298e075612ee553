use chrono::{Duration, Utc};
use rusqlite::Connection;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{db::init_db, error::Result};

/// What the engine forwards on the delivery channel when a job fires.
///
/// The `run_id` is fresh per fire so downstream logs can correlate one
/// execution across tasks.
#[derive(Debug, Clone)]
pub struct FiredJob {
    pub run_id: String,
    pub job_id: String,
    pub name: String,
    pub run_count: u32,
    pub fired_at: String,
}

/// Core poll loop: fires registered jobs when their `next_run` arrives and
/// advances the schedule by the job's interval.
pub struct JobEngine {
    conn: Connection,
    /// If set, fired jobs are sent here for execution routing.
    fired_tx: Option<mpsc::Sender<FiredJob>>,
    poll_secs: u64,
}

impl JobEngine {
    /// Create a new engine, initialising the DB schema if needed.
    ///
    /// Pass `Some(tx)` to receive a [`FiredJob`] per fire via mpsc. The
    /// sender is non-blocking (`try_send`) so the tick loop is never stalled.
    pub fn new(conn: Connection, fired_tx: Option<mpsc::Sender<FiredJob>>) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn,
            fired_tx,
            poll_secs: 1,
        })
    }

    /// Override the poll cadence (seconds). Used by tests and small-footprint
    /// deployments; production keeps the 1 s default.
    pub fn with_poll_secs(mut self, poll_secs: u64) -> Self {
        self.poll_secs = poll_secs.max(1);
        self
    }

    /// Main event loop. Polls until `shutdown` broadcasts `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("job engine started");
        self.mark_missed_on_startup();

        let mut interval = tokio::time::interval(std::time::Duration::from_secs(self.poll_secs));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick() {
                        error!("job engine tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("job engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    // --- private helpers ---------------------------------------------------

    /// On startup, mark any pending job whose next_run is in the past as
    /// Missed. The job still fires on the next tick; the status records that
    /// at least one window was skipped while the process was down.
    fn mark_missed_on_startup(&mut self) {
        let now = Utc::now().to_rfc3339();
        match self.conn.execute(
            "UPDATE jobs SET status = 'missed', updated_at = ?1
             WHERE status = 'pending' AND next_run < ?1",
            [&now],
        ) {
            Ok(n) if n > 0 => warn!(count = n, "jobs marked missed on startup"),
            Err(e) => error!("missed-on-startup query failed: {e}"),
            _ => {}
        }
    }

    /// Fire all jobs whose next_run has arrived.
    fn tick(&mut self) -> Result<()> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        // Collect eagerly inside the block so `stmt` is dropped before we
        // borrow `self.conn` again for the UPDATE below.
        // Columns: id, name, interval_secs, run_count
        let due: Vec<(String, String, u64, u32)> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT id, name, interval_secs, run_count FROM jobs
                 WHERE next_run <= ?1",
            )?;
            let rows: Vec<_> = stmt
                .query_map([&now_str], |row| {
                    Ok((
                        row.get::<_, String>(0)?, // id
                        row.get::<_, String>(1)?, // name
                        row.get::<_, u64>(2)?,    // interval_secs
                        row.get::<_, u32>(3)?,    // run_count
                    ))
                })?
                .filter_map(|r| r.ok())
                .collect();
            rows
        };

        for (id, name, interval_secs, run_count) in due {
            // The registry bounds intervals on submit; a row that slipped in
            // some other way must not panic the loop.
            let step = match i64::try_from(interval_secs).ok().and_then(Duration::try_seconds) {
                Some(step) => step,
                None => {
                    error!(job_id = %id, interval_secs, "interval out of range — job skipped");
                    continue;
                }
            };
            let new_count = run_count + 1;
            let next = (now + step).to_rfc3339();

            info!(job_id = %id, %name, run = new_count, "firing job");

            self.conn.execute(
                "UPDATE jobs SET status='pending', last_run=?1, next_run=?2,
                  run_count=?3, updated_at=?1
                 WHERE id=?4",
                rusqlite::params![now_str, next, new_count, id],
            )?;

            // Forward the fire to the execution router (non-blocking).
            if let Some(ref tx) = self.fired_tx {
                let fired = FiredJob {
                    run_id: Uuid::new_v4().to_string(),
                    job_id: id.clone(),
                    name,
                    run_count: new_count,
                    fired_at: now_str.clone(),
                };
                // try_send never blocks the tick loop; log if the channel is full.
                if tx.try_send(fired).is_err() {
                    warn!(job_id = %id, "delivery channel full or closed — fire dropped");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn_with_job(next_run_offset_secs: i64) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        let now = Utc::now();
        let next = (now + Duration::seconds(next_run_offset_secs)).to_rfc3339();
        conn.execute(
            "INSERT INTO jobs
             (id, name, interval_secs, constraints, status, last_run, next_run,
              run_count, created_at, updated_at)
             VALUES ('j1', 'job one', 3600, '[]', 'pending', NULL, ?1, 0, ?2, ?2)",
            rusqlite::params![next, now.to_rfc3339()],
        )
        .unwrap();
        conn
    }

    #[test]
    fn tick_fires_due_job_and_advances_schedule() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut engine = JobEngine::new(conn_with_job(-5), Some(tx)).unwrap();
        engine.tick().unwrap();

        let fired = rx.try_recv().unwrap();
        assert_eq!(fired.job_id, "j1");
        assert_eq!(fired.run_count, 1);

        let (next_run, run_count): (String, u32) = engine
            .conn
            .query_row("SELECT next_run, run_count FROM jobs WHERE id='j1'", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(run_count, 1);
        assert!(next_run > Utc::now().to_rfc3339());
    }

    #[test]
    fn tick_ignores_future_job() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut engine = JobEngine::new(conn_with_job(3600), Some(tx)).unwrap();
        engine.tick().unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn out_of_range_interval_does_not_panic_tick() {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        let past = (Utc::now() - Duration::seconds(5)).to_rfc3339();
        conn.execute(
            "INSERT INTO jobs
             (id, name, interval_secs, constraints, status, last_run, next_run,
              run_count, created_at, updated_at)
             VALUES ('bad', 'bad job', ?1, '[]', 'pending', NULL, ?2, 0, ?2, ?2)",
            rusqlite::params![i64::MAX, past],
        )
        .unwrap();

        let (tx, mut rx) = mpsc::channel(4);
        let mut engine = JobEngine::new(conn, Some(tx)).unwrap();
        engine.tick().unwrap();

        // The job is skipped, not fired, and its row is left untouched.
        assert!(rx.try_recv().is_err());
        let run_count: u32 = engine
            .conn
            .query_row("SELECT run_count FROM jobs WHERE id='bad'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(run_count, 0);
    }

    #[test]
    fn overdue_job_marked_missed_then_fires() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut engine = JobEngine::new(conn_with_job(-5), Some(tx)).unwrap();
        engine.mark_missed_on_startup();

        let status: String = engine
            .conn
            .query_row("SELECT status FROM jobs WHERE id='j1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(status, "missed");

        // Missed jobs still fire on the next tick and return to pending.
        engine.tick().unwrap();
        assert!(rx.try_recv().is_ok());
        let status: String = engine
            .conn
            .query_row("SELECT status FROM jobs WHERE id='j1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(status, "pending");
    }
}
