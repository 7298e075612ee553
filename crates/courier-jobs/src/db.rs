use rusqlite::Connection;

use crate::error::Result;

/// Initialise the job schema in `conn`.
///
/// Creates the `jobs` table (idempotent) and an index on `next_run` so the
/// polling query stays efficient as the registry grows.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id            TEXT    NOT NULL PRIMARY KEY,
            name          TEXT    NOT NULL,
            interval_secs INTEGER NOT NULL,
            constraints   TEXT    NOT NULL,   -- JSON-encoded Constraint array
            status        TEXT    NOT NULL DEFAULT 'pending',
            last_run      TEXT,               -- ISO-8601 or NULL
            next_run      TEXT    NOT NULL,   -- ISO-8601
            run_count     INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT    NOT NULL,
            updated_at    TEXT    NOT NULL
        ) STRICT;

        -- Efficient polling: SELECT … WHERE next_run <= ?  ORDER BY next_run
        CREATE INDEX IF NOT EXISTS idx_jobs_next_run ON jobs (next_run);
        ",
    )?;
    Ok(())
}
