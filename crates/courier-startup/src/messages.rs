//! Restart-safe registration of the recurring messages-sync job.
//!
//! The identifier, interval, and constraints are fixed constants owned by
//! this module — they are part of the product contract, not configuration.
//! [`ensure_scheduled`] is called from the startup sequence on every process
//! start and is a true no-op when the job is already registered: the host's
//! keep-existing conflict policy guarantees neither a duplicate row nor a
//! timer reset, even when two launches race.

use tracing::{debug, info, warn};

use courier_jobs::{ConflictPolicy, Constraint, JobSpec};

use crate::context::AppContext;
use crate::init::Initializer;

/// Stable registry identifier for the sync job. Must never change across
/// releases or the dedup guarantee is lost.
pub const MESSAGES_JOB_ID: &str = "messages.sync";

/// Human-readable label shown in job listings.
pub const MESSAGES_JOB_NAME: &str = "messages sync";

/// One hour: well above the host's periodic floor, frequent enough that a
/// delivered message is at most an hour stale.
pub const MESSAGES_SYNC_INTERVAL_SECS: u64 = 3_600;

/// Sync is pointless offline, so gate on connectivity only.
pub const MESSAGES_SYNC_CONSTRAINTS: &[Constraint] = &[Constraint::NetworkRequired];

/// Guarantee the recurring sync job is registered, at most once, across the
/// whole lifetime of the installation.
///
/// Never raises: any failure talking to the job host is logged and
/// swallowed — the job simply stays unregistered until the next process
/// start retries from the same startup path. Safe to call redundantly and
/// safe to call concurrently.
pub fn ensure_scheduled(ctx: &AppContext) {
    match ctx.jobs.job(MESSAGES_JOB_ID) {
        Ok(Some(job)) => {
            // Already registered — leave the existing schedule alone.
            debug!(
                job_id = MESSAGES_JOB_ID,
                next_run = %job.next_run,
                "messages sync already scheduled"
            );
        }
        Ok(None) => {
            let spec = JobSpec {
                id: MESSAGES_JOB_ID.to_string(),
                name: MESSAGES_JOB_NAME.to_string(),
                interval_secs: MESSAGES_SYNC_INTERVAL_SECS,
                constraints: MESSAGES_SYNC_CONSTRAINTS.to_vec(),
            };
            // KeepExisting covers the race where another launch registered
            // between our query and this submit.
            match ctx.jobs.submit(&spec, ConflictPolicy::KeepExisting) {
                Ok(outcome) => {
                    info!(job_id = MESSAGES_JOB_ID, ?outcome, "messages sync scheduled");
                }
                Err(e) => {
                    warn!(
                        job_id = MESSAGES_JOB_ID,
                        error = %e,
                        "messages sync registration failed — will retry next start"
                    );
                }
            }
        }
        Err(e) => {
            warn!(
                job_id = MESSAGES_JOB_ID,
                error = %e,
                "messages sync query failed — will retry next start"
            );
        }
    }
}

/// Startup unit wrapping [`ensure_scheduled`].
pub struct MessagesJobInit;

impl Initializer for MessagesJobInit {
    fn name(&self) -> &'static str {
        "messages-job"
    }

    fn run(&self, ctx: &AppContext) -> courier_core::Result<()> {
        // The guard swallows its own failures; this unit never reports one.
        ensure_scheduled(ctx);
        Ok(())
    }
}
