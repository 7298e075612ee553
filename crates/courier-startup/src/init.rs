use std::time::Instant;

use tracing::{error, info};

use crate::context::AppContext;
use courier_core::CourierError;

/// One unit of process startup work.
///
/// Units are registered in an explicit order and must not depend on any
/// other unit having run; anything shared comes in through the context.
pub trait Initializer: Send + Sync {
    /// Short stable name, used in logs and the startup report.
    fn name(&self) -> &'static str;

    /// Run the unit. A returned error is recorded and logged, but never
    /// stops the remaining units.
    fn run(&self, ctx: &AppContext) -> courier_core::Result<()>;
}

/// Result of a single unit in the startup report.
#[derive(Debug)]
pub enum InitOutcome {
    Ok,
    Failed(CourierError),
}

/// Per-unit record of how startup went.
#[derive(Debug)]
pub struct InitReport {
    pub name: &'static str,
    pub outcome: InitOutcome,
    pub duration_ms: u64,
}

impl InitReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, InitOutcome::Ok)
    }
}

/// An explicit ordered sequence of startup units.
///
/// Replaces the usual flat registration list in a composition root: the
/// order is visible at the single place units are pushed, and a failing
/// unit is reported instead of silently skipping whatever followed it.
#[derive(Default)]
pub struct InitSequence {
    units: Vec<Box<dyn Initializer>>,
}

impl InitSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a unit. Units run in push order.
    pub fn register(mut self, unit: Box<dyn Initializer>) -> Self {
        self.units.push(unit);
        self
    }

    /// Run every unit in order, continuing past failures.
    ///
    /// Returns one report entry per unit so the caller can decide whether a
    /// partial startup is acceptable.
    pub fn run_all(&self, ctx: &AppContext) -> Vec<InitReport> {
        let mut reports = Vec::with_capacity(self.units.len());
        for unit in &self.units {
            let t = Instant::now();
            let outcome = match unit.run(ctx) {
                Ok(()) => {
                    info!(unit = unit.name(), "startup unit complete");
                    InitOutcome::Ok
                }
                Err(e) => {
                    error!(unit = unit.name(), error = %e, "startup unit failed");
                    InitOutcome::Failed(e)
                }
            };
            reports.push(InitReport {
                name: unit.name(),
                outcome,
                duration_ms: t.elapsed().as_millis() as u64,
            });
        }
        reports
    }
}

/// Logs build and runtime facts at startup so crash reports and support
/// bundles carry enough context to reproduce an issue.
pub struct DiagnosticsInit;

impl Initializer for DiagnosticsInit {
    fn name(&self) -> &'static str {
        "diagnostics"
    }

    fn run(&self, ctx: &AppContext) -> courier_core::Result<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            db_path = %ctx.config.database.path,
            poll_secs = ctx.config.runtime.poll_secs,
            "courier starting"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_jobs::{ConflictPolicy, Job, JobSpec, SubmitOutcome};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Host stub for sequence tests — the units below never touch jobs.
    struct NoJobs;

    impl courier_jobs::JobHost for NoJobs {
        fn job(&self, _id: &str) -> courier_jobs::Result<Option<Job>> {
            Ok(None)
        }
        fn submit(
            &self,
            _spec: &JobSpec,
            _policy: ConflictPolicy,
        ) -> courier_jobs::Result<SubmitOutcome> {
            Ok(SubmitOutcome::Created)
        }
    }

    fn ctx() -> AppContext {
        AppContext::new(courier_core::CourierConfig::default(), Arc::new(NoJobs))
    }

    struct Counting {
        name: &'static str,
        order: Arc<AtomicUsize>,
        seen_at: Arc<AtomicUsize>,
        fail: bool,
    }

    impl Initializer for Counting {
        fn name(&self) -> &'static str {
            self.name
        }
        fn run(&self, _ctx: &AppContext) -> courier_core::Result<()> {
            self.seen_at
                .store(self.order.fetch_add(1, Ordering::SeqCst), Ordering::SeqCst);
            if self.fail {
                Err(CourierError::Internal("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn units_run_in_registration_order() {
        let order = Arc::new(AtomicUsize::new(0));
        let first = Arc::new(AtomicUsize::new(99));
        let second = Arc::new(AtomicUsize::new(99));

        let seq = InitSequence::new()
            .register(Box::new(Counting {
                name: "first",
                order: Arc::clone(&order),
                seen_at: Arc::clone(&first),
                fail: false,
            }))
            .register(Box::new(Counting {
                name: "second",
                order: Arc::clone(&order),
                seen_at: Arc::clone(&second),
                fail: false,
            }));

        let reports = seq.run_all(&ctx());
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.succeeded()));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_does_not_stop_later_units() {
        let order = Arc::new(AtomicUsize::new(0));
        let after_fail = Arc::new(AtomicUsize::new(99));

        let seq = InitSequence::new()
            .register(Box::new(Counting {
                name: "failing",
                order: Arc::clone(&order),
                seen_at: Arc::new(AtomicUsize::new(0)),
                fail: true,
            }))
            .register(Box::new(Counting {
                name: "after",
                order: Arc::clone(&order),
                seen_at: Arc::clone(&after_fail),
                fail: false,
            }));

        let reports = seq.run_all(&ctx());
        assert!(!reports[0].succeeded());
        assert!(reports[1].succeeded());
        assert_eq!(after_fail.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn diagnostics_unit_always_succeeds() {
        let reports = InitSequence::new()
            .register(Box::new(DiagnosticsInit))
            .run_all(&ctx());
        assert!(reports[0].succeeded());
    }
}
