//! End-to-end lifecycle scenarios: the registration made on first launch
//! must survive a process restart and must not be disturbed by later ones.

use std::path::Path;
use std::sync::Arc;

use courier_core::CourierConfig;
use courier_jobs::{JobHost, JobRegistry};
use courier_startup::messages::{ensure_scheduled, MESSAGES_JOB_ID};
use courier_startup::AppContext;

/// One "process launch": a fresh connection and registry over the file.
fn launch(db_path: &Path) -> Arc<JobRegistry> {
    let conn = rusqlite::Connection::open(db_path).unwrap();
    conn.busy_timeout(std::time::Duration::from_secs(5)).unwrap();
    Arc::new(JobRegistry::new(conn).unwrap())
}

fn ctx(jobs: Arc<JobRegistry>) -> AppContext {
    AppContext::new(CourierConfig::default(), jobs)
}

#[test]
fn registration_survives_restart_without_reset() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("courier.db");

    // First launch: fresh install, nothing registered yet.
    let first = launch(&db_path);
    assert!(first.job(MESSAGES_JOB_ID).unwrap().is_none());
    ensure_scheduled(&ctx(Arc::clone(&first)));
    let registered = first.job(MESSAGES_JOB_ID).unwrap().unwrap();
    drop(first);

    // Second launch: new connection, same database file.
    let second = launch(&db_path);
    ensure_scheduled(&ctx(Arc::clone(&second)));

    let after = second.job(MESSAGES_JOB_ID).unwrap().unwrap();
    assert_eq!(second.list_jobs().unwrap().len(), 1);
    assert_eq!(after.created_at, registered.created_at);
    assert_eq!(after.next_run, registered.next_run);
}

#[test]
fn overlapping_first_launches_register_one_job() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("courier.db");

    let mut handles = Vec::new();
    for _ in 0..4 {
        let reg = launch(&db_path);
        handles.push(std::thread::spawn(move || {
            ensure_scheduled(&ctx(reg));
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let reg = launch(&db_path);
    assert_eq!(reg.list_jobs().unwrap().len(), 1);
}
