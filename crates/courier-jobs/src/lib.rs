//! `courier-jobs` — persistent recurring-job subsystem over SQLite.
//!
//! # Overview
//!
//! Jobs are rows in a SQLite `jobs` table keyed by a caller-chosen stable
//! identifier, so a registration survives process restarts. Writers go
//! through [`registry::JobRegistry`], which exposes the two operations the
//! rest of the system needs: query-by-identifier and submit-with-conflict-
//! policy. The [`engine::JobEngine`] polls the table and forwards due jobs
//! on an mpsc channel for execution elsewhere.
//!
//! # Conflict policies
//!
//! | Policy         | Behaviour when the identifier already has a job        |
//! |----------------|--------------------------------------------------------|
//! | `KeepExisting` | No-op: existing row untouched, timer not reset         |
//! | `Replace`      | Interval and constraints rewritten, schedule restarted |
//!
//! `KeepExisting` is implemented as `INSERT … ON CONFLICT(id) DO NOTHING`,
//! so concurrent submissions for the same identifier serialize inside
//! SQLite and exactly one row wins.

pub mod db;
pub mod engine;
pub mod error;
pub mod registry;
pub mod types;

pub use engine::{FiredJob, JobEngine};
pub use error::{JobError, Result};
pub use registry::{JobHost, JobRegistry};
pub use types::{ConflictPolicy, Constraint, Job, JobSpec, JobStatus, SubmitOutcome};

/// Host-imposed floor for periodic intervals. Submissions below it are
/// rejected so misconfigured callers cannot turn the engine into a busy loop.
pub const MIN_PERIODIC_INTERVAL_SECS: u64 = 900;

/// Host-imposed ceiling for periodic intervals (one year). Keeps every
/// stored interval safely inside chrono's duration range.
pub const MAX_PERIODIC_INTERVAL_SECS: u64 = 365 * 24 * 3600;
