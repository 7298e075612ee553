//! `courier-startup` — application lifecycle: execution context, ordered
//! initializer sequence, and the recurring messages-sync registration.
//!
//! The daemon runs [`init::InitSequence`] exactly once per process start.
//! One of its units calls [`messages::ensure_scheduled`], which guarantees
//! the recurring sync job is registered at most once across the entire
//! lifetime of the installation — safe to re-run on every launch, and safe
//! to race against a second launch.

pub mod context;
pub mod init;
pub mod messages;

pub use context::AppContext;
pub use init::{InitOutcome, InitReport, InitSequence, Initializer};
