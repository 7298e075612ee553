use thiserror::Error;

/// Errors that can occur within the job subsystem.
#[derive(Debug, Error)]
pub enum JobError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The host refused the submitted spec (bad identifier, interval below
    /// the periodic minimum, or an unsupported constraint set).
    #[error("Spec rejected: {0}")]
    SpecRejected(String),

    /// No job with the given ID exists in the store.
    #[error("Job not found: {id}")]
    NotFound { id: String },

    /// The subsystem cannot be reached (connection torn down or poisoned).
    #[error("Job host unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, JobError>;
