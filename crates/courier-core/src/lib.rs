//! `courier-core` — configuration and error types shared across the workspace.

pub mod config;
pub mod error;

pub use config::CourierConfig;
pub use error::{CourierError, Result};
