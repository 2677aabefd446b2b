//! Custom error types for the application.
//!
//! This module defines the primary error type, `FomError`, for the control
//! plane. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the different faults the node can encounter,
//! from configuration problems at startup to resource-catalog reads.
//!
//! Driver-level faults have their own type, [`crate::driver::DriverError`],
//! because they are always confined behind the dispatcher boundary and
//! converted into `Failed` action results rather than propagated upward.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, FomError>;

#[derive(Error, Debug)]
pub enum FomError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read resource catalog '{path}': {source}")]
    ResourceRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Module startup failed: {0}")]
    Startup(#[from] crate::driver::DriverError),
}
