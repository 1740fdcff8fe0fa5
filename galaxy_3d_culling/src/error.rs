//! Error types for the Galaxy3D culling core
//!
//! Almost nothing in the per-frame path returns an error: invalid handles are
//! logged and ignored, degenerate geometry is clamped or skipped and budget
//! overruns are deferred. Errors are reserved for setup paths (settings
//! parsing, worker pool construction).

use std::fmt;

/// Result type for Galaxy3D culling operations
pub type Result<T> = std::result::Result<T, Error>;

/// Galaxy3D culling errors
#[derive(Debug, Clone)]
pub enum Error {
    /// A handle (instance, scenario, camera) does not refer to a live object
    InvalidHandle(String),

    /// Settings could not be parsed or failed validation
    InvalidConfig(String),

    /// Initialization failed (worker pool, subsystems)
    InitializationFailed(String),

    /// Error reported by a collaborator (render backend, resource storage)
    BackendError(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidHandle(msg) => write!(f, "Invalid handle: {}", msg),
            Error::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Log an error and build an `Error::BackendError` from it.
///
/// # Example
///
/// ```ignore
/// return Err(engine_err!("galaxy3d::SceneManager", "Worker pool failed: {}", e));
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::engine_error!($source, "{}", message);
        $crate::galaxy3d::Error::BackendError(message)
    }};
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
