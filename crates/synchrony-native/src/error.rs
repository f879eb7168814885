//! Connectivity Error Types
//!
//! Errors raised by the numeric pipeline using `thiserror`. Core validation
//! errors convert in with `?`.

use synchrony_core::error::{ConfigError, NetworkError, ShapeError};
use thiserror::Error;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum ConnectivityError {
    /// Invalid run configuration
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Trial dimensions disagree
    #[error("Invalid trial shape: {0}")]
    Shape(#[from] ShapeError),

    /// Graph construction failed
    #[error("Network construction failed: {0}")]
    Network(#[from] NetworkError),

    /// Numeric routine failed
    #[error("Numeric failure in {operation}: {reason}")]
    Numeric {
        /// Operation that failed
        operation: &'static str,
        /// Reason
        reason: String,
    },

    /// Worker pool could not be built
    #[error("Worker pool construction failed: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type for connectivity operations
pub type ConnectivityResult<T> = Result<T, ConnectivityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_convert() {
        fn fails() -> ConnectivityResult<()> {
            Err(ConfigError::NoChannels)?;
            Ok(())
        }
        let err = fails().unwrap_err();
        assert!(matches!(err, ConnectivityError::Config(ConfigError::NoChannels)));
        assert!(err.to_string().starts_with("Invalid configuration"));
    }

    #[test]
    fn test_shape_error_message() {
        let err = ConnectivityError::from(ShapeError::ChannelMismatch { trial: 2, expected: 4, got: 3 });
        assert!(err.to_string().contains("Trial 2 has 3 channels"));
    }
}
