//! Error types for the trial harness

use thiserror::Error;

/// Result type alias using the harness Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the trial harness and launch bootstrap
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Both USE_HOROVOD and USE_TORCH_DISTRIBUTED are set; only one backend may be active")]
    ConflictingBackends,

    // Cluster placement errors
    #[error("Cluster info unavailable: {reason}")]
    ClusterInfoUnavailable { reason: String },

    // Lifecycle errors
    #[error("Contract violation: {operation} called while controller is {state}")]
    ContractViolation { operation: String, state: String },

    #[error("No workload stream attached to this controller")]
    NoWorkloadSource,

    // Collaborator errors
    #[error("Trial error: {message}")]
    Trial { message: String },

    #[error("Collective backend error: {message}")]
    Collective { message: String },

    // Launch errors
    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Shorthand for the capability-mismatch error raised at construction
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Error::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true if this error must terminate the process
    ///
    /// The harness never retries; fatal errors are the ones that indicate the
    /// job itself is misconfigured or misused rather than a collaborator
    /// reporting a failure.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Configuration { .. }
                | Error::InvalidConfig { .. }
                | Error::ConflictingBackends
                | Error::ClusterInfoUnavailable { .. }
                | Error::ContractViolation { .. }
                | Error::Internal { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_fatal() {
        let err = Error::configuration("trial type does not support mixed precision");
        assert!(err.is_fatal());
        assert!(Error::ConflictingBackends.is_fatal());

        let err = Error::Trial {
            message: "loss is NaN".to_string(),
        };
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = Error::ContractViolation {
            operation: "run".to_string(),
            state: "Closed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Contract violation: run called while controller is Closed"
        );

        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
