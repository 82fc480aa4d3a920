//! Harness Core - Foundation for the trial harness
//!
//! Provides error handling, configuration, distributed-role types, backend
//! detection and logging policy shared by the trial controller and the
//! launch bootstrap.

pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use backend::{DistributedBackend, USE_HOROVOD, USE_TORCH_DISTRIBUTED};
pub use config::{EnvContext, ExperimentConfig, LaunchConfig, ProfilingConfig};
pub use error::{Error, Result};
pub use logging::{LogHandle, LoggingPolicy};
pub use types::*;
