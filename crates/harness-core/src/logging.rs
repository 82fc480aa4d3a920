//! Logging setup and per-worker verbosity policy
//!
//! Non-chief workers in a multi-worker job are quieted so that a human
//! watching the job sees one coherent stream from the chief. The decision is
//! a plain value (`LoggingPolicy`); applying it to the process-wide
//! subscriber happens once, through the `LogHandle` returned by [`init`].

use crate::{DistributedContext, Error, Result};
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};
use tracing_subscriber::{EnvFilter, Registry};

/// Verbosity adjustment a worker should apply at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingPolicy {
    /// Leave the process log level alone
    Keep,

    /// Set the process log level to the given level
    Lower(Level),
}

impl LoggingPolicy {
    /// Policy for a worker at the given position in the job
    pub fn for_worker(distributed: &DistributedContext, debug_enabled: bool) -> Self {
        if distributed.is_distributed() && !distributed.is_chief() {
            let level = if debug_enabled {
                Level::DEBUG
            } else {
                Level::WARN
            };
            LoggingPolicy::Lower(level)
        } else {
            LoggingPolicy::Keep
        }
    }
}

/// Handle to the reloadable process-wide level filter
#[derive(Clone)]
pub struct LogHandle {
    handle: reload::Handle<LevelFilter, Registry>,
}

impl LogHandle {
    /// Wrap an existing reload handle
    pub fn from_handle(handle: reload::Handle<LevelFilter, Registry>) -> Self {
        Self { handle }
    }

    /// Current process-wide level, if the subscriber is still alive
    pub fn current_level(&self) -> Option<LevelFilter> {
        self.handle.clone_current()
    }

    /// Apply a worker logging policy
    pub fn apply(&self, policy: LoggingPolicy) -> Result<()> {
        match policy {
            LoggingPolicy::Keep => Ok(()),
            LoggingPolicy::Lower(level) => self
                .handle
                .reload(LevelFilter::from_level(level))
                .map_err(|e| Error::Internal {
                    message: format!("Failed to set log level to {}: {}", level, e),
                }),
        }
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` directives, when present, are applied on top of the reloadable
/// level filter.
pub fn init(default_level: Level) -> Result<LogHandle> {
    let (level_layer, handle) = reload::Layer::new(LevelFilter::from_level(default_level));

    tracing_subscriber::registry()
        .with(level_layer)
        .with(EnvFilter::try_from_default_env().ok())
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| Error::Internal {
            message: format!("Failed to install tracing subscriber: {}", e),
        })?;

    Ok(LogHandle::from_handle(handle))
}
