//! Distributed backend selection
//!
//! The launch bootstrap decides which collective-communication library a
//! trial uses and records the decision as an environment flag. This module
//! only reads that decision back; it never picks a backend on its own.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Flag set when Horovod owns collective communication
pub const USE_HOROVOD: &str = "USE_HOROVOD";

/// Flag set when torch.distributed owns collective communication
pub const USE_TORCH_DISTRIBUTED: &str = "USE_TORCH_DISTRIBUTED";

/// Collective-communication backend assumed to be initialized
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DistributedBackend {
    /// Single-process fallback
    #[default]
    None,

    Horovod,

    Torch,
}

impl DistributedBackend {
    /// Resolve the backend from the process environment
    pub fn from_env() -> Result<Self> {
        Self::detect(|key| std::env::var(key).ok())
    }

    /// Resolve the backend from an arbitrary variable lookup
    ///
    /// A flag counts as set when it is present and non-empty; its content is
    /// otherwise ignored.
    pub fn detect<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let truthy = |key: &str| lookup(key).is_some_and(|v| !v.is_empty());

        match (truthy(USE_HOROVOD), truthy(USE_TORCH_DISTRIBUTED)) {
            (true, true) => Err(Error::ConflictingBackends),
            (true, false) => Ok(DistributedBackend::Horovod),
            (false, true) => Ok(DistributedBackend::Torch),
            (false, false) => Ok(DistributedBackend::None),
        }
    }

    pub fn uses_horovod(&self) -> bool {
        matches!(self, DistributedBackend::Horovod)
    }

    pub fn uses_torch(&self) -> bool {
        matches!(self, DistributedBackend::Torch)
    }
}

impl fmt::Display for DistributedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DistributedBackend::None => "none",
            DistributedBackend::Horovod => "horovod",
            DistributedBackend::Torch => "torch",
        };
        f.write_str(name)
    }
}
