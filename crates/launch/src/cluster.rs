//! Cluster placement lookup

use harness_core::{ClusterInfo, Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Variable overriding where cluster info is read from
pub const CLUSTER_INFO_PATH_ENV: &str = "DET_CLUSTER_INFO_PATH";

/// Where the cluster writes placement info inside a task container
pub const DEFAULT_CLUSTER_INFO_PATH: &str = "/run/determined/info.json";

/// Anything that can report this node's placement
pub trait ClusterInfoSource {
    /// Fetch validated placement info
    fn cluster_info(&self) -> Result<ClusterInfo>;
}

impl ClusterInfoSource for ClusterInfo {
    fn cluster_info(&self) -> Result<ClusterInfo> {
        self.validate()?;
        Ok(self.clone())
    }
}

/// Cluster info stored as JSON on disk
#[derive(Debug, Clone)]
pub struct FileClusterInfo {
    path: PathBuf,
}

impl FileClusterInfo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use `DET_CLUSTER_INFO_PATH`, falling back to the container default
    pub fn from_env() -> Self {
        let path = std::env::var_os(CLUSTER_INFO_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CLUSTER_INFO_PATH));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ClusterInfoSource for FileClusterInfo {
    fn cluster_info(&self) -> Result<ClusterInfo> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| Error::ClusterInfoUnavailable {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;
        let info: ClusterInfo =
            serde_json::from_str(&raw).map_err(|e| Error::ClusterInfoUnavailable {
                reason: format!("failed to parse {}: {}", self.path.display(), e),
            })?;
        info.validate()?;

        debug!(
            path = %self.path.display(),
            nodes = info.num_nodes(),
            rank = info.container_rank,
            "Loaded cluster info"
        );
        Ok(info)
    }
}
