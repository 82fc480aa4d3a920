//! Launch - per-node bootstrap for torch distributed training
//!
//! Runs once per node before the harness exists:
//! 1. Read this node's placement from the cluster
//! 2. Pick the chief (the first container address)
//! 3. Flag the torch backend for the harness
//! 4. Run torch.distributed.run and pass its exit code through
//!
//! # Example
//!
//! ```no_run
//! use harness_core::LaunchConfig;
//! use launch::FileClusterInfo;
//!
//! # fn example() -> harness_core::Result<()> {
//! let code = launch::launch(&FileClusterInfo::from_env(), &LaunchConfig::default())?;
//! std::process::exit(code);
//! # }
//! ```

mod cluster;
mod command;
mod supervisor;

pub use cluster::{
    ClusterInfoSource, FileClusterInfo, CLUSTER_INFO_PATH_ENV, DEFAULT_CLUSTER_INFO_PATH,
};
pub use command::LaunchCommand;
pub use supervisor::{exit_code, supervise};

use harness_core::{LaunchConfig, Result, USE_TORCH_DISTRIBUTED};
use tracing::info;

/// Bootstrap this node and return the launcher's exit code
///
/// Fails before spawning anything when cluster info is unavailable.
pub fn launch(source: &dyn ClusterInfoSource, config: &LaunchConfig) -> Result<i32> {
    let info = source.cluster_info()?;
    let command = LaunchCommand::torch_distributed(&info, config)?;

    info!(
        rank = info.container_rank,
        nnodes = info.num_nodes(),
        chief = %info.chief_addr()?,
        "Bootstrapping torch distributed launch"
    );

    std::env::set_var(USE_TORCH_DISTRIBUTED, "True");
    supervise(&command)
}
