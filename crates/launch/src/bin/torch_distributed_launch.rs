//! Bootstrap binary entry point
//!
//! Hands this node off to torch.distributed.run and exits with its status.

use harness_core::LaunchConfig;
use launch::FileClusterInfo;
use tracing::Level;

fn main() {
    if let Err(e) = harness_core::logging::init(Level::INFO) {
        eprintln!("{}", e);
    }

    let source = FileClusterInfo::from_env();
    tracing::debug!(path = %source.path().display(), "Reading cluster info");
    let code = match launch::launch(&source, &LaunchConfig::default()) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Distributed launch failed");
            1
        }
    };

    std::process::exit(code);
}
