//! The bootstrap flags the torch backend in its own environment
//!
//! Kept in its own test binary: it reads and writes process-wide variables
//! that the other bootstrap tests would race on.

#![cfg(unix)]

use anyhow::Result;
use harness_core::{DistributedBackend, Error, LaunchConfig, USE_HOROVOD, USE_TORCH_DISTRIBUTED};
use launch::FileClusterInfo;
use std::io::Write;

fn shell_launcher(script: &str) -> LaunchConfig {
    LaunchConfig {
        launcher_program: "sh".to_string(),
        launcher_args: vec!["-c".to_string(), script.to_string(), "launcher".to_string()],
        ..LaunchConfig::default()
    }
}

#[test]
fn test_backend_flag_set_only_after_cluster_info_loads() -> Result<()> {
    std::env::remove_var(USE_TORCH_DISTRIBUTED);
    std::env::remove_var(USE_HOROVOD);

    let dir = tempfile::tempdir()?;
    let missing = FileClusterInfo::new(dir.path().join("missing.json"));
    let err = launch::launch(&missing, &shell_launcher("exit 0")).unwrap_err();
    assert!(matches!(err, Error::ClusterInfoUnavailable { .. }));
    assert!(std::env::var(USE_TORCH_DISTRIBUTED).is_err());
    assert_eq!(DistributedBackend::from_env()?, DistributedBackend::None);

    let mut file = tempfile::NamedTempFile::new()?;
    write!(
        file,
        "{}",
        serde_json::json!({ "container_addrs": ["10.0.0.1", "10.0.0.2"], "container_rank": 0 })
    )?;
    let code = launch::launch(&FileClusterInfo::new(file.path()), &shell_launcher("exit 0"))?;
    assert_eq!(code, 0);
    assert_eq!(std::env::var(USE_TORCH_DISTRIBUTED).as_deref(), Ok("True"));
    assert_eq!(DistributedBackend::from_env()?, DistributedBackend::Torch);
    Ok(())
}
