//! End-to-end tests for the per-node launch bootstrap
//!
//! The launcher is replaced with `sh -c` so the tests can observe the exact
//! argument vector and environment the child receives.

#![cfg(unix)]

use anyhow::Result;
use harness_core::{ClusterInfo, Error, LaunchConfig};
use launch::{ClusterInfoSource, FileClusterInfo};
use std::io::Write;

fn shell_launcher(script: &str) -> LaunchConfig {
    LaunchConfig {
        launcher_program: "sh".to_string(),
        // "launcher" becomes $0; the bootstrap's arguments follow as $1..
        launcher_args: vec!["-c".to_string(), script.to_string(), "launcher".to_string()],
        ..LaunchConfig::default()
    }
}

fn cluster_file(addrs: &[&str], rank: u32) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::new()?;
    let info = serde_json::json!({ "container_addrs": addrs, "container_rank": rank });
    write!(file, "{}", info)?;
    Ok(file)
}

#[test]
fn test_child_receives_rank_and_chief() -> Result<()> {
    let file = cluster_file(&["10.0.0.1", "10.0.0.2", "10.0.0.3"], 2)?;
    let source = FileClusterInfo::new(file.path());

    // $2 master_addr, $4 master_port, $6 rank, $8 nnodes, $10 module, $12 chief ip
    let script = r#"
        test "$USE_TORCH_DISTRIBUTED" = True || exit 10
        test "$2" = 10.0.0.1 || exit 11
        test "$4" = 7555 || exit 12
        test "$6" = 2 || exit 13
        test "$8" = 3 || exit 14
        test "${10}" = determined.exec.harness || exit 15
        test "${12}" = 10.0.0.1 || exit 16
    "#;
    let code = launch::launch(&source, &shell_launcher(script))?;
    assert_eq!(code, 0);
    Ok(())
}

#[test]
fn test_exit_code_is_passed_through() -> Result<()> {
    let info = ClusterInfo::new(vec!["10.0.0.1".to_string()], 0)?;
    for code in [0, 1, 137] {
        let exit = launch::launch(&info, &shell_launcher(&format!("exit {}", code)))?;
        assert_eq!(exit, code);
    }
    Ok(())
}

#[test]
fn test_unavailable_cluster_info_spawns_nothing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let marker = dir.path().join("spawned");
    let script = format!("touch {}", marker.display());

    let source = FileClusterInfo::new(dir.path().join("missing.json"));
    let err = launch::launch(&source, &shell_launcher(&script)).unwrap_err();
    assert!(matches!(err, Error::ClusterInfoUnavailable { .. }));
    assert!(err.is_fatal());
    assert!(!marker.exists());

    let file = cluster_file(&["10.0.0.1", "10.0.0.2"], 5)?;
    let err = launch::launch(&FileClusterInfo::new(file.path()), &shell_launcher(&script))
        .unwrap_err();
    assert!(matches!(err, Error::ClusterInfoUnavailable { .. }));
    assert!(!marker.exists());
    Ok(())
}

#[test]
fn test_static_cluster_info_source() -> Result<()> {
    let info = ClusterInfo::new(vec!["a".to_string(), "b".to_string()], 1)?;
    assert_eq!(info.cluster_info()?, info);
    Ok(())
}
