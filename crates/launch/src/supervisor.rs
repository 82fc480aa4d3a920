//! Blocking child-process supervision

use crate::command::LaunchCommand;
use harness_core::{Error, Result};
use std::process::ExitStatus;
use tracing::{info, warn};

/// Exit code reported when the platform gives neither a code nor a signal
const UNKNOWN_EXIT_CODE: i32 = 1;

/// Spawn `command`, wait for it, and return its exit code unchanged
///
/// There is no retry: whatever the child reports is what the caller sees.
pub fn supervise(command: &LaunchCommand) -> Result<i32> {
    info!(command = %command, "Spawning launcher");

    let status = command
        .to_command()
        .status()
        .map_err(|source| Error::Launch {
            program: command.program.clone(),
            source,
        })?;

    let code = exit_code(status);
    if code == 0 {
        info!(exit_code = code, "Launcher exited");
    } else {
        warn!(exit_code = code, "Launcher exited with non-zero status");
    }
    Ok(code)
}

/// Shell-style exit code; a signal-killed child maps to `128 + signal`
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    UNKNOWN_EXIT_CODE
}
