//! Drives a trial controller from backend setup to close

use crate::context::TrialContext;
use crate::controller::TrialController;
use crate::workload::WorkloadSource;
use harness_core::{DistributedBackend, EnvContext, LogHandle, Result};
use tracing::{error, info};

/// Run a constructed controller to completion and close it
///
/// Applies the controller's logging policy, then runs `initialize_wrapper`
/// and `run`. `close` runs whenever `run` was entered, whether it succeeded
/// or failed; a run error takes precedence over a close error.
pub fn run_trial<C: TrialController>(controller: &mut C, logs: &LogHandle) -> Result<()> {
    logs.apply(controller.core().logging_policy())?;

    let outcome = controller
        .initialize_wrapper()
        .and_then(|()| controller.run());

    if !controller.core().state().can_close() {
        // Never reached `run`; the core releases the context on drop
        return outcome;
    }

    let closed = controller.close();
    if let Err(e) = &closed {
        error!(error = %e, "Failed to close trial controller");
    }
    outcome.and(closed)
}

/// Full per-process startup sequence
///
/// Initializes the backend before `build` constructs the user trial and its
/// context, so process-group membership exists by the time the context
/// needs it.
pub fn execute_trial<C, F>(
    env: EnvContext,
    backend: DistributedBackend,
    workloads: Option<Box<dyn WorkloadSource>>,
    logs: &LogHandle,
    build: F,
) -> Result<()>
where
    C: TrialController,
    F: FnOnce(&C::Setup, &EnvContext) -> Result<(C::Trial, Box<dyn TrialContext>)>,
{
    let setup = C::pre_execute_hook(&env, backend)?;
    let (trial, context) = build(&setup, &env)?;

    let mut controller = C::from_trial(trial, context, env, backend, workloads)?;
    info!(
        session = %controller.core().session_id(),
        chief = controller.core().is_chief(),
        "Starting trial"
    );
    run_trial(&mut controller, logs)
}
