//! Controller for trials using Horovod

use super::{enable_mixed_precision_if_requested, read_rank_var, resolve_setup, CachedSetup};
use crate::context::{Trial, TrialContext};
use crate::controller::{ControllerCore, TrialController};
use crate::workload::WorkloadSource;
use harness_core::{DistributedBackend, DistributedContext, EnvContext, Result};

static HOROVOD_SETUP: CachedSetup = CachedSetup::new();

/// Position reported by horovodrun through `HOROVOD_RANK`,
/// `HOROVOD_CROSS_RANK` and `HOROVOD_SIZE`
pub fn horovod_distributed_context<F>(lookup: F) -> Result<DistributedContext>
where
    F: Fn(&str) -> Option<String>,
{
    let launcher = "horovodrun";
    DistributedContext::new(
        read_rank_var(&lookup, "HOROVOD_RANK", launcher)?,
        read_rank_var(&lookup, "HOROVOD_CROSS_RANK", launcher)?,
        read_rank_var(&lookup, "HOROVOD_SIZE", launcher)?,
    )
}

/// Horovod controller; training metrics are reported per worker
pub struct HorovodTrialController<T: Trial> {
    core: ControllerCore,
    trial: T,
}

impl<T: Trial> HorovodTrialController<T> {
    pub fn trial(&self) -> &T {
        &self.trial
    }
}

impl<T: Trial> TrialController for HorovodTrialController<T> {
    type Trial = T;
    type Setup = DistributedContext;

    fn pre_execute_hook(
        _env: &EnvContext,
        backend: DistributedBackend,
    ) -> Result<DistributedContext> {
        resolve_setup(
            &HOROVOD_SETUP,
            "horovod",
            DistributedBackend::Horovod,
            backend,
            || horovod_distributed_context(|k| std::env::var(k).ok()),
        )
    }

    fn from_trial(
        trial: T,
        context: Box<dyn TrialContext>,
        env: EnvContext,
        backend: DistributedBackend,
        workloads: Option<Box<dyn WorkloadSource>>,
    ) -> Result<Self> {
        let core = ControllerCore::new::<Self>(context, env, backend, workloads)?;
        Ok(Self { core, trial })
    }

    fn run(&mut self) -> Result<()> {
        self.core.run_workloads(&mut self.trial)
    }

    fn close(&mut self) -> Result<()> {
        self.core.close()
    }

    fn core(&self) -> &ControllerCore {
        &self.core
    }

    fn supports_mixed_precision() -> bool {
        true
    }

    fn initialize_wrapper(&mut self) -> Result<()> {
        self.core.ensure_constructed("initialize_wrapper")?;
        enable_mixed_precision_if_requested(&self.core, &mut self.trial)
    }
}
