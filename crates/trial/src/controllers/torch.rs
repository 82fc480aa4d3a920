//! Controller for trials using torch.distributed

use super::{enable_mixed_precision_if_requested, read_rank_var, resolve_setup, CachedSetup};
use crate::context::{Trial, TrialContext};
use crate::controller::{ControllerCore, TrialController};
use crate::workload::WorkloadSource;
use harness_core::{DistributedBackend, DistributedContext, EnvContext, Result};

static TORCH_SETUP: CachedSetup = CachedSetup::new();

/// Position reported by torch.distributed.run through `RANK`, `GROUP_RANK`
/// and `WORLD_SIZE`
pub fn torch_distributed_context<F>(lookup: F) -> Result<DistributedContext>
where
    F: Fn(&str) -> Option<String>,
{
    let launcher = "torch.distributed.run";
    DistributedContext::new(
        read_rank_var(&lookup, "RANK", launcher)?,
        read_rank_var(&lookup, "GROUP_RANK", launcher)?,
        read_rank_var(&lookup, "WORLD_SIZE", launcher)?,
    )
}

pub struct TorchTrialController<T: Trial> {
    core: ControllerCore,
    trial: T,
}

impl<T: Trial> TorchTrialController<T> {
    pub fn trial(&self) -> &T {
        &self.trial
    }
}

impl<T: Trial> TrialController for TorchTrialController<T> {
    type Trial = T;
    type Setup = DistributedContext;

    fn pre_execute_hook(
        _env: &EnvContext,
        backend: DistributedBackend,
    ) -> Result<DistributedContext> {
        resolve_setup(&TORCH_SETUP, "torch", DistributedBackend::Torch, backend, || {
            torch_distributed_context(|k| std::env::var(k).ok())
        })
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

    fn supports_averaging_training_metrics() -> bool {
        true
    }

    fn initialize_wrapper(&mut self) -> Result<()> {
        self.core.ensure_constructed("initialize_wrapper")?;
        enable_mixed_precision_if_requested(&self.core, &mut self.trial)
    }
}
