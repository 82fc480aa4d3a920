//! Single-process controller used when no distributed backend is active

use super::{resolve_setup, CachedSetup};
use crate::context::{Trial, TrialContext};
use crate::controller::{ControllerCore, TrialController};
use crate::workload::WorkloadSource;
use harness_core::{DistributedBackend, DistributedContext, EnvContext, Error, Result};

static LOCAL_SETUP: CachedSetup = CachedSetup::new();

pub struct LocalTrialController<T: Trial> {
    core: ControllerCore,
    trial: T,
}

impl<T: Trial> LocalTrialController<T> {
    pub fn trial(&self) -> &T {
        &self.trial
    }
}

impl<T: Trial> TrialController for LocalTrialController<T> {
    type Trial = T;
    type Setup = DistributedContext;

    fn pre_execute_hook(
        _env: &EnvContext,
        backend: DistributedBackend,
    ) -> Result<DistributedContext> {
        resolve_setup(&LOCAL_SETUP, "local", DistributedBackend::None, backend, || {
            Ok(DistributedContext::single_process())
        })
    }

    fn from_trial(
        trial: T,
        context: Box<dyn TrialContext>,
        env: EnvContext,
        backend: DistributedBackend,
        workloads: Option<Box<dyn WorkloadSource>>,
    ) -> Result<Self> {
        if context.distributed().is_distributed() {
            return Err(Error::configuration(format!(
                "local controller cannot drive a job with {} workers",
                context.distributed().size()
            )));
        }
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
}
