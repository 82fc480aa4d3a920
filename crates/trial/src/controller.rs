//! Trial controller contract and shared lifecycle state
//!
//! A concrete controller exists per collective-communication backend. Each
//! one owns a [`ControllerCore`], which performs the construction-time work
//! every backend shares (profiler setup, capability validation, chief
//! election, logging policy) and enforces the lifecycle:
//!
//! ```text
//! Constructed -> Running -> Completed | Failed -> Closed
//! ```

use crate::context::{mean_metrics, Metrics, Trial, TrialContext};
use crate::profiler::ProfilerAgent;
use crate::workload::{Workload, WorkloadKind, WorkloadResult, WorkloadSource};
use harness_core::{
    DistributedBackend, DistributedContext, EnvContext, Error, LoggingPolicy, Result,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lifecycle state of a trial controller
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TrialState {
    /// Built, `run` not yet called
    Constructed,

    /// `run` in progress
    Running,

    /// `run` returned successfully
    Completed,

    /// `run` returned an error
    Failed,

    /// Resources released; terminal
    Closed,
}

impl TrialState {
    /// Returns true if `run` may be called
    pub fn can_run(&self) -> bool {
        matches!(self, TrialState::Constructed)
    }

    /// Returns true if `close` may be called
    pub fn can_close(&self) -> bool {
        matches!(
            self,
            TrialState::Running | TrialState::Completed | TrialState::Failed
        )
    }
}

impl fmt::Display for TrialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Lifecycle protocol implemented once per distributed backend
pub trait TrialController: Sized {
    /// User training procedure driven by this controller
    type Trial: Trial;

    /// Value produced by backend initialization
    type Setup;

    /// Backend-specific initialization
    ///
    /// Must complete in every process before any process builds its trial
    /// context. Repeated calls return the first call's result.
    fn pre_execute_hook(env: &EnvContext, backend: DistributedBackend) -> Result<Self::Setup>;

    /// Bind a user trial to a new controller
    fn from_trial(
        trial: Self::Trial,
        context: Box<dyn TrialContext>,
        env: EnvContext,
        backend: DistributedBackend,
        workloads: Option<Box<dyn WorkloadSource>>,
    ) -> Result<Self>;

    /// Drive the trial through its workloads; callable once
    fn run(&mut self) -> Result<()>;

    /// Release the trial context; callable once, after `run`
    fn close(&mut self) -> Result<()>;

    /// Shared lifecycle state
    fn core(&self) -> &ControllerCore;

    fn supports_mixed_precision() -> bool {
        false
    }

    fn supports_averaging_training_metrics() -> bool {
        false
    }

    /// Extension point between construction and `run`
    fn initialize_wrapper(&mut self) -> Result<()> {
        self.core().ensure_constructed("initialize_wrapper")
    }
}

/// Fail construction if the experiment asks for a capability `C` lacks
pub fn check_supports_configuration<C: TrialController>(env: &EnvContext) -> Result<()> {
    let config = &env.experiment_config;
    if config.averaging_training_metrics_enabled() && !C::supports_averaging_training_metrics() {
        return Err(Error::configuration(
            "trial type does not support requested averaging of training metrics",
        ));
    }
    if config.mixed_precision_enabled() && !C::supports_mixed_precision() {
        return Err(Error::configuration(
            "trial type does not support requested mixed precision training",
        ));
    }
    Ok(())
}

/// State and behavior shared by every concrete controller
pub struct ControllerCore {
    /// Correlates log lines from one controller
    session_id: Uuid,

    /// User training context
    context: Box<dyn TrialContext>,

    /// Environment snapshot
    env: EnvContext,

    /// Workload stream, taken when `run` starts
    workloads: Option<Box<dyn WorkloadSource>>,

    /// Profiler bound to this rank
    prof: ProfilerAgent,

    /// Backend selected upstream
    backend: DistributedBackend,

    /// Distributed position, copied from the context
    distributed: DistributedContext,

    batch_size: u64,
    scheduling_unit: u64,
    is_chief: bool,
    logging_policy: LoggingPolicy,

    /// Lifecycle state
    state: TrialState,

    /// Global index of the next batch to train
    batches_trained: u64,

    /// Completed workloads
    results: Vec<WorkloadResult>,
}

impl ControllerCore {
    /// Build the shared state for controller type `C`
    pub fn new<C: TrialController>(
        context: Box<dyn TrialContext>,
        env: EnvContext,
        backend: DistributedBackend,
        workloads: Option<Box<dyn WorkloadSource>>,
    ) -> Result<Self> {
        let distributed = *context.distributed();
        let prof = ProfilerAgent::from_env(&env, distributed.cross_rank(), distributed.rank())?;

        check_supports_configuration::<C>(&env)?;

        let batch_size = context.per_slot_batch_size();
        let scheduling_unit = env.experiment_config.scheduling_unit();
        if scheduling_unit == 0 {
            return Err(Error::invalid_config("scheduling_unit must be at least 1"));
        }

        let is_chief = distributed.is_chief();
        let logging_policy =
            LoggingPolicy::for_worker(&distributed, env.experiment_config.debug_enabled());

        let session_id = Uuid::new_v4();
        info!(
            session = %session_id,
            rank = distributed.rank(),
            cross_rank = distributed.cross_rank(),
            size = distributed.size(),
            backend = %backend,
            batch_size,
            scheduling_unit,
            "Trial controller constructed"
        );

        Ok(Self {
            session_id,
            context,
            env,
            workloads,
            prof,
            backend,
            distributed,
            batch_size,
            scheduling_unit,
            is_chief,
            logging_policy,
            state: TrialState::Constructed,
            batches_trained: 0,
            results: Vec::new(),
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn env(&self) -> &EnvContext {
        &self.env
    }

    pub fn backend(&self) -> DistributedBackend {
        self.backend
    }

    pub fn uses_horovod(&self) -> bool {
        self.backend.uses_horovod()
    }

    pub fn uses_torch(&self) -> bool {
        self.backend.uses_torch()
    }

    pub fn distributed(&self) -> &DistributedContext {
        &self.distributed
    }

    /// Per-slot batch size
    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    pub fn scheduling_unit(&self) -> u64 {
        self.scheduling_unit
    }

    pub fn is_chief(&self) -> bool {
        self.is_chief
    }

    /// Verbosity change the caller should apply at startup
    pub fn logging_policy(&self) -> LoggingPolicy {
        self.logging_policy
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    pub fn profiler(&self) -> &ProfilerAgent {
        &self.prof
    }

    /// Workloads completed so far
    pub fn results(&self) -> &[WorkloadResult] {
        &self.results
    }

    pub fn batches_trained(&self) -> u64 {
        self.batches_trained
    }

    fn violation(&self, operation: &str) -> Error {
        error!(
            session = %self.session_id,
            operation,
            state = %self.state,
            "Trial controller lifecycle violated"
        );
        Error::ContractViolation {
            operation: operation.to_string(),
            state: self.state.to_string(),
        }
    }

    /// Reject `operation` unless `run` has not started yet
    pub fn ensure_constructed(&self, operation: &str) -> Result<()> {
        if self.state.can_run() {
            Ok(())
        } else {
            Err(self.violation(operation))
        }
    }

    /// Run the workload loop against `trial`
    pub fn run_workloads<T: Trial + ?Sized>(&mut self, trial: &mut T) -> Result<()> {
        if !self.state.can_run() {
            return Err(self.violation("run"));
        }
        self.state = TrialState::Running;

        let outcome = match self.workloads.take() {
            Some(mut source) => self.drive(source.as_mut(), trial),
            None => Err(Error::NoWorkloadSource),
        };

        match &outcome {
            Ok(()) => {
                self.state = TrialState::Completed;
                info!(
                    session = %self.session_id,
                    workloads = self.results.len(),
                    batches = self.batches_trained,
                    "Trial run completed"
                );
            }
            Err(e) => {
                self.state = TrialState::Failed;
                error!(session = %self.session_id, error = %e, "Trial run failed");
            }
        }
        outcome
    }

    fn drive<T: Trial + ?Sized>(
        &mut self,
        source: &mut dyn WorkloadSource,
        trial: &mut T,
    ) -> Result<()> {
        while let Some(workload) = source.next_workload()? {
            debug!(session = %self.session_id, ?workload, "Dispatching workload");

            let result = match workload {
                Workload::RunStep {
                    step_id,
                    num_batches,
                } => self.train_step(trial, step_id, num_batches)?,
                Workload::ComputeValidationMetrics { step_id } => {
                    let metrics = trial.evaluate()?;
                    WorkloadResult::new(step_id, WorkloadKind::ComputeValidationMetrics, 0, metrics)
                }
                Workload::Checkpoint { step_id } => {
                    // Only the chief writes checkpoints
                    if self.is_chief {
                        trial.save_checkpoint(step_id)?;
                        info!(step_id, "Checkpoint saved");
                    }
                    WorkloadResult::new(step_id, WorkloadKind::Checkpoint, 0, Metrics::new())
                }
                Workload::Terminate => {
                    info!(session = %self.session_id, "Terminate workload received");
                    break;
                }
            };
            self.results.push(result);
        }
        Ok(())
    }

    fn train_step<T: Trial + ?Sized>(
        &mut self,
        trial: &mut T,
        step_id: u64,
        num_batches: u64,
    ) -> Result<WorkloadResult> {
        let num_batches = if num_batches == 0 {
            self.scheduling_unit
        } else {
            num_batches
        };

        let mut per_batch = Vec::new();
        for _ in 0..num_batches {
            self.prof.update_batch_idx(self.batches_trained);
            per_batch.push(trial.train_batch(self.batches_trained)?);
            self.batches_trained += 1;
        }

        let mut metrics = mean_metrics(&per_batch);
        if self.env.experiment_config.averaging_training_metrics_enabled()
            && self.distributed.is_distributed()
        {
            metrics = self.context.all_reduce_mean(&metrics)?;
        }

        Ok(WorkloadResult::new(
            step_id,
            WorkloadKind::RunStep,
            num_batches,
            metrics,
        ))
    }

    /// Release the trial context
    pub fn close(&mut self) -> Result<()> {
        if !self.state.can_close() {
            return Err(self.violation("close"));
        }
        self.state = TrialState::Closed;
        debug!(session = %self.session_id, "Closing trial context");
        self.context.close()
    }
}

impl Drop for ControllerCore {
    fn drop(&mut self) {
        if self.state != TrialState::Closed {
            warn!(
                session = %self.session_id,
                state = %self.state,
                "Trial controller dropped without close; releasing context"
            );
            if let Err(e) = self.context.close() {
                error!(session = %self.session_id, error = %e, "Failed to release trial context");
            }
        }
    }
}
