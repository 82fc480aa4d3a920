//! Collaborator interfaces wrapped by a trial controller
//!
//! `Trial` is the user's training procedure and `TrialContext` is the
//! per-process training context it runs in. The controller only needs the
//! narrow surface declared here.

use harness_core::{DistributedContext, EnvContext, Error, Result, StepId};
use std::collections::BTreeMap;

/// Named scalar metrics reported by a training or validation pass
pub type Metrics = BTreeMap<String, f64>;

/// A user-supplied training procedure
pub trait Trial: Send {
    /// Train on one batch and return its metrics
    fn train_batch(&mut self, batch_idx: u64) -> Result<Metrics>;

    /// Compute validation metrics over the full validation set
    fn evaluate(&mut self) -> Result<Metrics>;

    /// Persist model state; only invoked on the chief
    fn save_checkpoint(&mut self, _step_id: StepId) -> Result<()> {
        Ok(())
    }

    /// Switch the training step to mixed precision
    fn enable_mixed_precision(&mut self) -> Result<()> {
        Err(Error::configuration(
            "trial does not implement mixed precision training",
        ))
    }
}

/// Per-process training context
pub trait TrialContext: Send {
    /// Batch size processed by a single slot
    fn per_slot_batch_size(&self) -> u64;

    /// This process's position in the distributed job
    fn distributed(&self) -> &DistributedContext;

    /// Average metrics across every worker in the job
    ///
    /// The default is the single-process identity; contexts bound to a
    /// collective backend override it.
    fn all_reduce_mean(&mut self, metrics: &Metrics) -> Result<Metrics> {
        Ok(metrics.clone())
    }

    /// Release resources held by the context
    fn close(&mut self) -> Result<()>;
}

/// Trial context with no collective backend attached
#[derive(Debug, Clone)]
pub struct BasicTrialContext {
    distributed: DistributedContext,
    per_slot_batch_size: u64,
    closed: bool,
}

impl BasicTrialContext {
    pub fn new(distributed: DistributedContext, per_slot_batch_size: u64) -> Self {
        Self {
            distributed,
            per_slot_batch_size,
            closed: false,
        }
    }

    /// Derive the per-slot batch size from the experiment's global batch size
    pub fn from_env(env: &EnvContext, distributed: DistributedContext) -> Result<Self> {
        let global = env
            .experiment_config
            .global_batch_size
            .ok_or_else(|| Error::invalid_config("global_batch_size is not set"))?;
        let size = u64::from(distributed.size());
        if global % size != 0 {
            return Err(Error::invalid_config(format!(
                "global_batch_size {} is not divisible by {} workers",
                global, size
            )));
        }
        Ok(Self::new(distributed, global / size))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl TrialContext for BasicTrialContext {
    fn per_slot_batch_size(&self) -> u64 {
        self.per_slot_batch_size
    }

    fn distributed(&self) -> &DistributedContext {
        &self.distributed
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Mean of each metric across a set of per-batch metrics
pub fn mean_metrics(batches: &[Metrics]) -> Metrics {
    let mut sums = Metrics::new();
    let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
    for batch in batches {
        for (name, value) in batch {
            *sums.entry(name.clone()).or_insert(0.0) += value;
            *counts.entry(name.as_str()).or_insert(0) += 1;
        }
    }
    for (name, sum) in sums.iter_mut() {
        if let Some(&count) = counts.get(name.as_str()) {
            *sum /= f64::from(count);
        }
    }
    sums
}
