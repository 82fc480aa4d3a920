//! Workloads dispatched to a trial controller

use crate::context::Metrics;
use chrono::{DateTime, Utc};
use harness_core::{Result, StepId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A unit of work requested by the cluster
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Workload {
    /// Train for `num_batches` batches; zero means one scheduling unit
    RunStep { step_id: StepId, num_batches: u64 },

    /// Run the validation pass
    ComputeValidationMetrics { step_id: StepId },

    /// Write a checkpoint
    Checkpoint { step_id: StepId },

    /// Stop the control loop
    Terminate,
}

impl Workload {
    pub fn kind(&self) -> WorkloadKind {
        match self {
            Workload::RunStep { .. } => WorkloadKind::RunStep,
            Workload::ComputeValidationMetrics { .. } => WorkloadKind::ComputeValidationMetrics,
            Workload::Checkpoint { .. } => WorkloadKind::Checkpoint,
            Workload::Terminate => WorkloadKind::Terminate,
        }
    }
}

/// Workload discriminant used in results and logs
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WorkloadKind {
    RunStep,
    ComputeValidationMetrics,
    Checkpoint,
    Terminate,
}

/// Source of workloads for the control loop
pub trait WorkloadSource: Send {
    /// Next workload, or `None` when the stream is exhausted
    fn next_workload(&mut self) -> Result<Option<Workload>>;
}

/// Finite in-memory workload sequence
///
/// Used by test harnesses in place of the live cluster feed.
#[derive(Debug, Clone, Default)]
pub struct WorkloadStream {
    workloads: VecDeque<Workload>,
}

impl WorkloadStream {
    pub fn new(workloads: impl IntoIterator<Item = Workload>) -> Self {
        Self {
            workloads: workloads.into_iter().collect(),
        }
    }

    /// Train, validate and checkpoint once per step for `steps` steps
    pub fn train_validate_checkpoint(steps: u64, batches_per_step: u64) -> Self {
        let workloads = (1..=steps).flat_map(|step_id| {
            [
                Workload::RunStep {
                    step_id,
                    num_batches: batches_per_step,
                },
                Workload::ComputeValidationMetrics { step_id },
                Workload::Checkpoint { step_id },
            ]
        });
        Self::new(workloads)
    }

    pub fn len(&self) -> usize {
        self.workloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workloads.is_empty()
    }
}

impl WorkloadSource for WorkloadStream {
    fn next_workload(&mut self) -> Result<Option<Workload>> {
        Ok(self.workloads.pop_front())
    }
}

/// Outcome of one completed workload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadResult {
    /// Step the workload belonged to
    pub step_id: StepId,

    /// Kind of workload
    pub kind: WorkloadKind,

    /// Batches trained, for `RunStep`
    pub batches: u64,

    /// Reported metrics (empty for checkpoints)
    pub metrics: Metrics,

    /// Completion timestamp
    pub completed_at: DateTime<Utc>,
}

impl WorkloadResult {
    pub fn new(step_id: StepId, kind: WorkloadKind, batches: u64, metrics: Metrics) -> Self {
        Self {
            step_id,
            kind,
            batches,
            metrics,
            completed_at: Utc::now(),
        }
    }
}
