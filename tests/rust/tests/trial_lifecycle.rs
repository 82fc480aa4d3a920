//! Simulated multi-worker trial
//!
//! Four workers run in threads, each with its own torch controller. Their
//! contexts share an in-memory all-reduce so training-metric averaging can
//! be checked end to end.

use anyhow::Result;
use harness_core::{
    DistributedBackend, DistributedContext, EnvContext, Error, ExperimentConfig, LoggingPolicy,
    USE_TORCH_DISTRIBUTED,
};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use trial::{
    Metrics, Trial, TrialContext, TrialController, TrialState, TorchTrialController,
    WorkloadKind, WorkloadStream,
};

const WORLD_SIZE: u32 = 4;

/// All-reduce shared by every simulated worker
struct Group {
    slots: Mutex<Vec<Metrics>>,
    barrier: Barrier,
}

struct GroupContext {
    distributed: DistributedContext,
    group: Arc<Group>,
}

impl TrialContext for GroupContext {
    fn per_slot_batch_size(&self) -> u64 {
        16
    }

    fn distributed(&self) -> &DistributedContext {
        &self.distributed
    }

    fn all_reduce_mean(&mut self, metrics: &Metrics) -> harness_core::Result<Metrics> {
        self.group.slots.lock().unwrap()[self.distributed.rank() as usize] = metrics.clone();
        self.group.barrier.wait();

        let mean = {
            let slots = self.group.slots.lock().unwrap();
            let mut mean = Metrics::new();
            for slot in slots.iter() {
                for (name, value) in slot {
                    *mean.entry(name.clone()).or_insert(0.0) += value / f64::from(WORLD_SIZE);
                }
            }
            mean
        };

        // Keep slots intact until every worker has read them
        self.group.barrier.wait();
        Ok(mean)
    }

    fn close(&mut self) -> harness_core::Result<()> {
        Ok(())
    }
}

/// Reports its own rank as the loss
struct RankTrial {
    rank: u32,
    checkpoints: Vec<u64>,
}

impl Trial for RankTrial {
    fn train_batch(&mut self, _batch_idx: u64) -> harness_core::Result<Metrics> {
        Ok(Metrics::from([("loss".to_string(), f64::from(self.rank))]))
    }

    fn evaluate(&mut self) -> harness_core::Result<Metrics> {
        Ok(Metrics::from([("val_loss".to_string(), 0.25)]))
    }

    fn save_checkpoint(&mut self, step_id: u64) -> harness_core::Result<()> {
        self.checkpoints.push(step_id);
        Ok(())
    }
}

struct WorkerReport {
    rank: u32,
    policy: LoggingPolicy,
    losses: Vec<f64>,
    checkpoints: Vec<u64>,
    state: TrialState,
}

type RankController = TorchTrialController<RankTrial>;

/// Construct and initialize one worker's controller
///
/// Runs before any thread enters the all-reduce barrier, so a setup failure
/// surfaces here instead of leaving the other workers waiting.
fn build_worker(rank: u32, group: Arc<Group>) -> Result<RankController> {
    let env = EnvContext::new(ExperimentConfig {
        averaging_training_metrics: true,
        scheduling_unit: 2,
        ..ExperimentConfig::default()
    });
    let context = GroupContext {
        distributed: DistributedContext::new(rank, rank / 2, WORLD_SIZE)?,
        group,
    };
    let trial = RankTrial {
        rank,
        checkpoints: Vec::new(),
    };

    let mut controller = TorchTrialController::from_trial(
        trial,
        Box::new(context),
        env,
        DistributedBackend::Torch,
        Some(Box::new(WorkloadStream::train_validate_checkpoint(3, 0))),
    )?;
    controller.initialize_wrapper()?;
    Ok(controller)
}

fn run_worker(rank: u32, mut controller: RankController) -> Result<WorkerReport> {
    controller.run()?;

    let losses = controller
        .core()
        .results()
        .iter()
        .filter(|r| r.kind == WorkloadKind::RunStep)
        .map(|r| r.metrics["loss"])
        .collect();
    let report = WorkerReport {
        rank,
        policy: controller.core().logging_policy(),
        losses,
        checkpoints: controller.trial().checkpoints.clone(),
        state: controller.core().state(),
    };
    controller.close()?;
    Ok(report)
}

#[test]
fn test_four_worker_trial() -> Result<()> {
    let group = Arc::new(Group {
        slots: Mutex::new(vec![Metrics::new(); WORLD_SIZE as usize]),
        barrier: Barrier::new(WORLD_SIZE as usize),
    });

    let controllers = (0..WORLD_SIZE)
        .map(|rank| build_worker(rank, Arc::clone(&group)))
        .collect::<Result<Vec<_>>>()?;

    let handles: Vec<_> = (0..WORLD_SIZE)
        .zip(controllers)
        .map(|(rank, controller)| thread::spawn(move || run_worker(rank, controller)))
        .collect();

    let mut reports = Vec::new();
    for handle in handles {
        let report = handle
            .join()
            .map_err(|_| anyhow::anyhow!("worker thread panicked"))??;
        reports.push(report);
    }

    for report in &reports {
        assert_eq!(report.state, TrialState::Completed);
        // mean of ranks 0..4
        assert_eq!(report.losses, vec![1.5, 1.5, 1.5]);

        if report.rank == 0 {
            assert_eq!(report.policy, LoggingPolicy::Keep);
            assert_eq!(report.checkpoints, vec![1, 2, 3]);
        } else {
            assert_eq!(report.policy, LoggingPolicy::Lower(tracing::Level::WARN));
            assert!(report.checkpoints.is_empty());
        }
    }
    Ok(())
}

#[test]
fn test_backend_flag_from_bootstrap_selects_torch() -> Result<()> {
    // The bootstrap hands the flag to the harness through the environment
    let backend = DistributedBackend::detect(|k| {
        (k == USE_TORCH_DISTRIBUTED).then(|| "True".to_string())
    })?;
    assert!(backend.uses_torch());
    assert!(!backend.uses_horovod());

    let err = TorchTrialController::<RankTrial>::pre_execute_hook(
        &EnvContext::default(),
        DistributedBackend::Horovod,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
    Ok(())
}

#[test]
fn test_debug_workers_stay_verbose() -> Result<()> {
    let env = EnvContext::new(ExperimentConfig {
        debug: true,
        ..ExperimentConfig::default()
    });
    let group = Arc::new(Group {
        slots: Mutex::new(Vec::new()),
        barrier: Barrier::new(1),
    });
    let context = GroupContext {
        distributed: DistributedContext::new(2, 1, WORLD_SIZE)?,
        group,
    };
    let controller = TorchTrialController::from_trial(
        RankTrial {
            rank: 2,
            checkpoints: Vec::new(),
        },
        Box::new(context),
        env,
        DistributedBackend::Torch,
        None,
    )?;
    assert!(!controller.core().is_chief());
    assert_eq!(
        controller.core().logging_policy(),
        LoggingPolicy::Lower(tracing::Level::DEBUG)
    );
    Ok(())
}
