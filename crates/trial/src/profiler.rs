//! Profiler agent bound to one worker

use harness_core::{EnvContext, Rank, Result};
use tracing::{debug, info};

/// Tracks which training batches fall inside the profiling window
#[derive(Debug, Clone)]
pub struct ProfilerAgent {
    enabled: bool,
    rank: Rank,
    cross_rank: Rank,
    begin_on_batch: u64,
    end_after_batch: Option<u64>,
    batches_profiled: u64,
}

impl ProfilerAgent {
    /// Create the agent for this worker from the experiment configuration
    ///
    /// Only the chief profiles unless debug mode is on, in which case every
    /// rank does.
    pub fn from_env(env: &EnvContext, cross_rank: Rank, rank: Rank) -> Result<Self> {
        let config = &env.experiment_config.profiling;
        config.validate()?;

        let enabled =
            config.enabled && (rank == 0 || env.experiment_config.debug_enabled());
        if enabled {
            info!(
                rank,
                cross_rank,
                begin_on_batch = config.begin_on_batch,
                end_after_batch = ?config.end_after_batch,
                "Profiler enabled"
            );
        }

        Ok(Self {
            enabled,
            rank,
            cross_rank,
            begin_on_batch: config.begin_on_batch,
            end_after_batch: config.end_after_batch,
            batches_profiled: 0,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// True if `batch_idx` falls inside the profiling window
    pub fn is_active(&self, batch_idx: u64) -> bool {
        self.enabled
            && batch_idx >= self.begin_on_batch
            && self.end_after_batch.map_or(true, |end| batch_idx <= end)
    }

    /// Record that the worker is about to train `batch_idx`
    pub fn update_batch_idx(&mut self, batch_idx: u64) {
        if self.is_active(batch_idx) {
            self.batches_profiled += 1;
            debug!(
                rank = self.rank,
                cross_rank = self.cross_rank,
                batch_idx,
                "Profiling batch"
            );
        }
    }

    pub fn batches_profiled(&self) -> u64 {
        self.batches_profiled
    }
}
