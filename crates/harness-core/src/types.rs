//! Core type definitions for the trial harness

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Rank and counter types
pub type Rank = u32;
pub type StepId = u64;
pub type TrialId = u64;

/// This process's position in the distributed job
///
/// Only constructible through [`DistributedContext::new`], so `size` is never
/// zero and `rank` is always inside the job.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct DistributedContext {
    rank: Rank,
    cross_rank: Rank,
    size: u32,
}

impl DistributedContext {
    /// Create a distributed context, rejecting ranks outside the job
    pub fn new(rank: Rank, cross_rank: Rank, size: u32) -> Result<Self> {
        if size == 0 {
            return Err(Error::invalid_config("distributed size must be at least 1"));
        }
        if rank >= size {
            return Err(Error::invalid_config(format!(
                "rank {} is out of range for size {}",
                rank, size
            )));
        }
        Ok(Self {
            rank,
            cross_rank,
            size,
        })
    }

    /// Context for a job with a single worker
    pub fn single_process() -> Self {
        Self {
            rank: 0,
            cross_rank: 0,
            size: 1,
        }
    }

    /// Flat worker index across the job
    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// Index of the node this worker runs on
    pub fn cross_rank(&self) -> Rank {
        self.cross_rank
    }

    /// Total number of workers
    pub fn size(&self) -> u32 {
        self.size
    }

    /// The chief is always rank 0
    pub fn is_chief(&self) -> bool {
        self.rank == 0
    }

    pub fn is_distributed(&self) -> bool {
        self.size > 1
    }
}

impl Default for DistributedContext {
    fn default() -> Self {
        Self::single_process()
    }
}

/// Container placement as reported by the cluster
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterInfo {
    /// Network addresses of every container in the trial, chief first
    pub container_addrs: Vec<String>,

    /// Index of this container in `container_addrs`
    pub container_rank: Rank,
}

impl ClusterInfo {
    /// Create validated cluster info
    pub fn new(container_addrs: Vec<String>, container_rank: Rank) -> Result<Self> {
        let info = Self {
            container_addrs,
            container_rank,
        };
        info.validate()?;
        Ok(info)
    }

    pub fn validate(&self) -> Result<()> {
        if self.container_addrs.is_empty() {
            return Err(Error::ClusterInfoUnavailable {
                reason: "no container addresses".to_string(),
            });
        }
        if self.container_rank as usize >= self.container_addrs.len() {
            return Err(Error::ClusterInfoUnavailable {
                reason: format!(
                    "container rank {} is out of range for {} containers",
                    self.container_rank,
                    self.container_addrs.len()
                ),
            });
        }
        Ok(())
    }

    /// Address of the chief container (index 0 by convention)
    pub fn chief_addr(&self) -> Result<&str> {
        self.container_addrs
            .first()
            .map(String::as_str)
            .ok_or_else(|| Error::ClusterInfoUnavailable {
                reason: "no container addresses".to_string(),
            })
    }

    pub fn num_nodes(&self) -> usize {
        self.container_addrs.len()
    }
}
