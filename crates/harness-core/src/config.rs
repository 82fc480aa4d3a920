//! Experiment and launch configuration types

use crate::{Error, Result, TrialId};
use serde::{Deserialize, Serialize};

/// Experiment configuration as seen by a single trial process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Training batches executed per workload dispatch
    pub scheduling_unit: u64,

    /// Keep debug-level logs on every worker
    pub debug: bool,

    /// Average training metrics across workers before reporting
    pub averaging_training_metrics: bool,

    /// Train with automatic mixed precision
    pub mixed_precision: bool,

    /// Batch size summed over all slots
    pub global_batch_size: Option<u64>,

    /// Profiler settings
    pub profiling: ProfilingConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            scheduling_unit: 100,
            debug: false,
            averaging_training_metrics: false,
            mixed_precision: false,
            global_batch_size: None,
            profiling: ProfilingConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Parse and validate a JSON experiment configuration
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: ExperimentConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheduling_unit == 0 {
            return Err(Error::invalid_config("scheduling_unit must be at least 1"));
        }
        self.profiling.validate()
    }

    pub fn scheduling_unit(&self) -> u64 {
        self.scheduling_unit
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    pub fn averaging_training_metrics_enabled(&self) -> bool {
        self.averaging_training_metrics
    }

    pub fn mixed_precision_enabled(&self) -> bool {
        self.mixed_precision
    }
}

/// Profiler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilingConfig {
    /// Enable the profiler
    pub enabled: bool,

    /// First batch to profile (inclusive)
    pub begin_on_batch: u64,

    /// Last batch to profile (inclusive), unbounded when unset
    pub end_after_batch: Option<u64>,
}

impl Default for ProfilingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            begin_on_batch: 0,
            end_after_batch: None,
        }
    }
}

impl ProfilingConfig {
    pub fn validate(&self) -> Result<()> {
        match self.end_after_batch {
            Some(end) if end < self.begin_on_batch => Err(Error::invalid_config(format!(
                "profiling.end_after_batch ({}) is before profiling.begin_on_batch ({})",
                end, self.begin_on_batch
            ))),
            _ => Ok(()),
        }
    }
}

/// Immutable snapshot of the trial's configuration and container placement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvContext {
    /// Experiment configuration
    pub experiment_config: ExperimentConfig,

    /// Trial identifier assigned by the cluster
    pub trial_id: TrialId,

    /// Seed for the trial's random number generators
    pub trial_seed: u64,

    /// Container identifier
    pub container_id: String,

    /// GPU slots assigned to this container
    pub slot_ids: Vec<u32>,

    /// Address of the chief container, when known
    pub chief_ip: Option<String>,
}

impl EnvContext {
    /// Create an environment with the given experiment configuration
    pub fn new(experiment_config: ExperimentConfig) -> Self {
        Self {
            experiment_config,
            ..Self::default()
        }
    }

    pub fn with_trial(mut self, trial_id: TrialId, trial_seed: u64) -> Self {
        self.trial_id = trial_id;
        self.trial_seed = trial_seed;
        self
    }

    pub fn with_container(mut self, container_id: impl Into<String>, slot_ids: Vec<u32>) -> Self {
        self.container_id = container_id.into();
        self.slot_ids = slot_ids;
        self
    }

    pub fn with_chief_ip(mut self, chief_ip: impl Into<String>) -> Self {
        self.chief_ip = Some(chief_ip.into());
        self
    }

    /// Build the environment from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the environment from an arbitrary variable lookup
    ///
    /// Reads `DET_EXPERIMENT_CONFIG` (JSON), `DET_TRIAL_ID`, `DET_TRIAL_SEED`,
    /// `DET_CONTAINER_ID`, `DET_SLOT_IDS` and `DET_CHIEF_IP`. Only the
    /// experiment configuration is required.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = lookup("DET_EXPERIMENT_CONFIG")
            .ok_or_else(|| Error::invalid_config("DET_EXPERIMENT_CONFIG is not set"))?;
        let experiment_config = ExperimentConfig::from_json(&raw)?;

        let slot_ids = match lookup("DET_SLOT_IDS") {
            Some(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .map(|s| parse_number::<u32>("DET_SLOT_IDS", s))
                .collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };

        Ok(Self {
            experiment_config,
            trial_id: lookup("DET_TRIAL_ID")
                .map(|v| parse_number("DET_TRIAL_ID", &v))
                .transpose()?
                .unwrap_or(0),
            trial_seed: lookup("DET_TRIAL_SEED")
                .map(|v| parse_number("DET_TRIAL_SEED", &v))
                .transpose()?
                .unwrap_or(0),
            container_id: lookup("DET_CONTAINER_ID").unwrap_or_default(),
            slot_ids,
            chief_ip: lookup("DET_CHIEF_IP").filter(|ip| !ip.is_empty()),
        })
    }
}

/// Parse a numeric environment value, naming the variable on failure
pub fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::invalid_config(format!("{} is not a valid number: {:?}", name, raw)))
}

/// Launch bootstrap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Interpreter used to run the distributed launcher
    pub launcher_program: String,

    /// Arguments selecting the launcher module
    pub launcher_args: Vec<String>,

    /// Rendezvous port on the chief
    pub master_port: u16,

    /// Module the launcher runs on every node
    pub harness_module: String,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            launcher_program: "python3".to_string(),
            launcher_args: vec!["-m".to_string(), "torch.distributed.run".to_string()],
            master_port: 7555,
            harness_module: "determined.exec.harness".to_string(),
        }
    }
}
