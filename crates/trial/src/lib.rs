//! Trial - lifecycle coordination for one distributed training trial
//!
//! A [`TrialController`] wraps a user's [`Trial`] and its [`TrialContext`],
//! validates that the controller supports what the experiment asks for, and
//! drives the trial through a stream of [`Workload`]s:
//! - **Backend setup**: `pre_execute_hook` runs before user code exists
//! - **Construction**: profiler, capability checks, chief election
//! - **Run**: train, validate and checkpoint until the stream ends
//! - **Close**: release the context exactly once
//!
//! # Example
//!
//! ```ignore
//! use harness_core::{DistributedBackend, EnvContext};
//! use trial::{execute_trial, BasicTrialContext, TorchTrialController};
//!
//! let env = EnvContext::from_env()?;
//! let backend = DistributedBackend::from_env()?;
//! let logs = harness_core::logging::init(tracing::Level::INFO)?;
//! execute_trial::<TorchTrialController<MyTrial>, _>(env, backend, workloads, &logs, |setup, env| {
//!     let context = BasicTrialContext::from_env(env, *setup)?;
//!     Ok((MyTrial::new(), Box::new(context)))
//! })?;
//! ```

pub mod context;
pub mod controller;
pub mod controllers;
pub mod harness;
pub mod profiler;
pub mod workload;

pub use context::{BasicTrialContext, Metrics, Trial, TrialContext};
pub use controller::{ControllerCore, TrialController, TrialState};
pub use controllers::{HorovodTrialController, LocalTrialController, TorchTrialController};
pub use harness::{execute_trial, run_trial};
pub use profiler::ProfilerAgent;
pub use workload::{Workload, WorkloadKind, WorkloadResult, WorkloadSource, WorkloadStream};
