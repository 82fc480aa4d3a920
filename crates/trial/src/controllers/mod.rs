//! Concrete trial controllers, one per distributed backend

mod horovod;
mod local;
mod torch;

pub use horovod::{horovod_distributed_context, HorovodTrialController};
pub use local::LocalTrialController;
pub use torch::{torch_distributed_context, TorchTrialController};

use crate::context::Trial;
use crate::controller::ControllerCore;
use harness_core::config::parse_number;
use harness_core::{DistributedBackend, DistributedContext, Error, Result};
use std::sync::OnceLock;
use tracing::info;

/// Backend setup remembered together with the backend that produced it
type CachedSetup = OnceLock<(DistributedBackend, DistributedContext)>;

/// Resolve and memoize a controller's backend setup
///
/// A controller accepts its own backend or the single-process fallback.
/// The first successful resolution is cached for the life of the process;
/// asking again with a different backend is an error.
fn resolve_setup<F>(
    cell: &CachedSetup,
    controller: &str,
    expected: DistributedBackend,
    backend: DistributedBackend,
    from_env: F,
) -> Result<DistributedContext>
where
    F: FnOnce() -> Result<DistributedContext>,
{
    if backend != expected && backend != DistributedBackend::None {
        return Err(Error::configuration(format!(
            "{} controller cannot run with the {} backend",
            controller, backend
        )));
    }
    if let Some(cached) = cell.get() {
        return cached_setup(cached, controller, backend);
    }

    let setup = if backend == DistributedBackend::None {
        DistributedContext::single_process()
    } else {
        from_env()?
    };
    let cached = cell.get_or_init(|| (backend, setup));
    if cached.0 == backend {
        info!(
            controller,
            backend = %backend,
            rank = setup.rank(),
            cross_rank = setup.cross_rank(),
            size = setup.size(),
            "Distributed backend initialized"
        );
    }
    cached_setup(cached, controller, backend)
}

fn cached_setup(
    cached: &(DistributedBackend, DistributedContext),
    controller: &str,
    backend: DistributedBackend,
) -> Result<DistributedContext> {
    let (resolved, setup) = *cached;
    if resolved != backend {
        return Err(Error::configuration(format!(
            "{} controller was already set up for the {} backend, not {}",
            controller, resolved, backend
        )));
    }
    Ok(setup)
}

/// Read a required rank-style variable set by a distributed launcher
fn read_rank_var<F>(lookup: &F, name: &str, launcher: &str) -> Result<u32>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name).ok_or_else(|| {
        Error::invalid_config(format!(
            "{} is not set; was this process started by {}?",
            name, launcher
        ))
    })?;
    parse_number(name, &raw)
}

/// Switch `trial` to mixed precision when the experiment asks for it
fn enable_mixed_precision_if_requested<T: Trial>(
    core: &ControllerCore,
    trial: &mut T,
) -> Result<()> {
    if core.env().experiment_config.mixed_precision_enabled() {
        trial.enable_mixed_precision()?;
        info!(rank = core.distributed().rank(), "Mixed precision enabled");
    }
    Ok(())
}
