//! One-time startup sequence: resolve, parse, validate, bind.
//!
//! Each stage runs only after the previous one succeeded. Any failure is a
//! [`StartupError`] and no router is produced.

use std::sync::Arc;

use axum::Router;
use tracing::info;

use crate::api::{create_router, handler_set, AppState, BoundRoute, HandlerSet};
use crate::config::Config;
use crate::contract::{Contract, SourceChain};
use crate::error::{Result, StartupError};
use crate::probe::DependencyProbe;

/// Router ready to serve, plus what was mounted on it.
pub struct Bootstrapped {
    /// Router with middleware and every declared operation.
    pub router: Router,
    /// Mounted routes, for logging and diagnostics.
    pub routes: Vec<BoundRoute>,
}

/// Resolve contract bytes from `sources`, then parse and validate them.
pub fn load_contract(sources: &SourceChain) -> Result<Contract> {
    let resolved = sources.resolve()?;
    info!(
        source = %resolved.origin,
        bytes = resolved.bytes.len(),
        "Contract loaded"
    );

    let contract = Contract::parse(&resolved.bytes)?;
    contract.validate()?;
    info!(
        title = %contract.title(),
        version = %contract.version(),
        operations = contract.operations().len(),
        "Contract validated"
    );

    Ok(contract)
}

/// Full startup with any handler set.
///
/// The contract is dropped once binding completes.
pub fn build<S>(
    sources: &SourceChain,
    base_path: &str,
    handlers: HandlerSet<S>,
    state: S,
) -> Result<Bootstrapped>
where
    S: Clone + Send + Sync + 'static,
{
    let contract = load_contract(sources)?;
    let (router, routes) = create_router(&contract, base_path, handlers, state)?;

    for route in &routes {
        info!(method = %route.method, path = %route.path, operation = %route.operation, "Route ready");
    }

    Ok(Bootstrapped { router, routes })
}

/// Startup for this service: bundled contract with file fallback, the
/// health handler, and `probe` behind it.
pub fn bootstrap(config: &Config, probe: Arc<dyn DependencyProbe>) -> Result<Bootstrapped> {
    config.validate().map_err(StartupError::Config)?;

    let sources = SourceChain::bundled_then_file(&config.openapi_spec_path);
    build(
        &sources,
        &config.base_path,
        handler_set(),
        AppState::new(probe),
    )
}
