//! Contract-to-handler binding.
//!
//! A [`HandlerSet`] collects handlers keyed by operation; [`bind`] mounts one
//! handler per declared operation and refuses to produce a router when the two
//! sides disagree.

use std::collections::BTreeMap;

use axum::handler::Handler;
use axum::routing::{MethodFilter, MethodRouter};
use axum::Router;
use tracing::{debug, info};

use crate::config::base_path_is_mountable;
use crate::contract::{Contract, HttpMethod, PathTemplate};
use crate::error::BindingError;

type BindFn<S> = Box<dyn FnOnce(MethodFilter) -> MethodRouter<S> + Send>;

/// Handlers keyed by operation (`operationId`, or `"<METHOD> <path>"`).
pub struct HandlerSet<S> {
    handlers: BTreeMap<String, BindFn<S>>,
    duplicates: Vec<String>,
}

impl<S> Default for HandlerSet<S> {
    fn default() -> Self {
        Self {
            handlers: BTreeMap::new(),
            duplicates: Vec::new(),
        }
    }
}

impl<S> HandlerSet<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `operation`.
    ///
    /// Registering the same operation twice is reported by [`bind`].
    pub fn register<H, T>(mut self, operation: impl Into<String>, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        let key = operation.into();
        let bind: BindFn<S> = Box::new(move |filter| axum::routing::on(filter, handler));
        if self.handlers.insert(key.clone(), bind).is_some() {
            self.duplicates.push(key);
        }
        self
    }

    /// Whether a handler is registered for `operation`.
    pub fn contains(&self, operation: &str) -> bool {
        self.handlers.contains_key(operation)
    }

    /// Registered operation keys, sorted.
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// One mounted route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundRoute {
    pub method: HttpMethod,
    /// Router path including the base path (`/api/users/:id`).
    pub path: String,
    pub operation: String,
}

/// Result of a successful [`bind`].
pub struct Bound<S> {
    /// Router with every declared operation mounted. No state or middleware.
    pub router: Router<S>,
    /// Mounted routes in contract order.
    pub routes: Vec<BoundRoute>,
}

/// Mount every operation in `contract` under `base_path`.
///
/// Fails when the base path is not mountable, a handler was registered twice,
/// a declared operation has no handler, a handler has no declared operation,
/// or a path cannot be expressed by the router.
pub fn bind<S>(
    contract: &Contract,
    base_path: &str,
    mut handlers: HandlerSet<S>,
) -> Result<Bound<S>, BindingError>
where
    S: Clone + Send + Sync + 'static,
{
    if !base_path_is_mountable(base_path) {
        return Err(BindingError::InvalidBasePath(base_path.to_string()));
    }
    if !handlers.duplicates.is_empty() {
        return Err(BindingError::DuplicateHandlers(handlers.duplicates));
    }

    let operations = contract.operations();

    let missing: Vec<String> = operations
        .iter()
        .filter(|op| !handlers.contains(&op.key))
        .map(|op| op.key.clone())
        .collect();
    if !missing.is_empty() {
        return Err(BindingError::MissingHandlers(missing));
    }

    let undeclared: Vec<String> = handlers
        .operations()
        .filter(|key| !operations.iter().any(|op| op.key == *key))
        .map(str::to_string)
        .collect();
    if !undeclared.is_empty() {
        return Err(BindingError::UndeclaredHandlers(undeclared));
    }

    // Resolve every path before touching the router so a failure leaves nothing half-built.
    let mut planned = Vec::with_capacity(operations.len());
    for op in operations {
        let router_path = PathTemplate::parse(&op.path)
            .ok()
            .and_then(|template| template.to_router_path(base_path))
            .ok_or_else(|| BindingError::UnsupportedPath {
                path: op.path.clone(),
                reason: "each parameter must occupy a whole segment".to_string(),
            })?;
        planned.push((op, router_path));
    }

    let mut router = Router::new();
    let mut routes = Vec::with_capacity(planned.len());
    for (op, path) in planned {
        let Some(bind) = handlers.handlers.remove(&op.key) else {
            return Err(BindingError::MissingHandlers(vec![op.key]));
        };

        debug!(method = %op.method, path = %path, operation = %op.key, "Binding operation");
        router = router.route(&path, bind(op.method.filter()));
        routes.push(BoundRoute {
            method: op.method,
            path,
            operation: op.key,
        });
    }

    info!(
        routes = routes.len(),
        base_path = %base_path,
        "Bound all declared operations"
    );
    Ok(Bound { router, routes })
}
