//! HTTP API module: handler registry, contract binding and router composition.

pub mod binding;
pub mod handlers;
pub mod routes;

pub use binding::{bind, Bound, BoundRoute, HandlerSet};
pub use handlers::{handler_set, AppState};
pub use routes::create_router;
