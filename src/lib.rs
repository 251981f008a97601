//! Contract-validated HTTP router bootstrap.
//!
//! Loads an OpenAPI contract, validates it, and binds every declared
//! operation to a handler under a fixed base path. The server never starts
//! against a contract that failed any of those steps.
//!
//! # Startup
//!
//! ```text
//! bundled bytes ──┐
//!                 ├─> parse ─> validate ─> bind ─> Router
//! file fallback ──┘                         ^
//!                               handlers + probe
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Startup error taxonomy
//! - [`contract`]: Contract sources, parsing and validation
//! - [`probe`]: Dependency probes behind the health endpoint
//! - [`api`]: Handlers, binding and router composition
//! - [`bootstrap`]: The startup sequence
//! - [`metrics`]: Request and probe metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod contract;
pub mod error;
pub mod metrics;
pub mod probe;
pub mod utils;

pub use bootstrap::{bootstrap, Bootstrapped};
pub use config::Config;
pub use error::{Result, StartupError};
