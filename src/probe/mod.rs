//! Dependency probes for the health endpoint.
//!
//! A probe answers one question: is the downstream resource usable right now?
//! Handlers only see the [`DependencyProbe`] trait, so the concrete check can
//! be swapped without touching routing.

pub mod http;
pub mod mock;
pub mod tcp;

use std::sync::Arc;

use async_trait::async_trait;
use strum::{AsRefStr, Display};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::ConfigError;

pub use http::HttpProbe;
pub use mock::StaticProbe;
pub use tcp::TcpProbe;

/// Health of a probed dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ProbeStatus {
    /// Dependency reachable and answering.
    Healthy,
    /// Dependency unreachable or reporting failure.
    Unhealthy,
}

/// Outcome of one probe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    /// Healthy or not.
    pub status: ProbeStatus,
    /// Diagnostic text, usually present when unhealthy.
    pub detail: Option<String>,
}

impl ProbeResult {
    /// Healthy result without detail.
    pub fn healthy() -> Self {
        Self {
            status: ProbeStatus::Healthy,
            detail: None,
        }
    }

    /// Unhealthy result with diagnostic detail.
    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Unhealthy,
            detail: Some(detail.into()),
        }
    }

    /// Whether the dependency is healthy.
    pub fn is_healthy(&self) -> bool {
        self.status == ProbeStatus::Healthy
    }
}

/// Capability to check a downstream dependency.
///
/// Implementations own their timeout policy; callers await `check` once and
/// never retry.
#[async_trait]
pub trait DependencyProbe: Send + Sync {
    /// Short name used in logs and metrics labels.
    fn name(&self) -> &str;

    /// Check the dependency. Must not change its state.
    async fn check(&self) -> ProbeResult;
}

/// Build the probe described by the configuration.
///
/// `DEPENDENCY_URL` selects an [`HttpProbe`], `DEPENDENCY_ADDR` a
/// [`TcpProbe`]. With neither set the health endpoint reports the service
/// itself as healthy.
pub fn from_config(config: &Config) -> Result<Arc<dyn DependencyProbe>, ConfigError> {
    let timeout = config.probe_timeout();

    if let Some(url) = config.dependency_url()? {
        info!(url = %url, timeout_ms = config.probe_timeout_ms, "Using HTTP dependency probe");
        let probe = HttpProbe::new(url, timeout)
            .map_err(|e| ConfigError::Invalid(format!("failed to build HTTP probe: {e}")))?;
        return Ok(Arc::new(probe));
    }

    if let Some(addr) = &config.dependency_addr {
        info!(addr = %addr, timeout_ms = config.probe_timeout_ms, "Using TCP dependency probe");
        return Ok(Arc::new(TcpProbe::new(addr.clone(), timeout)));
    }

    warn!("No dependency configured, health endpoint reports the service only");
    Ok(Arc::new(StaticProbe::healthy("self")))
}
