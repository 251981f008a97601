//! TCP connect probe.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{DependencyProbe, ProbeResult};

/// Healthy when a TCP connection to `addr` opens within the timeout.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    /// Probe `addr` (`host:port`).
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }
}

#[async_trait]
impl DependencyProbe for TcpProbe {
    fn name(&self) -> &str {
        "tcp"
    }

    async fn check(&self) -> ProbeResult {
        match timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_stream)) => ProbeResult::healthy(),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                ProbeResult::unhealthy("connection refused")
            }
            Ok(Err(e)) => ProbeResult::unhealthy(format!("{}: {e}", self.addr)),
            Err(_) => ProbeResult::unhealthy(format!(
                "{}: timed out after {}ms",
                self.addr,
                self.timeout.as_millis()
            )),
        }
    }
}
