//! Fixed-answer probe.
//!
//! Used when no dependency is configured and as a stub in tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{DependencyProbe, ProbeResult};

/// Probe that returns a preset result and counts calls.
#[derive(Debug, Clone)]
pub struct StaticProbe {
    name: String,
    result: Arc<Mutex<ProbeResult>>,
    calls: Arc<AtomicUsize>,
}

impl StaticProbe {
    /// Probe that always answers `result`.
    pub fn new(name: impl Into<String>, result: ProbeResult) -> Self {
        Self {
            name: name.into(),
            result: Arc::new(Mutex::new(result)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always healthy.
    pub fn healthy(name: impl Into<String>) -> Self {
        Self::new(name, ProbeResult::healthy())
    }

    /// Always unhealthy with `detail`.
    pub fn unhealthy(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(name, ProbeResult::unhealthy(detail))
    }

    /// Change the answer for subsequent calls. Clones share the answer.
    pub fn set_result(&self, result: ProbeResult) {
        *self.result.lock().unwrap_or_else(|e| e.into_inner()) = result;
    }

    /// Number of `check` calls so far, across clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DependencyProbe for StaticProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn answers_and_counts() {
        let probe = StaticProbe::unhealthy("db", "connection refused");
        let shared = probe.clone();

        assert_eq!(
            probe.check().await,
            ProbeResult::unhealthy("connection refused")
        );

        shared.set_result(ProbeResult::healthy());
        assert!(probe.check().await.is_healthy());
        assert_eq!(shared.calls(), 2);
    }
}
