//! HTTP dependency probe.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::{DependencyProbe, ProbeResult};

/// Probes a dependency with `GET <url>`; any 2xx answer is healthy.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
    url: Url,
}

impl HttpProbe {
    /// Create a probe whose requests give up after `timeout`.
    pub fn new(url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client, url })
    }

    /// Probed URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl DependencyProbe for HttpProbe {
    fn name(&self) -> &str {
        "http"
    }

    async fn check(&self) -> ProbeResult {
        match self.client.get(self.url.clone()).send().await {
            Ok(response) if response.status().is_success() => ProbeResult::healthy(),
            Ok(response) => {
                debug!(url = %self.url, status = %response.status(), "Dependency answered with failure");
                ProbeResult::unhealthy(format!("{} returned {}", self.url, response.status()))
            }
            Err(e) if e.is_timeout() => ProbeResult::unhealthy(format!("{} timed out", self.url)),
            Err(e) if e.is_connect() => {
                ProbeResult::unhealthy(format!("connection refused: {}", self.url))
            }
            Err(e) => ProbeResult::unhealthy(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/ping")).unwrap()
    }

    #[tokio::test]
    async fn success_status_is_healthy() {
        let url = serve(Router::new().route("/ping", get(|| async { "pong" }))).await;
        let probe = HttpProbe::new(url, Duration::from_secs(2)).unwrap();

        assert_eq!(probe.check().await, ProbeResult::healthy());
    }

    #[tokio::test]
    async fn error_status_is_unhealthy_with_detail() {
        let url = serve(Router::new().route(
            "/ping",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        ))
        .await;
        let probe = HttpProbe::new(url, Duration::from_secs(2)).unwrap();

        let result = probe.check().await;
        assert!(!result.is_healthy());
        assert!(result.detail.unwrap().contains("503"));
    }

    #[tokio::test]
    async fn closed_port_is_unhealthy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{addr}/ping")).unwrap();
        let probe = HttpProbe::new(url, Duration::from_secs(2)).unwrap();

        let result = probe.check().await;
        assert!(!result.is_healthy());
        assert!(result.detail.is_some());
    }
}
