//! HTTP polling: one request per exchange, bounded by a timeout, with an
//! optional liveness probe.

use std::future::Future;
use std::time::Duration;

use reqwest::{header::AUTHORIZATION, Certificate, Client};
use serde_json::Value;
use tokio::time::{timeout, Instant};
use tracing::debug;

use super::{decode_body, read_pem, TransportEvent};
use crate::config::FeedConfig;
use crate::error::{FailureReason, FeedError};

/// One status fetch. Implemented over HTTP by `HttpSource`; tests script it.
pub trait StatusSource: Send + Sync + 'static {
    /// Fetch and decode the stats object.
    fn fetch(&self) -> impl Future<Output = Result<Value, FailureReason>> + Send;

    /// Cheap liveness check; sources without one report success.
    fn probe(&self) -> impl Future<Output = Result<(), FailureReason>> + Send {
        async { Ok(()) }
    }

    fn has_probe(&self) -> bool {
        false
    }
}

pub struct HttpSource {
    client: Client,
    endpoint: String,
    probe_endpoint: Option<String>,
    password: Option<String>,
}

impl HttpSource {
    pub fn new(cfg: &FeedConfig) -> Result<Self, FeedError> {
        let mut builder = Client::builder().user_agent(concat!("relayfeed/", env!("CARGO_PKG_VERSION")));
        if let Some(path) = cfg.tls_ca.as_deref() {
            let pem = read_pem(path)?;
            let cert = Certificate::from_pem(&pem).map_err(|e| FeedError::Tls(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: cfg.endpoint.trim().to_string(),
            probe_endpoint: cfg.probe_endpoint.as_ref().map(|p| p.trim().to_string()),
            password: cfg.password.clone(),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FailureReason> {
        let mut req = self.client.get(url);
        if let Some(pw) = self.password.as_deref() {
            req = req.header(AUTHORIZATION, pw);
        }
        let resp = req.send().await.map_err(classify)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FailureReason::HttpStatus(status.as_u16()));
        }
        Ok(resp)
    }
}

impl StatusSource for HttpSource {
    async fn fetch(&self) -> Result<Value, FailureReason> {
        let resp = self.get(&self.endpoint).await?;
        let body = resp.bytes().await.map_err(classify)?;
        decode_body(&body)
    }

    async fn probe(&self) -> Result<(), FailureReason> {
        let Some(url) = self.probe_endpoint.as_deref() else {
            return Ok(());
        };
        let resp = self.get(url).await?;
        let version = resp.text().await.map_err(classify)?;
        debug!(version = %version.trim(), "relay probe ok");
        Ok(())
    }

    fn has_probe(&self) -> bool {
        self.probe_endpoint.is_some()
    }
}

fn classify(e: reqwest::Error) -> FailureReason {
    if e.is_timeout() {
        FailureReason::Timeout
    } else if let Some(status) = e.status() {
        FailureReason::HttpStatus(status.as_u16())
    } else {
        FailureReason::Transport(e.to_string())
    }
}

/// Applies the per-request timeout and measures round-trip time around a
/// `StatusSource`. A request that overruns is dropped, which aborts it.
pub struct PollTransport<S> {
    source: S,
    timeout: Duration,
}

impl<S: StatusSource> PollTransport<S> {
    pub fn new(source: S, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    pub async fn exchange(&self) -> TransportEvent {
        let started = Instant::now();
        let fetched = timeout(self.timeout, self.source.fetch())
            .await
            .unwrap_or(Err(FailureReason::Timeout));
        let mut event = TransportEvent::from(fetched);
        if let TransportEvent::Payload { rtt, .. } = &mut event {
            *rtt = Some(started.elapsed());
        }
        event
    }

    pub async fn probe(&self) -> Result<(), FailureReason> {
        timeout(self.timeout, self.source.probe())
            .await
            .unwrap_or(Err(FailureReason::Timeout))
    }

    pub fn has_probe(&self) -> bool {
        self.source.has_probe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Slow(Duration);

    impl StatusSource for Slow {
        async fn fetch(&self) -> Result<Value, FailureReason> {
            tokio::time::sleep(self.0).await;
            Ok(json!({ "players": 1 }))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exchange_measures_rtt_on_success() {
        let t = PollTransport::new(Slow(Duration::from_millis(120)), Duration::from_secs(10));
        match t.exchange().await {
            TransportEvent::Payload { payload, rtt } => {
                assert_eq!(payload, json!({ "players": 1 }));
                assert!(rtt.is_some_and(|d| d >= Duration::from_millis(120)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exchange_overrun_is_a_timeout() {
        let t = PollTransport::new(Slow(Duration::from_secs(20)), Duration::from_secs(10));
        assert_eq!(
            t.exchange().await,
            TransportEvent::Failure(FailureReason::Timeout)
        );
        assert!(!t.has_probe());
        assert_eq!(t.probe().await, Ok(()));
    }
}
