//! WebSocket streaming: a receive-only connection the relay pushes JSON
//! frames over, plus the fixed-delay reconnect policy.

use std::{
    future::Future,
    io,
    pin::Pin,
    sync::Arc,
    task::{ready, Context, Poll},
    time::Duration,
};

use futures_util::{Stream, StreamExt};
use rustls::{pki_types::CertificateDer, ClientConfig, RootCertStore};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async_tls_with_config,
    tungstenite::{
        self,
        client::IntoClientRequest,
        http::{header::AUTHORIZATION, HeaderValue},
        Message,
    },
    Connector, MaybeTlsStream, WebSocketStream,
};
use tracing::debug;

use super::{decode_body, read_pem};
use crate::config::FeedConfig;
use crate::error::{FailureReason, FeedError, ReconnectExhausted};

/// Opens a streaming connection. The returned stream yields one decoded
/// payload (or per-frame failure) per message and ends when the connection is
/// lost for any reason.
pub trait StreamConnector: Send + Sync + 'static {
    type Conn: Stream<Item = Result<Value, FailureReason>> + Send + Unpin + 'static;

    fn connect(&self) -> impl Future<Output = Result<Self::Conn, FailureReason>> + Send;
}

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsConnector {
    url: String,
    password: Option<String>,
    tls: Option<Arc<ClientConfig>>,
}

impl WsConnector {
    pub fn new(cfg: &FeedConfig) -> Result<Self, FeedError> {
        let tls = match cfg.tls_ca.as_deref() {
            Some(path) => Some(Arc::new(client_config_with_ca(&read_pem(path)?)?)),
            None => None,
        };
        Ok(Self {
            url: cfg.endpoint.trim().to_string(),
            password: cfg.password.clone(),
            tls,
        })
    }
}

/// Trust exactly the certificates in `pem` (self-signed relay setups).
fn client_config_with_ca(pem: &[u8]) -> Result<ClientConfig, FeedError> {
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut &pem[..])
        .collect::<Result<_, io::Error>>()
        .map_err(|e| FeedError::Tls(format!("parse CA: {e}")))?;
    if certs.is_empty() {
        return Err(FeedError::Tls("no certificates found in CA file".into()));
    }
    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots
            .add(cert)
            .map_err(|e| FeedError::Tls(format!("add CA: {e}")))?;
    }
    Ok(ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth())
}

impl StreamConnector for WsConnector {
    type Conn = WsFrames;

    async fn connect(&self) -> Result<Self::Conn, FailureReason> {
        let mut req = self.url.as_str().into_client_request().map_err(classify)?;
        if let Some(pw) = self.password.as_deref() {
            let value = HeaderValue::from_str(pw)
                .map_err(|e| FailureReason::Transport(format!("invalid password header: {e}")))?;
            req.headers_mut().insert(AUTHORIZATION, value);
        }
        let connector = self.tls.clone().map(Connector::Rustls);
        let (ws, _resp) = connect_async_tls_with_config(req, None, false, connector)
            .await
            .map_err(classify)?;
        Ok(WsFrames { inner: ws })
    }
}

fn classify(e: tungstenite::Error) -> FailureReason {
    match e {
        tungstenite::Error::Http(resp) => FailureReason::HttpStatus(resp.status().as_u16()),
        other => FailureReason::Transport(other.to_string()),
    }
}

/// Decoded frames from a live WebSocket; control frames are skipped.
pub struct WsFrames {
    inner: WsStream,
}

impl Stream for WsFrames {
    type Item = Result<Value, FailureReason>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            let msg = match ready!(self.inner.poll_next_unpin(cx)) {
                None => return Poll::Ready(None),
                Some(Err(e)) => {
                    debug!(error = %e, "stream read failed");
                    return Poll::Ready(None);
                }
                Some(Ok(msg)) => msg,
            };
            match msg {
                Message::Text(text) => return Poll::Ready(Some(decode_body(text.as_bytes()))),
                Message::Binary(bytes) => return Poll::Ready(Some(decode_body(&bytes))),
                Message::Close(frame) => {
                    debug!(?frame, "stream closed by server");
                    return Poll::Ready(None);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }
}

/// Fixed-delay reconnect with an attempt ceiling. Connect failures and drops
/// share one counter, reset by a successful open.
#[derive(Debug, Clone)]
pub struct Reconnect {
    delay: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl Reconnect {
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
            attempts: 0,
        }
    }

    pub fn on_open(&mut self) {
        self.attempts = 0;
    }

    /// Manual restart after giving up; the budget starts over.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Record a loss; returns the wait before the next attempt, or the
    /// terminal condition once the ceiling is exceeded.
    pub fn on_loss(&mut self) -> Result<Duration, ReconnectExhausted> {
        self.attempts = self.attempts.saturating_add(1);
        if self.attempts > self.max_attempts {
            return Err(ReconnectExhausted {
                attempts: self.max_attempts,
            });
        }
        Ok(self.delay)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
