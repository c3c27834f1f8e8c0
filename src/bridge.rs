//! Bridge API client and the per-session forwarding queue.
//!
//! ## Delivery
//! Posts are best-effort: a failed post is classified, logged and dropped.
//! Nothing is retried.
//!
//! ## Ordering
//! Each session owns one [`Forwarder`]. Its single worker drains a bounded
//! queue, so posts leave in the order frames arrived and at most one post per
//! session is in flight. A full queue drops the new message rather than
//! stalling the stream.

use reqwest::StatusCode;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn, Instrument};

use crate::config::Config;
use crate::error::BridgeError;
use crate::event::OutboundMessage;

/// Messages buffered per session before new ones are dropped.
pub const QUEUE_CAPACITY: usize = 64;

/// Posts [`OutboundMessage`]s to `{apiBase}/api/message`.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl BridgeClient {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            endpoint: format!("{}/api/message", config.api_base.trim_end_matches('/')),
            token: config.token.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one message and classify the outcome.
    ///
    /// # Returns
    /// - `Ok(())` on any 2xx status.
    /// - `Err(BridgeError::Unauthorized)` on 401.
    /// - `Err(BridgeError::Status)` on any other non-2xx, with the body's
    ///   `message` when it has one.
    /// - `Err(BridgeError::Timeout | BridgeError::Transport)` when no response
    ///   arrived.
    pub async fn post(&self, msg: &OutboundMessage) -> Result<(), BridgeError> {
        let mut req = self.http.post(&self.endpoint).json(msg);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                BridgeError::Timeout
            } else {
                BridgeError::Transport(e)
            }
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(BridgeError::Unauthorized);
        }

        let message = resp
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_owned))
            .filter(|m| !m.is_empty());
        Err(BridgeError::Status { status: status.as_u16(), message })
    }

    /// [`post`](Self::post) and log the outcome. Never fails.
    pub async fn deliver(&self, msg: &OutboundMessage) {
        match self.post(msg).await {
            Ok(()) => debug!(gateway = %msg.gateway, "sent message to bridge"),
            Err(BridgeError::Unauthorized) => {
                error!("bridge request was unauthorized, was a valid token supplied?")
            }
            Err(BridgeError::Status { status, message: Some(message) }) => {
                warn!(status, message = %message, "failed to send message to bridge")
            }
            Err(BridgeError::Status { status, message: None }) => {
                warn!(status, "failed to send message to bridge")
            }
            Err(e) => warn!(error = %e, "failed to send message to bridge"),
        }
    }
}

/// Handle to a session's serial posting worker.
#[derive(Debug, Clone)]
pub struct Forwarder {
    tx: mpsc::Sender<OutboundMessage>,
}

impl Forwarder {
    /// Start the worker on the current span. It exits once every `Forwarder`
    /// clone is dropped and the queue is drained.
    pub fn spawn(client: BridgeClient, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<OutboundMessage>(capacity.max(1));

        let worker = tokio::spawn(
            async move {
                while let Some(msg) = rx.recv().await {
                    client.deliver(&msg).await;
                }
            }
            .in_current_span(),
        );

        (Self { tx }, worker)
    }

    /// Queue `msg` without waiting. Returns `false` when it was dropped.
    pub fn forward(&self, msg: OutboundMessage) -> bool {
        match self.tx.try_send(msg) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                warn!(gateway = %msg.gateway, "bridge queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("bridge worker stopped, dropping message");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
