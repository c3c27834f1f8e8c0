//! # Thread session
//!
//! One long-lived task per configured thread. The loop is
//!
//! ```text
//! Discovering ──found──▶ Connected ──close──▶ Reconnecting ──▶ Discovering
//!      │                                                           ▲
//!      ├──remote error / request failure ── backoff ───────────────┘
//!      └──not found / unrecognized ──▶ Stopped
//! ```
//!
//! Every close triggers a full rediscovery rather than a plain reconnect, so
//! a thread that has ended is noticed and a rotated stream URL is picked up.
//!
//! ## Backoff
//! Consecutive failed cycles back off via [`Backoff`]. A connection that
//! stayed up for [`STABLE_CONNECTION`] (see [`ThreadSessionBuilder::stable_after`])
//! resets the count, so the rediscovery after it is immediate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::backoff::Backoff;
use crate::bridge::{BridgeClient, Forwarder, QUEUE_CAPACITY};
use crate::config::{Config, ThreadSpec};
use crate::discovery::{self, DiscoveryResult, StreamEndpoint};
use crate::error::StreamError;
use crate::event::InboundEvent;

/// Deadline for the websocket handshake.
pub const STREAM_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Minimum uptime for a connection to reset the backoff count.
pub const STABLE_CONNECTION: Duration = Duration::from_secs(30);

/// Observable lifecycle state of a [`ThreadSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Discovering,
    Connected,
    Reconnecting,
    /// Discovery said the thread is gone, or answered with nothing usable.
    Stopped,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Discovering  => "discovering",
            ConnectionState::Connected    => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Stopped      => "stopped",
        };
        write!(f, "{s}")
    }
}

/// How an established stream ended.
#[derive(Debug)]
enum Disconnect {
    /// Close frame (with its reason, if any) or end of stream.
    Closed(Option<String>),
    Failed(tokio_tungstenite::tungstenite::Error),
}

/// Result of one discovery + stream cycle, as seen by the backoff counter.
enum Cycle {
    /// Connection was up long enough to reset the backoff.
    Stable,
    /// Anything that should count towards the backoff.
    Failed,
    /// The session should end.
    Stop,
}

/// Discovery, streaming and forwarding for one thread.
pub struct ThreadSession {
    thread: ThreadSpec,
    config: Arc<Config>,
    http: reqwest::Client,
    backoff: Backoff,
    connect_timeout: Duration,
    stable_after: Duration,
    queue_capacity: usize,
    state: watch::Sender<ConnectionState>,
}

impl ThreadSession {
    /// Start building a session for `thread`.
    pub fn builder(thread: ThreadSpec, config: Arc<Config>) -> ThreadSessionBuilder {
        ThreadSessionBuilder::new(thread, config)
    }

    pub fn thread(&self) -> &ThreadSpec {
        &self.thread
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Run until discovery stops the session. Under normal operation this
    /// never returns.
    pub async fn run(self) {
        let span = info_span!("thread", id = %self.thread.id, gateway = %self.thread.gateway);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(self) {
        let (forwarder, _worker) = Forwarder::spawn(
            BridgeClient::new(self.http.clone(), &self.config),
            self.queue_capacity,
        );
        let about_url = discovery::about_url(&self.config.platform_base, &self.thread.id);
        let mut failures: u32 = 0;

        loop {
            let delay = self.backoff.delay(failures);
            if !delay.is_zero() {
                debug!(delay_ms = delay.as_millis() as u64, failures, "waiting before rediscovery");
                tokio::time::sleep(delay).await;
            }

            match self.cycle(&about_url, &forwarder).await {
                Cycle::Stable => failures = 0,
                Cycle::Failed => failures = failures.saturating_add(1),
                Cycle::Stop => {
                    self.set_state(ConnectionState::Stopped);
                    return;
                }
            }
        }
    }

    /// One discovery attempt and, if it finds a stream, one connection.
    async fn cycle(&self, about_url: &str, forwarder: &Forwarder) -> Cycle {
        self.set_state(ConnectionState::Discovering);
        info!(url = about_url, "requesting thread info");

        let endpoint = match discovery::discover(&self.http, about_url).await {
            Ok(DiscoveryResult::Found(endpoint)) => endpoint,
            Ok(DiscoveryResult::NotFound) => {
                error!("could not find thread");
                return Cycle::Stop;
            }
            Ok(DiscoveryResult::Remote { code, message: Some(message) }) => {
                warn!(code = %code, message = %message, "failed to get thread info");
                return Cycle::Failed;
            }
            Ok(DiscoveryResult::Remote { code, message: None }) => {
                warn!(code = %code, "failed to get thread info");
                return Cycle::Failed;
            }
            Ok(DiscoveryResult::Unrecognized) => {
                warn!("thread info response has neither an error nor a stream url");
                return Cycle::Stop;
            }
            Err(e) => {
                warn!(error = %e, "failed to get thread info");
                return Cycle::Failed;
            }
        };

        info!(
            title = endpoint.title.as_deref().unwrap_or_default(),
            url = %endpoint.url,
            "found stream for thread"
        );

        let opened = Instant::now();
        match self.stream(&endpoint, forwarder).await {
            Ok(disconnect) => {
                self.set_state(ConnectionState::Reconnecting);
                match disconnect {
                    Disconnect::Closed(Some(reason)) => {
                        info!(reason = %reason, "stream closed, reconnecting")
                    }
                    Disconnect::Closed(None) => info!("stream closed, reconnecting"),
                    Disconnect::Failed(e) => warn!(error = %e, "stream failed, reconnecting"),
                }
                if opened.elapsed() >= self.stable_after {
                    Cycle::Stable
                } else {
                    Cycle::Failed
                }
            }
            Err(e) => {
                warn!(error = %e, "could not open stream");
                Cycle::Failed
            }
        }
    }

    /// Hold one websocket connection open, forwarding qualifying frames until
    /// it ends.
    async fn stream(
        &self,
        endpoint: &StreamEndpoint,
        forwarder: &Forwarder,
    ) -> Result<Disconnect, StreamError> {
        let (mut ws, _) = tokio::time::timeout(self.connect_timeout, connect_async(endpoint.url.as_str()))
            .await
            .map_err(|_| StreamError::Timeout {
                url: endpoint.url.clone(),
                secs: self.connect_timeout.as_secs(),
            })?
            .map_err(|e| StreamError::Connect { url: endpoint.url.clone(), source: Box::new(e) })?;

        self.set_state(ConnectionState::Connected);
        info!("stream opened");

        while let Some(frame) = ws.next().await {
            let parsed = match frame {
                Ok(WsMessage::Text(text)) => InboundEvent::parse(&text),
                Ok(WsMessage::Binary(bytes)) => InboundEvent::parse_bytes(&bytes),
                Ok(WsMessage::Close(close)) => {
                    let reason = close
                        .map(|c| c.reason.into_owned())
                        .filter(|r| !r.is_empty());
                    // flush the queued close reply; the peer may already be gone
                    let _ = ws.close(None).await;
                    return Ok(Disconnect::Closed(reason));
                }
                Ok(_) => continue,
                Err(e) => return Ok(Disconnect::Failed(e)),
            };

            match parsed {
                Ok(event) => self.handle_event(event, forwarder),
                Err(e) => warn!(error = %e, "discarding malformed stream frame"),
            }
        }

        Ok(Disconnect::Closed(None))
    }

    fn handle_event(&self, event: InboundEvent, forwarder: &Forwarder) {
        let author = event.author.clone();
        let Some(msg) = event.into_outbound(&self.thread.gateway) else {
            return;
        };
        debug!(
            author = author.as_deref().unwrap_or_default(),
            body = %msg.text,
            "handling stream update"
        );
        forwarder.forward(msg);
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_replace(next);
    }
}

/// Builder for [`ThreadSession`].
pub struct ThreadSessionBuilder {
    thread: ThreadSpec,
    config: Arc<Config>,
    http: Option<reqwest::Client>,
    backoff: Backoff,
    connect_timeout: Duration,
    stable_after: Duration,
    queue_capacity: usize,
}

impl ThreadSessionBuilder {
    pub fn new(thread: ThreadSpec, config: Arc<Config>) -> Self {
        Self {
            thread,
            config,
            http: None,
            backoff: Backoff::default(),
            connect_timeout: STREAM_CONNECT_TIMEOUT,
            stable_after: STABLE_CONNECTION,
            queue_capacity: QUEUE_CAPACITY,
        }
    }

    /// Share an HTTP client. Defaults to [`crate::http_client`].
    pub fn http(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Override the websocket handshake deadline (default 15 s).
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Uptime after which a closed connection resets the backoff (default 30 s).
    pub fn stable_after(mut self, uptime: Duration) -> Self {
        self.stable_after = uptime;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn build(self) -> ThreadSession {
        let (state, _) = watch::channel(ConnectionState::Discovering);
        ThreadSession {
            thread: self.thread,
            config: self.config,
            http: self.http.unwrap_or_else(crate::http_client),
            backoff: self.backoff,
            connect_timeout: self.connect_timeout,
            stable_after: self.stable_after,
            queue_capacity: self.queue_capacity,
            state,
        }
    }
}

/// One session per configured thread, in configured order.
pub fn sessions(config: &Arc<Config>, http: &reqwest::Client) -> Vec<ThreadSession> {
    config
        .threads
        .iter()
        .map(|thread| {
            ThreadSession::builder(thread.clone(), Arc::clone(config))
                .http(http.clone())
                .build()
        })
        .collect()
}

/// Spawn every session as its own task.
pub fn spawn_all(sessions: Vec<ThreadSession>) -> Vec<JoinHandle<()>> {
    sessions.into_iter().map(|s| tokio::spawn(s.run())).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
