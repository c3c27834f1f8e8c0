//! # live-counting-bridge
//!
//! Relays live thread updates into a chat bridge API.
//!
//! For every configured thread a [`session::ThreadSession`] resolves the
//! thread's websocket through the platform's about endpoint, listens for
//! `update` frames and posts each one to `{apiBase}/api/message` tagged with
//! the thread's gateway. Closed streams trigger a full rediscovery.
//!
//! ```rust,ignore
//! let config = Arc::new(config::load(None)?);
//! let http = http_client();
//! let handles = session::spawn_all(session::sessions(&config, &http));
//! ```

pub mod backoff;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod event;
pub mod session;

use std::time::Duration;

/// TCP connect deadline for every HTTP request.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Whole-request deadline for discovery and bridge posts.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// `User-Agent` sent with every HTTP request.
pub fn user_agent() -> String {
    format!("Live Counting Bridge v{}", env!("CARGO_PKG_VERSION"))
}

/// HTTP client shared by every session.
pub fn http_client() -> reqwest::Client {
    // reqwest::Client::builder() can fail in extreme environments, but
    // unwrap_or_default() falls back to a default client instead of panicking.
    reqwest::Client::builder()
        .user_agent(user_agent())
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .unwrap_or_default()
}
