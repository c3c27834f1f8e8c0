//! Crate error types.
//!
//! Only [`ConfigError`] is fatal. Every other error is logged by the session
//! that produced it and handled by rediscovery, a skipped frame, or a dropped
//! message.

use std::path::PathBuf;

use thiserror::Error;

/// Invalid or unreadable configuration. The process exits on any of these.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {detail}", .path.display())]
    Parse { path: PathBuf, detail: String },

    #[error("config in {} must be a map of settings", .path.display())]
    NotAMap { path: PathBuf },

    #[error("the bridge api base (`apiBase`) must be provided as a non-empty string")]
    MissingApiBase,

    #[error("`threads` must be an array of arrays specifying thread id and bridge gateway")]
    ThreadsNotSequence,

    #[error("thread entry {index} is invalid: {reason}")]
    InvalidThread { index: usize, reason: &'static str },

    #[error("`token` must be a string")]
    InvalidToken,

    #[error("`platformBase` must be a non-empty string")]
    InvalidPlatformBase,
}

/// The about request could not produce a JSON body.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("response from {url} is not valid JSON: {detail}")]
    Decode { url: String, detail: String },
}

/// The websocket handshake did not complete.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to connect to stream {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<tokio_tungstenite::tungstenite::Error>,
    },

    #[error("connecting to stream {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },
}

/// A single stream frame could not be decoded.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary frame is not valid UTF-8")]
    Utf8,
}

/// Classified failure of a bridge post.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bridge request was unauthorized, was a valid token supplied?")]
    Unauthorized,

    #[error("bridge returned HTTP {status}{}", .message.as_deref().map(|m| format!(", message: '{m}'")).unwrap_or_default())]
    Status { status: u16, message: Option<String> },

    #[error("bridge request timed out")]
    Timeout,

    #[error("bridge request failed: {0}")]
    Transport(#[source] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_the_file() {
        let err = ConfigError::Parse {
            path: PathBuf::from("config.json"),
            detail: "expected value at line 1".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("config.json"), "path in display: {s}");
        assert!(s.contains("expected value"), "detail in display: {s}");
    }

    #[test]
    fn bridge_status_with_message() {
        let err = BridgeError::Status { status: 500, message: Some("gateway offline".to_string()) };
        assert_eq!(err.to_string(), "bridge returned HTTP 500, message: 'gateway offline'");
    }

    #[test]
    fn bridge_status_without_message() {
        let err = BridgeError::Status { status: 502, message: None };
        assert_eq!(err.to_string(), "bridge returned HTTP 502");
    }

    #[test]
    fn unauthorized_mentions_token() {
        assert!(BridgeError::Unauthorized.to_string().contains("token"));
    }

    #[test]
    fn stream_timeout_display() {
        let err = StreamError::Timeout { url: "wss://x".to_string(), secs: 15 };
        assert_eq!(err.to_string(), "connecting to stream wss://x timed out after 15s");
    }

    #[test]
    fn frame_error_from_serde() {
        let parse = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = FrameError::from(parse);
        assert!(err.to_string().starts_with("frame is not valid JSON"));
    }
}
