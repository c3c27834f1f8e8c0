//! Resolving a thread id to its live stream endpoint.
//!
//! The about endpoint answers `{data: {websocket_url, title}}` on success and
//! `{error: <code>, message?: <text>}` on failure. The HTTP status is not
//! consulted; classification is driven entirely by the body.

use serde_json::Value;

use crate::error::DiscoveryError;

/// Stream location for one thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEndpoint {
    pub title: Option<String>,
    pub url: String,
}

/// Classified about response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryResult {
    Found(StreamEndpoint),
    /// `error == 404`.
    NotFound,
    /// Any other `error`, with the optional `message`.
    Remote { code: String, message: Option<String> },
    /// Neither a usable `error` nor `data.websocket_url`.
    Unrecognized,
}

impl DiscoveryResult {
    /// Classify an about response body.
    pub fn from_body(body: &Value) -> Self {
        let error = body.get("error").filter(|e| is_truthy(e));

        if let Some(code) = error {
            if code.as_i64() == Some(404) {
                return Self::NotFound;
            }
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .map(str::to_owned);
            return Self::Remote { code: code_string(code), message };
        }

        let Some(data) = body.get("data").filter(|d| is_truthy(d)) else {
            return Self::Unrecognized;
        };
        match data.get("websocket_url").and_then(Value::as_str) {
            Some(url) if !url.is_empty() => Self::Found(StreamEndpoint {
                title: data.get("title").and_then(Value::as_str).map(str::to_owned),
                url: url.to_string(),
            }),
            _ => Self::Unrecognized,
        }
    }
}

/// `{platform_base}/live/{thread_id}/about.json`
pub fn about_url(platform_base: &str, thread_id: &str) -> String {
    format!("{}/live/{}/about.json", platform_base.trim_end_matches('/'), thread_id)
}

/// Fetch and classify the about document at `url`.
///
/// The request deadline is whatever `http` was built with.
pub async fn discover(http: &reqwest::Client, url: &str) -> Result<DiscoveryResult, DiscoveryError> {
    let classify = |source: reqwest::Error| {
        if source.is_timeout() {
            DiscoveryError::Timeout { url: url.to_string() }
        } else {
            DiscoveryError::Request { url: url.to_string(), source }
        }
    };

    let resp = http.get(url).send().await.map_err(classify)?;
    let bytes = resp.bytes().await.map_err(classify)?;
    let body: Value = serde_json::from_slice(&bytes).map_err(|e| DiscoveryError::Decode {
        url: url.to_string(),
        detail: e.to_string(),
    })?;

    Ok(DiscoveryResult::from_body(&body))
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn code_string(code: &Value) -> String {
    match code {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
