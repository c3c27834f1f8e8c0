//! Configuration discovery, merging and validation.
//!
//! ## Search order
//! Each directory from the working directory upwards (stopping after `$HOME`)
//! is checked for, in order:
//!
//! | File                              | Format                                  |
//! |-----------------------------------|-----------------------------------------|
//! | `package.json`                    | JSON, `"live-counting-bridge"` key only |
//! | `config.json`                     | JSON                                    |
//! | `.live-counting-bridgerc`         | YAML (JSON is valid YAML)               |
//! | `.live-counting-bridgerc.json`    | JSON                                    |
//! | `.live-counting-bridgerc.yaml`    | YAML                                    |
//! | `.live-counting-bridgerc.yml`     | YAML                                    |
//! | `.live-counting-bridgerc.toml`    | TOML                                    |
//! | `live-counting-bridge.toml`       | TOML                                    |
//!
//! The first hit is shallow-merged over `{apiBase: "", threads: [], token: ""}`
//! and validated. No hit means the defaults, which then fail validation
//! because `apiBase` is empty.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ConfigError;

/// Key read out of `package.json`.
pub const PACKAGE_KEY: &str = "live-counting-bridge";

/// Gateway used when a thread entry does not name one.
pub const DEFAULT_GATEWAY: &str = "livecounting";

/// Origin the about endpoint is built from unless `platformBase` overrides it.
pub const DEFAULT_PLATFORM_BASE: &str = "https://www.reddit.com";

/// File names checked in each directory, in priority order.
pub const SEARCH_PLACES: &[&str] = &[
    "package.json",
    "config.json",
    ".live-counting-bridgerc",
    ".live-counting-bridgerc.json",
    ".live-counting-bridgerc.yaml",
    ".live-counting-bridgerc.yml",
    ".live-counting-bridgerc.toml",
    "live-counting-bridge.toml",
];

/// One configured thread and the gateway its updates are tagged with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSpec {
    pub id: String,
    pub gateway: String,
}

impl ThreadSpec {
    pub fn new(id: impl Into<String>, gateway: Option<String>) -> Self {
        Self {
            id: id.into(),
            gateway: gateway.unwrap_or_else(|| DEFAULT_GATEWAY.to_string()),
        }
    }
}

/// Validated, immutable runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Bridge API origin, without a trailing slash.
    pub api_base: String,
    /// Bearer token for the bridge API. `None` when unset or empty.
    pub token: Option<String>,
    /// Threads to bridge, in configured order.
    pub threads: Vec<ThreadSpec>,
    /// Platform origin used for discovery, without a trailing slash.
    pub platform_base: String,
}

/// Built-in defaults every loaded file is merged over.
pub fn defaults() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("apiBase".into(), Value::String(String::new()));
    map.insert("threads".into(), Value::Array(Vec::new()));
    map.insert("token".into(), Value::String(String::new()));
    map
}

/// Load configuration from `explicit` when given, otherwise search from the
/// working directory.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            let raw = read_file(path)?.unwrap_or(Value::Object(Map::new()));
            debug!(path = %path.display(), "loaded configuration");
            from_value(raw, path)
        }
        None => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            load_from(&cwd)
        }
    }
}

/// Search from `start` upwards and load the first configuration found.
pub fn load_from(start: &Path) -> Result<Config, ConfigError> {
    match search(start)? {
        Some((path, raw)) => {
            debug!(path = %path.display(), "loaded configuration");
            from_value(raw, &path)
        }
        None => {
            debug!("could not find existing configuration, using default");
            validate(defaults())
        }
    }
}

/// Find the first search place under `start` or its ancestors that yields a
/// configuration value.
pub fn search(start: &Path) -> Result<Option<(PathBuf, Value)>, ConfigError> {
    let home = std::env::var_os("HOME").map(PathBuf::from);

    for dir in start.ancestors() {
        for name in SEARCH_PLACES {
            let candidate = dir.join(name);
            if !candidate.is_file() {
                continue;
            }
            if let Some(raw) = read_file(&candidate)? {
                return Ok(Some((candidate, raw)));
            }
        }
        if home.as_deref() == Some(dir) {
            break;
        }
    }

    Ok(None)
}

/// Merge `raw` over the defaults and validate it. `path` is only used for
/// error messages.
pub fn from_value(raw: Value, path: &Path) -> Result<Config, ConfigError> {
    let overrides = match raw {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        _ => return Err(ConfigError::NotAMap { path: path.to_path_buf() }),
    };

    let mut merged = defaults();
    merged.extend(overrides);
    validate(merged)
}

/// Check a merged settings map and build the typed [`Config`].
pub fn validate(merged: Map<String, Value>) -> Result<Config, ConfigError> {
    let api_base = match merged.get("apiBase") {
        Some(Value::String(s)) if !s.is_empty() => s.trim_end_matches('/').to_string(),
        _ => return Err(ConfigError::MissingApiBase),
    };

    let entries = match merged.get("threads") {
        Some(Value::Array(entries)) => entries,
        _ => return Err(ConfigError::ThreadsNotSequence),
    };
    let threads = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| parse_thread(index, entry))
        .collect::<Result<Vec<_>, _>>()?;

    let token = match merged.get("token") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(ConfigError::InvalidToken),
    };

    let platform_base = match merged.get("platformBase") {
        None | Some(Value::Null) => DEFAULT_PLATFORM_BASE.to_string(),
        Some(Value::String(s)) if !s.is_empty() => s.trim_end_matches('/').to_string(),
        Some(_) => return Err(ConfigError::InvalidPlatformBase),
    };

    Ok(Config { api_base, token, threads, platform_base })
}

fn parse_thread(index: usize, entry: &Value) -> Result<ThreadSpec, ConfigError> {
    let invalid = |reason| ConfigError::InvalidThread { index, reason };

    match entry {
        Value::String(id) if !id.is_empty() => Ok(ThreadSpec::new(id.clone(), None)),
        Value::Array(parts) => {
            let id = match parts.first() {
                Some(Value::String(id)) if !id.is_empty() => id.clone(),
                _ => return Err(invalid("thread id must be a non-empty string")),
            };
            let gateway = match parts.get(1) {
                None | Some(Value::Null) => None,
                Some(Value::String(g)) if !g.is_empty() => Some(g.clone()),
                Some(_) => return Err(invalid("gateway must be a non-empty string")),
            };
            Ok(ThreadSpec::new(id, gateway))
        }
        _ => Err(invalid("expected [threadId, gateway] or a thread id string")),
    }
}

/// Read and parse one candidate file.
///
/// Returns `Ok(None)` for a `package.json` without the bridge key so the
/// search can move on to the next place.
fn read_file(path: &Path) -> Result<Option<Value>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |detail: String| ConfigError::Parse { path: path.to_path_buf(), detail };

    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if file_name == "package.json" {
        let mut manifest: Value = serde_json::from_str(&raw).map_err(|e| parse_err(e.to_string()))?;
        // a null key counts as absent
        return Ok(manifest.get_mut(PACKAGE_KEY).map(Value::take).filter(|v| !v.is_null()));
    }

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let value = match ext {
        "json" => serde_json::from_str(&raw).map_err(|e| parse_err(e.to_string()))?,
        "toml" => {
            let v: toml::Value = toml::from_str(&raw).map_err(|e| parse_err(e.to_string()))?;
            serde_json::to_value(v).map_err(|e| parse_err(e.to_string()))?
        }
        // .yaml, .yml and the extensionless rc file
        _ => {
            let v: serde_yaml::Value = serde_yaml::from_str(&raw).map_err(|e| parse_err(e.to_string()))?;
            serde_json::to_value(v).map_err(|e| parse_err(e.to_string()))?
        }
    };
    Ok(Some(value))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
