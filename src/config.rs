//! Configuration loading and validation
//!
//! Values come from `config.json`, then `STEAM_MONITOR_*` environment variables
//! (optionally seeded from a `.env` file), then command-line overrides. Only
//! fully validated values reach [`AppConfig`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::content_log::LogEncoding;

pub const ENV_PREFIX: &str = "STEAM_MONITOR_";
pub const DEFAULT_CONFIG_PATH: &str = "config.json";
pub const DEFAULT_DOTENV_PATH: &str = ".env";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read .env: {}", .path.display())]
    Dotenv {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to read config file: {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid JSON in config file: {}", .path.display())]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Config root must be a JSON object")]
    NotAnObject,
    #[error("Invalid integer for {0}")]
    InvalidInteger(&'static str),
    #[error("Value for {name} must be >= {min}")]
    BelowMinimum { name: &'static str, min: u64 },
    #[error("Missing or empty value for {0}")]
    MissingValue(&'static str),
    #[error("Invalid log level for {0}")]
    InvalidLogLevel(&'static str),
    #[error("Missing or empty list for {0}")]
    MissingList(&'static str),
    #[error("{0}")]
    InvalidEncoding(String),
    #[error("Invalid timestamp format: {0}")]
    InvalidTimestampFormat(String),
}

/// Verbosity of the diagnostic log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARNING" => Some(LogLevel::Warning),
            "ERROR" => Some(LogLevel::Error),
            "CRITICAL" => Some(LogLevel::Critical),
            _ => None,
        }
    }

    /// Level directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error | LogLevel::Critical => "error",
        }
    }
}

/// Validated application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub interval_seconds: u64,
    pub samples: u64,
    pub tail_bytes: u64,
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
    pub log_encoding: LogEncoding,
    pub timestamp_format: String,
    /// Explicit Steam root; skips install path discovery when set
    pub steam_root: Option<PathBuf>,
    pub steam_log_rel_path: String,
    pub library_vdf_rel_path: String,
    pub manifest_pattern: String,
    pub registry_paths: Vec<String>,
    pub registry_values: Vec<String>,
    pub steam_root_candidates: Vec<String>,
}

/// Config file contents before validation
///
/// Fields stay loosely typed because environment overrides arrive as strings
/// and numbers may be written either way in JSON.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub interval_seconds: Option<Value>,
    pub samples: Option<Value>,
    pub tail_bytes: Option<Value>,
    pub log_level: Option<Value>,
    pub log_file: Option<Value>,
    pub log_encoding: Option<Value>,
    pub timestamp_format: Option<Value>,
    pub steam_root: Option<Value>,
    pub steam_log_rel_path: Option<Value>,
    pub library_vdf_rel_path: Option<Value>,
    pub manifest_pattern: Option<Value>,
    pub registry: Option<Value>,
    pub steam_root_candidates: Option<Value>,
}

/// Command-line values that win over every other source
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub dotenv_path: Option<PathBuf>,
    pub samples: Option<u64>,
    pub interval_seconds: Option<u64>,
    pub steam_root: Option<PathBuf>,
}

/// Loads configuration from `.env`, JSON, environment and CLI overrides
pub struct ConfigLoader {
    env_prefix: String,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(ENV_PREFIX)
    }
}

impl ConfigLoader {
    pub fn new(env_prefix: &str) -> Self {
        Self {
            env_prefix: env_prefix.to_string(),
        }
    }

    fn env(&self, name: &str) -> Option<String> {
        std::env::var(format!("{}{}", self.env_prefix, name)).ok()
    }

    pub fn load(&self, overrides: &ConfigOverrides) -> Result<AppConfig, ConfigError> {
        let dotenv_path = overrides
            .dotenv_path
            .clone()
            .or_else(|| self.env("DOTENV").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DOTENV_PATH));
        load_dotenv(&dotenv_path)?;

        let config_path = overrides
            .config_path
            .clone()
            .or_else(|| self.env("CONFIG").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut raw = read_config_file(&config_path)?;

        merge_env(&mut raw, |name| self.env(name));
        apply_overrides(&mut raw, overrides);
        build_config(&raw)
    }
}

/// Sets variables from a dotenv file without replacing ones already set
///
/// A missing file is not an error.
pub fn load_dotenv(path: &Path) -> Result<(), ConfigError> {
    if !path.exists() {
        return Ok(());
    }
    let bytes = fs::read(path).map_err(|source| ConfigError::Dotenv {
        path: path.to_path_buf(),
        source,
    })?;

    for (key, value) in parse_dotenv(&String::from_utf8_lossy(&bytes)) {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(key, value);
        }
    }
    Ok(())
}

/// `KEY=VALUE` pairs from dotenv text; comments and lines without `=` are skipped
pub fn parse_dotenv(text: &str) -> Vec<(String, String)> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (key.trim().to_string(), value.to_string())
        })
        .filter(|(key, _)| !key.is_empty())
        .collect()
}

pub fn read_config_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    parse_config_text(&text, path)
}

fn parse_config_text(text: &str, path: &Path) -> Result<RawConfig, ConfigError> {
    let value: Value = serde_json::from_str(text).map_err(|source| ConfigError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })?;
    if !value.is_object() {
        return Err(ConfigError::NotAnObject);
    }
    serde_json::from_value(value).map_err(|source| ConfigError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}

fn env_list(raw: Option<String>) -> Option<Value> {
    let items: Vec<Value> = raw?
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| Value::String(part.to_string()))
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(Value::Array(items))
    }
}

/// Applies environment overrides; `lookup` receives names without the prefix
pub fn merge_env(raw: &mut RawConfig, lookup: impl Fn(&str) -> Option<String>) {
    let scalars: [(&str, &mut Option<Value>); 11] = [
        ("INTERVAL_SECONDS", &mut raw.interval_seconds),
        ("SAMPLES", &mut raw.samples),
        ("TAIL_BYTES", &mut raw.tail_bytes),
        ("LOG_LEVEL", &mut raw.log_level),
        ("LOG_FILE", &mut raw.log_file),
        ("LOG_ENCODING", &mut raw.log_encoding),
        ("TIMESTAMP_FORMAT", &mut raw.timestamp_format),
        ("STEAM_ROOT", &mut raw.steam_root),
        ("LOG_REL_PATH", &mut raw.steam_log_rel_path),
        ("LIBRARY_VDF_REL_PATH", &mut raw.library_vdf_rel_path),
        ("MANIFEST_PATTERN", &mut raw.manifest_pattern),
    ];
    for (name, slot) in scalars {
        if let Some(value) = lookup(name) {
            *slot = Some(Value::String(value));
        }
    }

    let mut registry = match raw.registry.take() {
        Some(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    if let Some(paths) = env_list(lookup("REGISTRY_PATHS")) {
        registry.insert("paths".to_string(), paths);
    }
    if let Some(values) = env_list(lookup("REGISTRY_VALUES")) {
        registry.insert("values".to_string(), values);
    }
    raw.registry = Some(Value::Object(registry));

    if let Some(candidates) = env_list(lookup("ROOT_CANDIDATES")) {
        raw.steam_root_candidates = Some(candidates);
    }
}

fn apply_overrides(raw: &mut RawConfig, overrides: &ConfigOverrides) {
    if let Some(samples) = overrides.samples {
        raw.samples = Some(Value::from(samples));
    }
    if let Some(interval) = overrides.interval_seconds {
        raw.interval_seconds = Some(Value::from(interval));
    }
    if let Some(root) = &overrides.steam_root {
        raw.steam_root = Some(Value::String(root.to_string_lossy().to_string()));
    }
}

fn to_int(value: Option<&Value>, name: &'static str, min: u64) -> Result<u64, ConfigError> {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_u64().or_else(|| {
            number
                .as_i64()
                .filter(|n| *n < 0)
                .map(|_| 0)
        }),
        Some(Value::String(text)) => match text.trim().parse::<i64>() {
            Ok(n) if n < 0 => Some(0),
            Ok(n) => Some(n as u64),
            Err(_) => None,
        },
        _ => None,
    };
    let parsed = parsed.ok_or(ConfigError::InvalidInteger(name))?;
    if parsed < min {
        return Err(ConfigError::BelowMinimum { name, min });
    }
    Ok(parsed)
}

fn to_optional_str(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        _ => None,
    }
}

fn to_str(value: Option<&Value>, name: &'static str) -> Result<String, ConfigError> {
    to_optional_str(value).ok_or(ConfigError::MissingValue(name))
}

fn value_to_item(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_string(),
        other => other.to_string(),
    }
}

fn string_items(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(value_to_item)
            .filter(|item| !item.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn to_list(value: Option<&Value>, name: &'static str) -> Result<Vec<String>, ConfigError> {
    let items = string_items(value);
    if items.is_empty() {
        return Err(ConfigError::MissingList(name));
    }
    Ok(items)
}

/// Platform key used by per-platform candidate lists
pub fn platform_key() -> &'static str {
    if cfg!(windows) {
        "windows"
    } else if cfg!(target_os = "macos") {
        "darwin"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "default"
    }
}

fn to_candidates(value: Option<&Value>, platform: &str) -> Vec<String> {
    match value {
        Some(Value::Array(_)) => string_items(value),
        Some(Value::Object(map)) => {
            let entry = map
                .get(platform)
                .filter(|v| !is_empty_value(v))
                .or_else(|| map.get("default"));
            string_items(entry)
        }
        _ => Vec::new(),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

fn validate_timestamp_format(format: &str) -> Result<(), ConfigError> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::InvalidTimestampFormat(format.to_string()));
    }
    Ok(())
}

/// Validates raw values into an [`AppConfig`]
pub fn build_config(raw: &RawConfig) -> Result<AppConfig, ConfigError> {
    build_config_for_platform(raw, platform_key())
}

fn build_config_for_platform(raw: &RawConfig, platform: &str) -> Result<AppConfig, ConfigError> {
    let interval_seconds = to_int(raw.interval_seconds.as_ref(), "interval_seconds", 1)?;
    let samples = to_int(raw.samples.as_ref(), "samples", 1)?;
    let tail_bytes = to_int(raw.tail_bytes.as_ref(), "tail_bytes", 1)?;

    let log_level = to_optional_str(raw.log_level.as_ref())
        .and_then(|level| LogLevel::parse(&level))
        .ok_or(ConfigError::InvalidLogLevel("log_level"))?;
    let log_file = to_optional_str(raw.log_file.as_ref()).map(PathBuf::from);

    let log_encoding = to_str(raw.log_encoding.as_ref(), "log_encoding")?
        .parse::<LogEncoding>()
        .map_err(ConfigError::InvalidEncoding)?;

    let timestamp_format = to_str(raw.timestamp_format.as_ref(), "timestamp_format")?;
    validate_timestamp_format(&timestamp_format)?;

    let steam_log_rel_path = to_str(raw.steam_log_rel_path.as_ref(), "steam_log_rel_path")?;
    let library_vdf_rel_path = to_str(raw.library_vdf_rel_path.as_ref(), "library_vdf_rel_path")?;
    let manifest_pattern = to_str(raw.manifest_pattern.as_ref(), "manifest_pattern")?;

    let registry = raw.registry.as_ref().and_then(Value::as_object);
    let registry_paths = to_list(registry.and_then(|r| r.get("paths")), "registry.paths")?;
    let registry_values = to_list(registry.and_then(|r| r.get("values")), "registry.values")?;
    let steam_root_candidates = to_candidates(raw.steam_root_candidates.as_ref(), platform);

    let steam_root = to_optional_str(raw.steam_root.as_ref()).map(PathBuf::from);

    Ok(AppConfig {
        interval_seconds,
        samples,
        tail_bytes,
        log_level,
        log_file,
        log_encoding,
        timestamp_format,
        steam_root,
        steam_log_rel_path,
        library_vdf_rel_path,
        manifest_pattern,
        registry_paths,
        registry_values,
        steam_root_candidates,
    })
}
