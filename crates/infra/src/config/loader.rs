//! Configuration loader
//!
//! ## Loading Strategy
//! 1. If any override variable below is set, start from defaults and apply
//!    the environment
//! 2. Otherwise load the file named by `COURIER_CONFIG`, or the first
//!    `courier.toml` / `courier.json` found by [`probe_config_paths`]
//! 3. Otherwise use defaults
//!
//! Every result is checked with [`PipelineConfig::validate`].
//!
//! ## Environment Variables
//! - `COURIER_MAX_CONCURRENCY`, `COURIER_MAX_QUEUE_SIZE`,
//!   `COURIER_HIGH_PRIORITY_RATIO`
//! - `COURIER_CACHE_MAX_ITEMS`, `COURIER_CACHE_TTL_MS`,
//!   `COURIER_CACHE_SWEEP_INTERVAL_MS`, `COURIER_CACHE_NAMESPACE`
//! - `COURIER_DEDUP_GRACE_MS`
//! - `COURIER_REQUEST_TIMEOUT_MS`, `COURIER_MAX_RETRIES`
//! - `COURIER_BASE_URL`, `COURIER_USER_AGENT`, `COURIER_CONNECT_TIMEOUT_MS`

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use courier_common::error::CommonError;
use courier_domain::PipelineConfig;

/// Explicit config file path; skips probing.
pub const CONFIG_PATH_VAR: &str = "COURIER_CONFIG";

const OVERRIDE_VARS: &[&str] = &[
    "COURIER_MAX_CONCURRENCY",
    "COURIER_MAX_QUEUE_SIZE",
    "COURIER_HIGH_PRIORITY_RATIO",
    "COURIER_CACHE_MAX_ITEMS",
    "COURIER_CACHE_TTL_MS",
    "COURIER_CACHE_SWEEP_INTERVAL_MS",
    "COURIER_CACHE_NAMESPACE",
    "COURIER_DEDUP_GRACE_MS",
    "COURIER_REQUEST_TIMEOUT_MS",
    "COURIER_MAX_RETRIES",
    "COURIER_BASE_URL",
    "COURIER_USER_AGENT",
    "COURIER_CONNECT_TIMEOUT_MS",
];

const FILE_NAMES: &[&str] = &["courier.toml", "courier.json"];

/// Load configuration with automatic fallback strategy.
///
/// # Errors
/// Returns `CommonError::Config` if a variable or file cannot be parsed, or
/// the result fails validation.
pub fn load() -> Result<PipelineConfig, CommonError> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            return Ok(config);
        }
        Err(CommonError::Config { field: None, .. }) => {
            tracing::debug!("No configuration overrides in environment, trying file");
        }
        Err(e) => return Err(e),
    }

    let explicit = std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from);
    if explicit.is_some() || probe_config_paths().is_some() {
        return load_from_file(explicit);
    }

    tracing::info!("No configuration file found, using defaults");
    let config = PipelineConfig::default();
    config.validate()?;
    Ok(config)
}

/// Load configuration from environment variables applied over defaults.
///
/// # Errors
/// Returns `CommonError::Config` without a field when no override variable
/// is set, and with the variable name as field when a value is invalid.
pub fn load_from_env() -> Result<PipelineConfig, CommonError> {
    if !OVERRIDE_VARS.iter().any(|key| std::env::var_os(key).is_some()) {
        return Err(CommonError::config("no COURIER_* override variables are set"));
    }

    let mut config = PipelineConfig::default();
    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

fn apply_env_overrides(config: &mut PipelineConfig) -> Result<(), CommonError> {
    let scheduler = &mut config.scheduler;
    if let Some(value) = env_parsed("COURIER_MAX_CONCURRENCY")? {
        scheduler.max_concurrency = value;
    }
    if let Some(value) = env_parsed("COURIER_MAX_QUEUE_SIZE")? {
        scheduler.max_queue_size = value;
    }
    if let Some(value) = env_parsed("COURIER_HIGH_PRIORITY_RATIO")? {
        scheduler.high_priority_ratio = value;
    }

    let cache = &mut config.cache;
    if let Some(value) = env_parsed("COURIER_CACHE_MAX_ITEMS")? {
        cache.max_memory_items = value;
    }
    if let Some(value) = env_millis("COURIER_CACHE_TTL_MS")? {
        cache.default_ttl = value;
    }
    if let Some(value) = env_millis("COURIER_CACHE_SWEEP_INTERVAL_MS")? {
        cache.sweep_interval = value;
    }
    if let Ok(namespace) = std::env::var("COURIER_CACHE_NAMESPACE") {
        cache.namespace = namespace;
    }

    if let Some(value) = env_millis("COURIER_DEDUP_GRACE_MS")? {
        config.dedup.grace = value;
    }

    if let Some(value) = env_millis("COURIER_REQUEST_TIMEOUT_MS")? {
        config.request.timeout = value;
    }
    if let Some(value) = env_parsed("COURIER_MAX_RETRIES")? {
        config.request.retry.max_retries = value;
    }

    let http = &mut config.http;
    if let Ok(base_url) = std::env::var("COURIER_BASE_URL") {
        http.base_url = Some(base_url).filter(|url| !url.trim().is_empty());
    }
    if let Ok(agent) = std::env::var("COURIER_USER_AGENT") {
        http.user_agent = agent;
    }
    if let Some(value) = env_millis("COURIER_CONNECT_TIMEOUT_MS")? {
        http.connect_timeout = value;
    }
    Ok(())
}

/// Load configuration from a file.
///
/// If `path` is `None`, probes the standard locations. Format is detected
/// by extension (`.toml` or `.json`).
///
/// # Errors
/// Returns `CommonError::Config` if the file is missing, unreadable, in an
/// unsupported format, malformed, or fails validation.
pub fn load_from_file(path: Option<PathBuf>) -> Result<PipelineConfig, CommonError> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CommonError::config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CommonError::config("No config file found in any of the standard locations")
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CommonError::config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> Result<PipelineConfig, CommonError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CommonError::config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CommonError::config(format!("Invalid JSON format: {e}"))),
        _ => Err(CommonError::config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the working directory, its parent, and the executable's directory
/// for `courier.toml` then `courier.json`.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        let parent = cwd.join("..");
        dirs.extend([cwd, parent]);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }
    probe_dirs(&dirs)
}

fn probe_dirs(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

fn env_parsed<T>(key: &str) -> Result<Option<T>, CommonError>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| CommonError::config_field(key, format!("invalid value '{raw}': {e}"))),
        Err(_) => Ok(None),
    }
}

fn env_millis(key: &str) -> Result<Option<Duration>, CommonError> {
    Ok(env_parsed::<u64>(key)?.map(Duration::from_millis))
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
pub(crate) fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
