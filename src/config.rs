use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Bundled config for builds that ship without a .env file (mobile, wasm)
const BUNDLED_CONFIG: &str = include_str!("../assets/config.env");

pub const API_URL_VAR: &str = "VECTORA_API_URL";
pub const TIMEOUT_VAR: &str = "VECTORA_REQUEST_TIMEOUT_SECS";
pub const PROFILE_DIR_VAR: &str = "VECTORA_PROFILE_DIR";

const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    /// Base URL of the analysis API, without a trailing slash.
    pub api_base_url: String,
    /// `None` means no client-side timeout.
    pub request_timeout: Option<Duration>,
    /// Root of the file-backed profile store.
    pub profile_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            profile_dir: default_profile_dir(),
        }
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup(API_URL_VAR) {
            let url = url.trim().trim_end_matches('/');
            if !url.is_empty() {
                config.api_base_url = url.to_string();
            }
        }

        if let Some(raw) = lookup(TIMEOUT_VAR) {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{TIMEOUT_VAR} must be a whole number of seconds"))?;
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(dir) = lookup(PROFILE_DIR_VAR).filter(|d| !d.trim().is_empty()) {
            config.profile_dir = PathBuf::from(dir);
        }

        Ok(config)
    }
}

fn default_profile_dir() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        return data_dir.join("vectora").join("profile");
    }

    PathBuf::from("cache").join("profile")
}

#[cfg(not(target_arch = "wasm32"))]
pub fn load_dotenv() {
    // First try to load from .env file (desktop dev)
    if dotenvy::dotenv().is_ok() {
        return;
    }

    // Fall back to bundled config (mobile builds)
    load_bundled_config();
}

#[cfg(target_arch = "wasm32")]
pub fn load_dotenv() {
    load_bundled_config();
}

fn load_bundled_config() {
    for (key, value) in parse_env_lines(BUNDLED_CONFIG) {
        // Only set if not already set (allow env override)
        if env::var(key).is_err() {
            // SAFETY: called once at startup before any threads are spawned
            unsafe {
                env::set_var(key, value);
            }
        }
    }
}

fn parse_env_lines(source: &str) -> impl Iterator<Item = (&str, &str)> {
    source.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        line.split_once('=')
            .map(|(key, value)| (key.trim(), value.trim()))
    })
}
