//! Runtime configuration read from the environment (`.env` is loaded by the binaries).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;

use crate::error::SyncError;

pub const DEFAULT_DATA_GOV_BASE_URL: &str = "https://api.data.gov.in";

/// "Current daily price of various commodities from various markets"
pub const DEFAULT_MANDI_RESOURCE_ID: &str = "9ef84268-d588-465a-a308-a864a43d0070";

pub const DEFAULT_PAGE_LIMIT: u32 = 1000;
pub const DEFAULT_MAX_PAGES: u32 = 50;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 43200; // 12 hours
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_PRIORITY_STATES_FILE: &str = "config/priority_states.json";

const ENV_DATABASE_URL: &str = "DATABASE_URL";
const ENV_API_KEY: &str = "DATA_GOV_API_KEY";
const ENV_BASE_URL: &str = "DATA_GOV_BASE_URL";
const ENV_RESOURCE_ID: &str = "MANDI_RESOURCE_ID";
const ENV_PAGE_LIMIT: &str = "MANDI_PAGE_LIMIT";
const ENV_MAX_PAGES: &str = "MANDI_MAX_PAGES";
const ENV_TIMEOUT: &str = "UPSTREAM_TIMEOUT_SECS";
const ENV_SYNC_INTERVAL: &str = "MANDI_SYNC_INTERVAL_SECS";
const ENV_SYNC_ON_STARTUP: &str = "MANDI_SYNC_ON_STARTUP";
const ENV_RETENTION_DAYS: &str = "MANDI_RETENTION_DAYS";
const ENV_TRIGGER_TOKEN: &str = "SYNC_TRIGGER_TOKEN";
const ENV_BIND_ADDR: &str = "BIND_ADDR";
const ENV_PRIORITY_STATES: &str = "PRIORITY_STATES";
const ENV_PRIORITY_STATES_FILE: &str = "PRIORITY_STATES_FILE";

/// Upstream open-data API settings
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub resource_id: String,
    pub api_key: String,
    pub page_limit: u32,
    pub max_pages: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub upstream: UpstreamConfig,
    pub priority_states: PriorityStates,
    pub sync_interval_secs: u64,
    pub sync_on_startup: bool,
    pub retention_days: Option<u32>,
    pub trigger_token: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, SyncError> {
        let database_url = required(ENV_DATABASE_URL)?;
        let upstream = UpstreamConfig::from_env()?;
        let priority_states = PriorityStates::from_env()?;

        Ok(Self {
            database_url,
            bind_addr: env::var(ENV_BIND_ADDR).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            upstream,
            priority_states,
            sync_interval_secs: parsed(ENV_SYNC_INTERVAL)?.unwrap_or(DEFAULT_SYNC_INTERVAL_SECS),
            sync_on_startup: env::var(ENV_SYNC_ON_STARTUP)
                .map(|v| v.to_lowercase() != "false")
                .unwrap_or(true),
            retention_days: parsed(ENV_RETENTION_DAYS)?,
            trigger_token: env::var(ENV_TRIGGER_TOKEN).ok().filter(|t| !t.is_empty()),
        })
    }
}

impl UpstreamConfig {
    pub fn from_env() -> Result<Self, SyncError> {
        let page_limit: u32 = parsed(ENV_PAGE_LIMIT)?.unwrap_or(DEFAULT_PAGE_LIMIT);
        if page_limit == 0 {
            return Err(SyncError::InvalidConfig(format!(
                "{} must be greater than zero",
                ENV_PAGE_LIMIT
            )));
        }

        Ok(Self {
            base_url: env::var(ENV_BASE_URL)
                .unwrap_or_else(|_| DEFAULT_DATA_GOV_BASE_URL.to_string()),
            resource_id: env::var(ENV_RESOURCE_ID)
                .unwrap_or_else(|_| DEFAULT_MANDI_RESOURCE_ID.to_string()),
            api_key: required(ENV_API_KEY)?,
            page_limit,
            max_pages: parsed(ENV_MAX_PAGES)?.unwrap_or(DEFAULT_MAX_PAGES).max(1),
            timeout_secs: parsed(ENV_TIMEOUT)?.unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        })
    }
}

fn required(name: &str) -> Result<String, SyncError> {
    env::var(name).map_err(|_| SyncError::InvalidConfig(format!("{} must be set", name)))
}

fn parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>, SyncError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SyncError::InvalidConfig(format!("{} has invalid value '{}'", name, raw))),
        _ => Ok(None),
    }
}

/// Priority-states allow-list, serialized as `{ "states": [...] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityStatesFile {
    pub states: Vec<String>,
}

/// Allow-list of states whose rows are kept. Lookups are case-insensitive and
/// return the configured spelling so every run stores the same state key.
#[derive(Debug, Clone)]
pub struct PriorityStates {
    canonical: HashMap<String, String>,
}

impl PriorityStates {
    pub fn new<I, S>(states: I) -> Result<Self, SyncError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let canonical: HashMap<String, String> = states
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .map(|s| (s.to_lowercase(), s))
            .collect();

        if canonical.is_empty() {
            return Err(SyncError::InvalidConfig(
                "priority states allow-list is empty".to_string(),
            ));
        }

        Ok(Self { canonical })
    }

    /// Parse a comma separated list, e.g. `Punjab,Haryana,Uttar Pradesh`.
    pub fn from_csv(raw: &str) -> Result<Self, SyncError> {
        Self::new(raw.split(','))
    }

    pub fn from_json(raw: &str) -> Result<Self, SyncError> {
        let file: PriorityStatesFile = serde_json::from_str(raw)
            .map_err(|e| SyncError::InvalidConfig(format!("priority states: {}", e)))?;
        Self::new(file.states)
    }

    pub fn from_file(path: &Path) -> Result<Self, SyncError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SyncError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    /// `PRIORITY_STATES` wins over `PRIORITY_STATES_FILE`.
    pub fn from_env() -> Result<Self, SyncError> {
        if let Ok(raw) = env::var(ENV_PRIORITY_STATES) {
            if !raw.trim().is_empty() {
                return Self::from_csv(&raw);
            }
        }

        let path = env::var(ENV_PRIORITY_STATES_FILE)
            .unwrap_or_else(|_| DEFAULT_PRIORITY_STATES_FILE.to_string());
        Self::from_file(Path::new(&path))
    }

    /// Configured spelling of `state`, or `None` when it is not allowed.
    pub fn canonical(&self, state: &str) -> Option<&str> {
        self.canonical
            .get(&state.trim().to_lowercase())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.canonical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canonical.is_empty()
    }

    pub fn states(&self) -> Vec<&str> {
        let mut states: Vec<&str> = self.canonical.values().map(String::as_str).collect();
        states.sort_unstable();
        states
    }
}
