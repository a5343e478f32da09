use std::io;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregator::{NodeFilter, DEFAULT_BANNED_KEYWORDS, DEFAULT_DISALLOWED_COUNTRY};
use crate::models::ProxyType;
use crate::utils::file::file_get;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn default_config_file() -> String {
    "clash_config.yaml".to_string()
}

fn default_exclusion_cache() -> String {
    "exclusion_cache.json".to_string()
}

fn default_speed_cache() -> String {
    "speed_cache.json".to_string()
}

fn default_limit() -> usize {
    10000
}

fn default_api_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_ports() -> Vec<u16> {
    vec![9090]
}

fn default_api_timeout_secs() -> u64 {
    3
}

fn default_selector_group() -> String {
    "节点选择".to_string()
}

fn default_primary_url() -> String {
    "https://www.instagram.com".to_string()
}

fn default_secondary_url() -> String {
    "https://www.youtube.com".to_string()
}

fn default_samples() -> usize {
    3
}

fn default_interval_secs() -> u64 {
    2
}

fn default_probe_timeout_secs() -> u64 {
    3
}

fn default_max_concurrent() -> usize {
    120
}

fn default_result_ttl_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_speed_url() -> String {
    "http://speed.cloudflare.com/__down?bytes=52428800".to_string()
}

fn default_speed_proxy() -> String {
    "http://127.0.0.1:7890".to_string()
}

fn default_window_secs() -> u64 {
    10
}

fn default_speed_limit() -> usize {
    968
}

fn default_min_speed() -> f64 {
    0.1
}

fn default_retries() -> u32 {
    3
}

fn default_retry_backoff_secs() -> u64 {
    1
}

fn default_banned_keywords() -> Vec<String> {
    DEFAULT_BANNED_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

fn default_disallowed_country() -> String {
    DEFAULT_DISALLOWED_COUNTRY.to_string()
}

/// Control-plane connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    #[serde(default = "default_api_host")]
    pub host: String,
    /// Candidate controller ports, tried in order
    #[serde(default = "default_api_ports")]
    pub ports: Vec<u16>,
    pub secret: String,
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
    /// Group whose active route is switched for speed tests
    #[serde(default = "default_selector_group")]
    pub selector_group: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            ports: default_api_ports(),
            secret: String::new(),
            timeout_secs: default_api_timeout_secs(),
            selector_group: default_selector_group(),
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Delay probing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    #[serde(default = "default_primary_url")]
    pub primary_url: String,
    #[serde(default = "default_secondary_url")]
    pub secondary_url: String,
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            primary_url: default_primary_url(),
            secondary_url: default_secondary_url(),
            samples: default_samples(),
            interval_secs: default_interval_secs(),
            timeout_secs: default_probe_timeout_secs(),
            max_concurrent: default_max_concurrent(),
            result_ttl_secs: default_result_ttl_secs(),
        }
    }
}

impl HealthSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }
}

/// Throughput probing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_speed_url")]
    pub url: String,
    /// The engine's local forwarding endpoint
    #[serde(default = "default_speed_proxy")]
    pub proxy: String,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Maximum number of nodes measured per run
    #[serde(default = "default_speed_limit")]
    pub limit: usize,
    /// Results below this throughput (MB/s) are not renamed
    #[serde(default = "default_min_speed")]
    pub min_speed: f64,
    /// Attempts for both the route switch and the download
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for SpeedSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_speed_url(),
            proxy: default_speed_proxy(),
            window_secs: default_window_secs(),
            limit: default_speed_limit(),
            min_speed: default_min_speed(),
            retries: default_retries(),
            retry_backoff_secs: default_retry_backoff_secs(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl SpeedSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}

/// Node admissibility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    #[serde(default = "default_banned_keywords")]
    pub banned_keywords: Vec<String>,
    #[serde(default = "default_disallowed_country")]
    pub disallowed_country: String,
    /// Types kept from structured sources; empty keeps all
    pub allowed_types: Vec<ProxyType>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            banned_keywords: default_banned_keywords(),
            disallowed_country: default_disallowed_country(),
            allowed_types: Vec::new(),
        }
    }
}

impl FilterSettings {
    /// A filter without GeoIP lookup; attach one with
    /// [`NodeFilter::with_country_lookup`].
    pub fn node_filter(&self) -> NodeFilter {
        NodeFilter::new(self.banned_keywords.clone(), self.disallowed_country.clone())
    }
}

/// Settings of one aggregation or check run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Output configuration; the JSON mirror is written next to it
    #[serde(default = "default_config_file")]
    pub config_file: String,
    #[serde(default = "default_exclusion_cache")]
    pub exclusion_cache: String,
    #[serde(default = "default_speed_cache")]
    pub speed_cache: String,
    /// Maximum number of nodes kept after delay probing
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Group whose members are probed; defaults to the first group after
    /// the entry selector
    pub test_group: Option<String>,
    pub api: ApiSettings,
    pub health: HealthSettings,
    pub speed: SpeedSettings,
    pub filter: FilterSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_file: default_config_file(),
            exclusion_cache: default_exclusion_cache(),
            speed_cache: default_speed_cache(),
            limit: default_limit(),
            test_group: None,
            api: ApiSettings::default(),
            health: HealthSettings::default(),
            speed: SpeedSettings::default(),
            filter: FilterSettings::default(),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses TOML, falling back to YAML when the content is not TOML.
    pub fn load_from_content(content: &str) -> Result<Self, SettingsError> {
        if toml::from_str::<toml::Value>(content).is_ok() {
            return Ok(toml::from_str(content)?);
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let content = file_get(path)?;
        Self::load_from_content(&content)
    }
}
