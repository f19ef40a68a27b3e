use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chat::poller::DEFAULT_POLL_INTERVAL;

pub const DEFAULT_CONFIG_PATH: &str = "config/chat.json";
pub const GATEWAY_URL_ENV: &str = "CHAT_GATEWAY_URL";
pub const GATEWAY_ANON_KEY_ENV: &str = "CHAT_GATEWAY_ANON_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the hosted backend, e.g. `https://xyz.supabase.co`.
    pub gateway_url: String,
    pub anon_key: String,
    pub poll_interval_ms: u64,
    pub data_dir: String,
    pub persist_session: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway_url: String::new(),
            anon_key: String::new(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            data_dir: "data".to_string(),
            persist_session: true,
        }
    }
}

impl AppConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Overlay values found by `lookup` (normally the process environment).
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(GATEWAY_URL_ENV).filter(|v| !v.is_empty()) {
            self.gateway_url = url;
        }
        if let Some(key) = lookup(GATEWAY_ANON_KEY_ENV).filter(|v| !v.is_empty()) {
            self.anon_key = key;
        }
        self
    }

    pub fn has_gateway(&self) -> bool {
        !self.gateway_url.is_empty() && !self.anon_key.is_empty()
    }
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

/// File config plus environment overrides; logs when the backend is unset.
pub fn resolve_config(path: &str) -> AppConfig {
    let config = load_config(path).with_env_overrides(|name| std::env::var(name).ok());
    if !config.has_gateway() {
        log::error!(
            "Missing gateway settings: set {GATEWAY_URL_ENV} and {GATEWAY_ANON_KEY_ENV} or fill {path}"
        );
    }
    config
}
