// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Server configuration: a TOML file, parsed with `toml::from_str` over
//! `std::fs::read_to_string`, with every field independently
//! overridable by an environment variable and layered into nested
//! per-concern config structs. Invalid configuration fails fast at
//! startup.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_aux::field_attributes::deserialize_number_from_string;

use crate::errors::{AmityError, AmityResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub webhooks: WebhookConfig,
    #[serde(default)]
    pub plugins: PluginConfig,
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            gateway: GatewayConfig::default(),
            webhooks: WebhookConfig::default(),
            plugins: PluginConfig::default(),
            rate_limits: RateLimitConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
    #[serde(default)]
    pub instance_description: Option<String>,
    #[serde(default = "default_domain")]
    pub domain: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            instance_description: None,
            domain: default_domain(),
        }
    }
}

fn default_instance_name() -> String {
    "AmityVox Instance".to_string()
}

fn default_domain() -> String {
    "localhost".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_heartbeat_interval_ms", deserialize_with = "deserialize_number_from_string")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_identify_timeout_secs", deserialize_with = "deserialize_number_from_string")]
    pub identify_timeout_secs: u64,
    #[serde(default = "default_resume_window_secs", deserialize_with = "deserialize_number_from_string")]
    pub resume_window_secs: u64,
}

impl GatewayConfig {
    pub fn identify_timeout(&self) -> Duration {
        Duration::from_secs(self.identify_timeout_secs)
    }

    pub fn resume_window(&self) -> Duration {
        Duration::from_secs(self.resume_window_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            identify_timeout_secs: default_identify_timeout_secs(),
            resume_window_secs: default_resume_window_secs(),
        }
    }
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_identify_timeout_secs() -> u64 {
    60
}

fn default_resume_window_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default = "default_webhook_timeout_secs", deserialize_with = "deserialize_number_from_string")]
    pub delivery_timeout_secs: u64,
    #[serde(default = "default_execution_log_retention", deserialize_with = "deserialize_number_from_string")]
    pub execution_log_retention: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            delivery_timeout_secs: default_webhook_timeout_secs(),
            execution_log_retention: default_execution_log_retention(),
        }
    }
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

fn default_execution_log_retention() -> usize {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default = "default_max_actions", deserialize_with = "deserialize_number_from_string")]
    pub max_actions: usize,
    #[serde(default = "default_max_execution_time_ms", deserialize_with = "deserialize_number_from_string")]
    pub max_execution_time_ms: u64,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            max_actions: default_max_actions(),
            max_execution_time_ms: default_max_execution_time_ms(),
        }
    }
}

fn default_max_actions() -> usize {
    10
}

fn default_max_execution_time_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_global_per_min", deserialize_with = "deserialize_number_from_string")]
    pub global_per_minute: u32,
    #[serde(default = "default_login_per_min", deserialize_with = "deserialize_number_from_string")]
    pub auth_login_per_minute: u32,
    #[serde(default = "default_register_per_min", deserialize_with = "deserialize_number_from_string")]
    pub auth_register_per_minute: u32,
    #[serde(default = "default_upload_per_min", deserialize_with = "deserialize_number_from_string")]
    pub files_upload_per_minute: u32,
    #[serde(default = "default_search_per_min", deserialize_with = "deserialize_number_from_string")]
    pub search_per_minute: u32,
    #[serde(default = "default_channel_messages_per_min", deserialize_with = "deserialize_number_from_string")]
    pub channel_messages_per_minute: u32,
    #[serde(default = "default_totp_per_5_min", deserialize_with = "deserialize_number_from_string")]
    pub auth_totp_per_5_minutes: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            global_per_minute: default_global_per_min(),
            auth_login_per_minute: default_login_per_min(),
            auth_register_per_minute: default_register_per_min(),
            files_upload_per_minute: default_upload_per_min(),
            search_per_minute: default_search_per_min(),
            channel_messages_per_minute: default_channel_messages_per_min(),
            auth_totp_per_5_minutes: default_totp_per_5_min(),
        }
    }
}

fn default_global_per_min() -> u32 {
    60
}

fn default_login_per_min() -> u32 {
    5
}

fn default_register_per_min() -> u32 {
    3
}

fn default_upload_per_min() -> u32 {
    10
}

fn default_search_per_min() -> u32 {
    20
}

fn default_channel_messages_per_min() -> u32 {
    30
}

fn default_totp_per_5_min() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: default_database_url() }
    }
}

fn default_database_url() -> String {
    "postgres://localhost/amityvox".to_string()
}

impl Config {
    /// Loads from a TOML file, falling back to defaults for any missing
    /// key (the `#[serde(default = ...)]` annotations throughout this
    /// module), then applies `AMITYVOX_`-prefixed environment overrides.
    pub fn load(path: &str) -> AmityResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| AmityError::Internal {
            reason: format!("failed to read config file {path}: {e}"),
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|e| AmityError::Internal {
            reason: format!("invalid configuration in {path}: {e}"),
        })?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_or_default(path: &str) -> Self {
        Self::load(path).unwrap_or_default()
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(domain) = std::env::var("AMITYVOX_DOMAIN") {
            self.general.domain = domain;
        }
        if let Ok(url) = std::env::var("AMITYVOX_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(value) = std::env::var("AMITYVOX_HEARTBEAT_INTERVAL_MS") {
            if let Ok(parsed) = value.parse() {
                self.gateway.heartbeat_interval_ms = parsed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_satisfy_spec_values() {
        let config = Config::default();
        assert_eq!(config.gateway.identify_timeout_secs, 60);
        assert_eq!(config.gateway.resume_window_secs, 120);
        assert_eq!(config.webhooks.delivery_timeout_secs, 10);
        assert_eq!(config.webhooks.execution_log_retention, 100);
        assert_eq!(config.plugins.max_actions, 10);
        assert_eq!(config.rate_limits.global_per_minute, 60);
        assert_eq!(config.rate_limits.auth_login_per_minute, 5);
        assert_eq!(config.rate_limits.auth_register_per_minute, 3);
        assert_eq!(config.rate_limits.files_upload_per_minute, 10);
        assert_eq!(config.rate_limits.search_per_minute, 20);
        assert_eq!(config.rate_limits.channel_messages_per_minute, 30);
        assert_eq!(config.rate_limits.auth_totp_per_5_minutes, 5);
    }

    #[test]
    fn load_from_partial_toml_fills_in_defaults() {
        let toml = "[general]\ninstance_name = \"Test Instance\"\n";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.general.instance_name, "Test Instance");
        assert_eq!(config.gateway.heartbeat_interval_ms, 30_000);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default("/nonexistent/amityvox.toml");
        assert_eq!(config.general.domain, "localhost");
    }

    #[test]
    fn env_override_takes_precedence() {
        std::env::set_var("AMITYVOX_DOMAIN", "override.example");
        let mut config = Config::default();
        config.apply_env_overrides();
        assert_eq!(config.general.domain, "override.example");
        std::env::remove_var("AMITYVOX_DOMAIN");
    }
}
