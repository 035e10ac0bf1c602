use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

use crate::models::MergeStrategy;

pub const DEFAULT_PARENT_DOMAIN: &str = "dhruvs.host";
pub const DEFAULT_ICON_URL: &str = "/default-icon.png";
pub const DEFAULT_FCM_SEND_URL: &str = "https://fcm.googleapis.com/fcm/send";
pub const DEFAULT_FCM_IID_URL: &str = "https://iid.googleapis.com/iid";
pub const DEFAULT_FANOUT_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub database: DatabaseConfig,
    pub fcm: FcmConfig,
    pub gateway: GatewayConfig,
    /// When set, spans are exported over OTLP as well as logged.
    pub otlp_endpoint: Option<String>,
    /// Swap the database and push gateway for in-process stand-ins.
    pub dev_mode: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub anon_key: Secret<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FcmConfig {
    pub server_key: Secret<String>,
    pub send_url: String,
    pub iid_url: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub parent_domain: String,
    pub icon_url: String,
    pub merge_strategy: MergeStrategy,
    pub fanout_concurrency: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            parent_domain: DEFAULT_PARENT_DOMAIN.to_string(),
            icon_url: DEFAULT_ICON_URL.to_string(),
            merge_strategy: MergeStrategy::default(),
            fanout_concurrency: DEFAULT_FANOUT_CONCURRENCY,
        }
    }
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            server_key: Secret::new(String::new()),
            send_url: DEFAULT_FCM_SEND_URL.to_string(),
            iid_url: DEFAULT_FCM_IID_URL.to_string(),
            enabled: true,
        }
    }
}

/// Real dependencies with empty credentials and default gateway settings.
impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            common: core_config::Config::default(),
            database: DatabaseConfig {
                url: String::new(),
                anon_key: Secret::new(String::new()),
            },
            fcm: FcmConfig::default(),
            gateway: GatewayConfig::default(),
            otlp_endpoint: None,
            dev_mode: false,
        }
    }
}

impl ChatConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let dev_mode = is_truthy(&env_or("APP__DEV_MODE", "false"));
        Ok(ChatConfig {
            common: common_config,
            database: DatabaseConfig {
                url: env_or("SUPABASE_URL", ""),
                anon_key: Secret::new(env_or("SUPABASE_ANON_KEY", "")),
            },
            fcm: FcmConfig {
                enabled: !dev_mode,
                server_key: Secret::new(env_or("FCM_SERVER_KEY", "")),
                send_url: env_or("FCM_SEND_URL", DEFAULT_FCM_SEND_URL),
                iid_url: env_or("FCM_IID_URL", DEFAULT_FCM_IID_URL),
            },
            gateway: GatewayConfig {
                parent_domain: env_or("PARENT_DOMAIN", DEFAULT_PARENT_DOMAIN),
                icon_url: env_or("PUSH_ICON_URL", DEFAULT_ICON_URL),
                merge_strategy: env_or("USER_MERGE_MODE", "transfer")
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
                fanout_concurrency: env_or(
                    "PUSH_FANOUT_CONCURRENCY",
                    &DEFAULT_FANOUT_CONCURRENCY.to_string(),
                )
                .parse()
                .ok()
                .filter(|n: &usize| *n > 0)
                .unwrap_or(DEFAULT_FANOUT_CONCURRENCY),
            },
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
            dev_mode,
        })
    }

    /// Missing credentials are not fatal; the dependency rejects the call later.
    pub fn warn_on_missing_credentials(&self) {
        if self.dev_mode {
            tracing::warn!("Dev mode enabled, using in-memory store and mock push provider");
            return;
        }
        if self.database.url.is_empty() {
            tracing::warn!("SUPABASE_URL not set, database calls will fail");
        }
        if self.database.anon_key.expose_secret().is_empty() {
            tracing::warn!("SUPABASE_ANON_KEY not set, database calls will be rejected");
        }
        if self.fcm.server_key.expose_secret().is_empty() {
            tracing::warn!("FCM_SERVER_KEY not set, push gateway calls will be rejected");
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_defaults() {
        let gateway = GatewayConfig::default();
        assert_eq!(gateway.parent_domain, "dhruvs.host");
        assert_eq!(gateway.icon_url, "/default-icon.png");
        assert_eq!(gateway.merge_strategy, MergeStrategy::Transfer);
        assert_eq!(gateway.fanout_concurrency, 16);
    }

    #[test]
    fn default_config_targets_real_dependencies() {
        let config = ChatConfig::default();
        assert!(!config.dev_mode);
        assert!(config.fcm.enabled);
        assert!(config.fcm.server_key.expose_secret().is_empty());
    }

    #[test]
    fn dev_mode_flag_parsing() {
        for value in ["true", "TRUE", "1", "yes", " on "] {
            assert!(is_truthy(value), "{value}");
        }
        for value in ["", "false", "0", "no", "dev"] {
            assert!(!is_truthy(value), "{value}");
        }
    }
}
