//! Configuration types for the HTTP service
//!
//! Every field carries a serde default so an empty configuration source
//! produces a runnable service.

use crate::errors::ConfigError;
use hook_keeper_core::{
    destinations::DestinationSource, headers::HeaderSet, resend::DEFAULT_RESEND_CONCURRENCY,
    webhook::DEFAULT_TIMEOUT_SECONDS, EndpointToken, LoopGuard, Timestamp, Webhook, WebhookId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Outbound delivery settings
    pub delivery: DeliveryConfig,

    /// Storage backend selection
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Webhooks upserted into storage at start-up
    pub webhooks: Vec<SeedWebhookConfig>,
}

impl ServiceConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(invalid("server.port must be greater than 0"));
        }
        if self.server.request_timeout_seconds == 0 {
            return Err(invalid("server.request_timeout_seconds must be greater than 0"));
        }
        if self.server.max_body_size == 0 {
            return Err(invalid("server.max_body_size must be greater than 0"));
        }
        if self.delivery.default_timeout_seconds == 0 {
            return Err(invalid("delivery.default_timeout_seconds must be greater than 0"));
        }
        if self.delivery.resend_concurrency == 0 {
            return Err(invalid("delivery.resend_concurrency must be greater than 0"));
        }

        self.loop_guard()?;

        if self.storage.backend == StorageBackend::Filesystem && self.storage.path.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "storage.path".to_string(),
            });
        }

        let mut endpoints = HashSet::new();
        for seed in &self.webhooks {
            let endpoint = EndpointToken::new(seed.endpoint.as_str()).map_err(|e| ConfigError::Invalid {
                message: format!("webhook '{}': {}", seed.name, e),
            })?;
            if !endpoints.insert(endpoint) {
                return Err(invalid(&format!(
                    "webhook endpoint '{}' is configured more than once",
                    seed.endpoint
                )));
            }
        }

        Ok(())
    }

    /// Build the loop guard from every self identity of this service
    ///
    /// The listener's own loopback addresses are always included. Configured
    /// `self_base_urls` and `public_base_url` are added on top.
    pub fn loop_guard(&self) -> Result<LoopGuard, ConfigError> {
        let bases = self
            .server
            .listener_base_urls()
            .into_iter()
            .chain(self.delivery.self_base_urls.iter().cloned())
            .chain(self.delivery.public_base_url.iter().cloned());

        LoopGuard::from_base_urls(bases).map_err(|e| ConfigError::Invalid {
            message: format!("delivery.self_base_urls: {}", e),
        })
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid {
        message: message.to_string(),
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Deadline for answering an ingestion request
    pub request_timeout_seconds: u64,

    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl ServerConfig {
    /// Base URLs that reach this listener directly
    pub fn listener_base_urls(&self) -> Vec<String> {
        let mut hosts = vec![
            "localhost".to_string(),
            "127.0.0.1".to_string(),
            "[::1]".to_string(),
        ];

        let host = self.host.trim();
        match host.parse::<IpAddr>() {
            Ok(ip) if ip.is_unspecified() || ip.is_loopback() => {}
            Ok(IpAddr::V6(ip)) => hosts.push(format!("[{}]", ip)),
            Ok(IpAddr::V4(ip)) => hosts.push(ip.to_string()),
            Err(_) if host.is_empty() || host.eq_ignore_ascii_case("localhost") => {}
            Err(_) => hosts.push(host.to_string()),
        }

        hosts
            .into_iter()
            .map(|host| format!("http://{}:{}", host, self.port))
            .collect()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_seconds: 60,
            shutdown_timeout_seconds: 30,
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Outbound delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Base URLs under which this service is reachable
    pub self_base_urls: Vec<String>,

    /// Public base URL used when generating destination URLs
    pub public_base_url: Option<String>,

    /// Per-attempt timeout for webhooks seeded without one
    pub default_timeout_seconds: u64,

    /// Concurrent attempts per resend call
    pub resend_concurrency: usize,

    /// User-Agent sent to destinations
    pub user_agent: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            self_base_urls: Vec::new(),
            public_base_url: None,
            default_timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            resend_concurrency: DEFAULT_RESEND_CONCURRENCY,
            user_agent: hook_keeper_core::delivery::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Available storage backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Filesystem,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Data directory for the filesystem backend
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: "./data".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// A webhook defined in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedWebhookConfig {
    /// Stable ID; generated when absent
    #[serde(default)]
    pub id: Option<WebhookId>,

    #[serde(default)]
    pub name: String,

    pub endpoint: String,

    #[serde(default)]
    pub destinations: Option<DestinationSource>,

    #[serde(default)]
    pub destination_url: Option<String>,

    #[serde(default)]
    pub allowed_methods: Vec<String>,

    #[serde(default)]
    pub custom_headers: HeaderSet,

    #[serde(default)]
    pub timeout_seconds: Option<u64>,

    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl SeedWebhookConfig {
    /// Convert into a webhook, using `default_timeout_seconds` when unset
    pub fn to_webhook(&self, default_timeout_seconds: u64) -> Result<Webhook, ConfigError> {
        let endpoint = EndpointToken::new(self.endpoint.as_str()).map_err(|e| ConfigError::Invalid {
            message: format!("webhook '{}': {}", self.name, e),
        })?;
        let now = Timestamp::now();

        Ok(Webhook {
            id: self.id.unwrap_or_default(),
            name: self.name.clone(),
            endpoint,
            destinations: self.destinations.clone(),
            destination_url: self.destination_url.clone(),
            allowed_methods: self.allowed_methods.clone(),
            custom_headers: self.custom_headers.clone(),
            timeout_seconds: self.timeout_seconds.unwrap_or(default_timeout_seconds),
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
