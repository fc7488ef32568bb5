//! # Hook-Keeper Service
//!
//! Binary entry point for the Hook-Keeper webhook relay.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes structured logging
//! - Opens the configured storage backend and seeds configured webhooks
//! - Starts the HTTP server from hook-keeper-api

use anyhow::Context;
use hook_keeper_api::{
    start_server, LoggingConfig, ServiceConfig, ServiceError, StorageBackend, StorageConfig,
};
use hook_keeper_core::{FilesystemStorage, HttpDeliveryAttempter, InMemoryStorage, Storage};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Exit code for configuration problems
const EXIT_CONFIGURATION: i32 = 3;

/// Exit code for a storage backend that cannot be opened or seeded
const EXIT_STORAGE: i32 = 4;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let loaded = load_configuration();

    let default_logging = LoggingConfig::default();
    let logging = loaded
        .as_ref()
        .map(|c| &c.logging)
        .unwrap_or(&default_logging);
    init_logging(logging);

    info!("Starting Hook-Keeper Service");

    let service_config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Configuration could not be loaded; aborting");
            std::process::exit(EXIT_CONFIGURATION);
        }
    };

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(EXIT_CONFIGURATION);
    }

    let storage = match build_storage(&service_config.storage).await {
        Ok(storage) => storage,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Failed to open storage; aborting");
            std::process::exit(EXIT_STORAGE);
        }
    };

    if let Err(e) = seed_webhooks(&service_config, storage.as_ref()).await {
        error!(error = %format!("{:#}", e), "Failed to seed configured webhooks; aborting");
        std::process::exit(EXIT_STORAGE);
    }

    let attempter = match HttpDeliveryAttempter::new(&service_config.delivery.user_agent) {
        Ok(attempter) => Arc::new(attempter),
        Err(e) => {
            error!(error = %e, "Failed to build HTTP client; aborting");
            std::process::exit(EXIT_CONFIGURATION);
        }
    };

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        backend = ?service_config.storage.backend,
        "Starting HTTP server"
    );

    if let Err(e) = start_server(service_config, storage, attempter).await {
        error!("Failed to start server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => EXIT_CONFIGURATION,
            ServiceError::HealthCheckFailed { .. } => EXIT_STORAGE,
        };

        std::process::exit(exit_code);
    }

    Ok(())
}

// ============================================================================
// Private helpers
// ============================================================================

/// Load configuration from files and environment
///
/// Sources, later ones overriding earlier ones:
///  1. `/etc/hook-keeper/service.yaml`
///  2. `./config/service.yaml`
///  3. The file named by `HK_CONFIG_FILE`, which must exist when set
///  4. Environment variables prefixed `HK__`, e.g. `HK__SERVER__PORT=9090`
///
/// Every field has a default, so running without any source is valid.
fn load_configuration() -> anyhow::Result<ServiceConfig> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/hook-keeper/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Ok(explicit_path) = std::env::var("HK_CONFIG_FILE") {
        if !explicit_path.is_empty() {
            builder = builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }
    }

    builder
        .add_source(
            config::Environment::with_prefix("HK")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("failed to read configuration sources")?
        .try_deserialize()
        .context("failed to deserialize service configuration")
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over the configured level when set.
fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "hook_keeper_service={level},hook_keeper_api={level},hook_keeper_core={level},tower_http=debug",
            level = logging.level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Open the configured storage backend
async fn build_storage(config: &StorageConfig) -> anyhow::Result<Arc<dyn Storage>> {
    match config.backend {
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on restart");
            Ok(Arc::new(InMemoryStorage::new()))
        }
        StorageBackend::Filesystem => {
            let path = PathBuf::from(&config.path);
            let storage = FilesystemStorage::new(path.clone())
                .await
                .with_context(|| format!("cannot use data directory {}", path.display()))?;
            info!(path = %path.display(), "Using filesystem storage");
            Ok(Arc::new(storage))
        }
    }
}

/// Upsert the webhooks defined in configuration
///
/// Seeded webhooks without an explicit ID keep the ID of an existing webhook
/// with the same endpoint, so restarts do not orphan ledger records.
async fn seed_webhooks(config: &ServiceConfig, storage: &dyn Storage) -> anyhow::Result<usize> {
    let default_timeout = config.delivery.default_timeout_seconds;

    for seed in &config.webhooks {
        let mut webhook = seed.to_webhook(default_timeout)?;

        let existing = storage
            .find_webhook_by_endpoint(&webhook.endpoint)
            .await
            .with_context(|| format!("lookup of webhook '{}' failed", webhook.endpoint))?;
        if let Some(existing) = existing {
            if seed.id.is_none() {
                webhook.id = existing.id;
            }
            webhook.created_at = existing.created_at;
        }

        storage
            .save_webhook(&webhook)
            .await
            .with_context(|| format!("saving webhook '{}' failed", webhook.endpoint))?;

        info!(
            webhook_id = %webhook.id,
            endpoint = %webhook.endpoint,
            destinations = webhook.destination_list().len(),
            active = webhook.is_active,
            "Seeded webhook from configuration"
        );
    }

    Ok(config.webhooks.len())
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
