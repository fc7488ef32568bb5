//! # Filesystem Storage
//!
//! Stores webhooks and ledger records as pretty-printed JSON documents:
//!
//! ```text
//! <base>/webhooks/<webhook-id>.json
//! <base>/requests/<webhook-id>/<request-id>.json
//! ```
//!
//! Every write goes to a temporary file that is then renamed over the target.
//! Mutations are serialized through a single writer lock so the endpoint
//! uniqueness and single-completion checks cannot race.

use crate::forwarder::DeliveryOutcome;
use crate::ledger::RequestRecord;
use crate::storage::{Storage, StorageError};
use crate::webhook::Webhook;
use crate::{EndpointToken, RequestId, WebhookId};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

const WEBHOOKS_DIR: &str = "webhooks";
const REQUESTS_DIR: &str = "requests";
const EXTENSION: &str = "json";

/// Filesystem-based storage backend
///
/// # Examples
///
/// ```no_run
/// use hook_keeper_core::adapters::FilesystemStorage;
/// use std::path::PathBuf;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = FilesystemStorage::new(PathBuf::from("./data")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    base_path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FilesystemStorage {
    /// Create storage rooted at `base_path`, creating directories as needed
    pub async fn new(base_path: PathBuf) -> Result<Self, StorageError> {
        for dir in [WEBHOOKS_DIR, REQUESTS_DIR] {
            fs::create_dir_all(base_path.join(dir))
                .await
                .map_err(|e| io_error("create base directory", e))?;
        }

        Ok(Self {
            base_path,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn webhook_path(&self, id: WebhookId) -> PathBuf {
        self.base_path
            .join(WEBHOOKS_DIR)
            .join(format!("{}.{}", id, EXTENSION))
    }

    fn webhook_requests_dir(&self, webhook_id: WebhookId) -> PathBuf {
        self.base_path.join(REQUESTS_DIR).join(webhook_id.to_string())
    }

    fn record_path(&self, webhook_id: WebhookId, id: RequestId) -> PathBuf {
        self.webhook_requests_dir(webhook_id)
            .join(format!("{}.{}", id, EXTENSION))
    }

    async fn load_webhooks(&self) -> Result<Vec<Webhook>, StorageError> {
        let mut webhooks = Vec::new();
        for path in json_files(&self.base_path.join(WEBHOOKS_DIR)).await? {
            if let Some(webhook) = read_json::<Webhook>(&path).await? {
                webhooks.push(webhook);
            }
        }
        Ok(webhooks)
    }

    /// Locate a record file without knowing its webhook
    async fn find_record_path(&self, id: RequestId) -> Result<Option<PathBuf>, StorageError> {
        let file_name = format!("{}.{}", id, EXTENSION);
        let mut entries = fs::read_dir(self.base_path.join(REQUESTS_DIR))
            .await
            .map_err(|e| io_error("read requests directory", e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error("read requests directory", e))?
        {
            let candidate = entry.path().join(&file_name);
            if fs::try_exists(&candidate).await.unwrap_or(false) {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Storage for FilesystemStorage {
    async fn find_webhook_by_endpoint(
        &self,
        endpoint: &EndpointToken,
    ) -> Result<Option<Webhook>, StorageError> {
        Ok(self
            .load_webhooks()
            .await?
            .into_iter()
            .find(|webhook| &webhook.endpoint == endpoint))
    }

    async fn find_webhook_by_id(&self, id: WebhookId) -> Result<Option<Webhook>, StorageError> {
        read_json(&self.webhook_path(id)).await
    }

    async fn save_webhook(&self, webhook: &Webhook) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let taken = self
            .load_webhooks()
            .await?
            .iter()
            .any(|other| other.endpoint == webhook.endpoint && other.id != webhook.id);
        if taken {
            return Err(StorageError::Conflict {
                message: format!("endpoint '{}' is already in use", webhook.endpoint),
            });
        }

        write_json(&self.webhook_path(webhook.id), webhook).await
    }

    async fn delete_webhook(&self, id: WebhookId) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock().await;

        let path = self.webhook_path(id);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(false);
        }

        fs::remove_file(&path)
            .await
            .map_err(|e| io_error("delete webhook", e))?;

        let requests = self.webhook_requests_dir(id);
        if fs::try_exists(&requests).await.unwrap_or(false) {
            fs::remove_dir_all(&requests)
                .await
                .map_err(|e| io_error("delete request records", e))?;
        }
        Ok(true)
    }

    async fn create_request_record(&self, record: &RequestRecord) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let path = self.record_path(record.webhook_id, record.id);
        if fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::Conflict {
                message: format!("request record {} already exists", record.id),
            });
        }
        write_json(&path, record).await
    }

    async fn update_request_record(
        &self,
        id: RequestId,
        outcome: &DeliveryOutcome,
    ) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let not_found = || StorageError::NotFound { id: id.to_string() };
        let path = self.find_record_path(id).await?.ok_or_else(not_found)?;
        let mut record = read_json::<RequestRecord>(&path)
            .await?
            .ok_or_else(not_found)?;

        if record.is_completed() {
            return Err(StorageError::AlreadyCompleted { id });
        }
        record.outcome = Some(outcome.clone());
        write_json(&path, &record).await
    }

    async fn find_request_record_by_id(
        &self,
        id: RequestId,
    ) -> Result<Option<RequestRecord>, StorageError> {
        match self.find_record_path(id).await? {
            Some(path) => read_json(&path).await,
            None => Ok(None),
        }
    }

    async fn list_request_records(
        &self,
        webhook_id: WebhookId,
        limit: usize,
    ) -> Result<Vec<RequestRecord>, StorageError> {
        let dir = self.webhook_requests_dir(webhook_id);
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }

        // File names are ULIDs, so name order is creation order
        let mut paths = json_files(&dir).await?;
        paths.sort();
        paths.reverse();

        let mut records = Vec::new();
        for path in paths.into_iter().take(limit) {
            if let Some(record) = read_json(&path).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        let accessible = fs::metadata(&self.base_path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);

        if accessible {
            Ok(())
        } else {
            Err(StorageError::Unavailable {
                message: format!("base path {} is not accessible", self.base_path.display()),
            })
        }
    }
}

// ============================================================================
// File helpers
// ============================================================================

fn io_error(action: &str, error: std::io::Error) -> StorageError {
    StorageError::OperationFailed {
        message: format!("Failed to {}: {}", action, error),
    }
}

async fn json_files(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| io_error("read directory", e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| io_error("read directory", e))?
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == EXTENSION) {
            files.push(path);
        }
    }
    Ok(files)
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error("read file", e)),
    };

    serde_json::from_str(&content).map(Some).map_err(|e| {
        warn!(path = %path.display(), error = %e, "Corrupt storage document");
        StorageError::Serialization {
            message: format!("Failed to parse {}: {}", path.display(), e),
        }
    })
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error("create directory structure", e))?;
    }

    let json = serde_json::to_string_pretty(value).map_err(|e| StorageError::Serialization {
        message: format!("Failed to serialize document: {}", e),
    })?;

    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)
        .await
        .map_err(|e| io_error("create temp file", e))?;
    file.write_all(json.as_bytes())
        .await
        .map_err(|e| io_error("write document", e))?;
    file.flush()
        .await
        .map_err(|e| io_error("flush file", e))?;

    fs::rename(&temp_path, path)
        .await
        .map_err(|e| io_error("rename temp file", e))
}

#[cfg(test)]
#[path = "filesystem_storage_tests.rs"]
mod tests;
