//! # Loop Guard
//!
//! Rejects destinations that point back into this service's own ingestion
//! endpoint. Forwarding a webhook to itself would re-enter the pipeline and
//! relay forever.
//!
//! The guard knows the service's public identities from configuration; a
//! destination is a self-reference when its scheme-resolved host and port
//! match one of those identities and its path is under the ingestion prefix.

use crate::ValidationError;
use url::Url;

/// Path prefix of the public ingestion endpoint
pub const INGEST_PATH_PREFIX: &str = "/api/w/";

/// Error message recorded when a destination is refused
pub const SELF_REFERENCE_ERROR: &str = "Cannot forward webhook to itself";

#[derive(Debug, Clone, PartialEq, Eq)]
struct SelfIdentity {
    host: String,
    port: Option<u16>,
}

/// Detects destinations that would forward into our own ingestion endpoint
#[derive(Debug, Clone, Default)]
pub struct LoopGuard {
    identities: Vec<SelfIdentity>,
}

impl LoopGuard {
    /// Build a guard from the service's public base URLs
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidFormat` when a base URL cannot be
    /// parsed or has no host.
    pub fn from_base_urls<I, S>(base_urls: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut identities = Vec::new();
        for base in base_urls {
            let base = base.as_ref();
            let url = Url::parse(base).map_err(|e| ValidationError::InvalidFormat {
                field: "self_base_urls".to_string(),
                message: format!("'{}': {}", base, e),
            })?;
            let host = url
                .host_str()
                .ok_or_else(|| ValidationError::InvalidFormat {
                    field: "self_base_urls".to_string(),
                    message: format!("'{}' has no host", base),
                })?;
            identities.push(SelfIdentity {
                host: normalize_host(host),
                port: url.port_or_known_default(),
            });
        }
        Ok(Self { identities })
    }

    /// A guard that never blocks anything
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Check whether `destination` points at our own ingestion endpoint
    ///
    /// URLs that cannot be parsed are not treated as self-references; the
    /// delivery attempt reports them as transport failures instead.
    pub fn is_self_reference(&self, destination: &str) -> bool {
        let Ok(url) = Url::parse(destination) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };

        if !url.path().starts_with(INGEST_PATH_PREFIX) {
            return false;
        }

        let host = normalize_host(host);
        let port = url.port_or_known_default();
        self.identities
            .iter()
            .any(|identity| identity.host == host && identity.port == port)
    }
}

fn normalize_host(host: &str) -> String {
    host.trim_end_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
#[path = "loop_guard_tests.rs"]
mod tests;
