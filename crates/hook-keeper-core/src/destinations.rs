//! # Destination Resolution
//!
//! Webhooks have stored their destinations in several shapes over time: a
//! list of URLs, a single URL string, a JSON-encoded string holding either of
//! those, or the legacy single `destination_url` field. [`DestinationSource`]
//! captures every stored shape and [`resolve_destinations`] turns it into the
//! canonical ordered list. Nothing else in the crate looks at the raw shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stored representation of a webhook's destinations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DestinationSource {
    /// Ordered list; entries that are not strings are ignored
    List(Vec<Value>),

    /// A single URL, or a JSON document encoding a list or a URL
    Text(String),

    /// Anything else that ended up in storage
    Other(Value),
}

impl DestinationSource {
    /// Build the modern list representation
    pub fn from_urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(urls.into_iter().map(|u| Value::String(u.into())).collect())
    }

    /// Ordered URLs held by this representation
    ///
    /// Malformed content degrades to an empty list.
    pub fn urls(&self) -> Vec<String> {
        match self {
            Self::List(values) => string_entries(values),
            Self::Text(text) => decode_text(text),
            Self::Other(_) => Vec::new(),
        }
    }
}

/// Resolve a webhook's destinations into an ordered list of URLs
///
/// The modern representation wins; the legacy single URL is used when the
/// modern one is absent or yields no usable entry.
pub fn resolve_destinations(source: Option<&DestinationSource>, legacy: Option<&str>) -> Vec<String> {
    let urls = source.map(DestinationSource::urls).unwrap_or_default();
    if !urls.is_empty() {
        return urls;
    }

    legacy
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(|url| vec![url.to_string()])
        .unwrap_or_default()
}

fn string_entries(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

fn decode_text(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if !(trimmed.starts_with('[') || trimmed.starts_with('"')) {
        return vec![trimmed.to_string()];
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(values)) => string_entries(&values),
        Ok(Value::String(url)) => {
            let url = url.trim();
            if url.is_empty() {
                Vec::new()
            } else {
                vec![url.to_string()]
            }
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
#[path = "destinations_tests.rs"]
mod tests;
