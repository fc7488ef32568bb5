//! Shared test doubles for the core crate.

use crate::delivery::{AttemptResult, DeliveryAttempter, OutboundRequest};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Attempter that answers from a per-URL script and records every call
#[derive(Clone, Default)]
pub(crate) struct ScriptedAttempter {
    responses: Arc<Mutex<HashMap<String, AttemptResult>>>,
    calls: Arc<Mutex<Vec<OutboundRequest>>>,
}

impl ScriptedAttempter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, url: &str, status_code: u16, body: &str) -> Self {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            AttemptResult::Responded {
                status_code,
                body: body.to_string(),
                elapsed_ms: 12,
            },
        );
        self
    }

    pub(crate) fn fail(self, url: &str, error: &str) -> Self {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            AttemptResult::Failed {
                error: error.to_string(),
                elapsed_ms: 7,
            },
        );
        self
    }

    pub(crate) fn calls(&self) -> Vec<OutboundRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn called_urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.url).collect()
    }
}

#[async_trait]
impl DeliveryAttempter for ScriptedAttempter {
    async fn attempt(&self, request: &OutboundRequest) -> AttemptResult {
        self.calls.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or(AttemptResult::Failed {
                error: "Connection refused".to_string(),
                elapsed_ms: 1,
            })
    }
}
