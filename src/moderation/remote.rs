//! Layer 2: remote toxicity classification.
//!
//! POSTs message content to an external classifier and flags on any label
//! whose score reaches the configured threshold. The call is bounded by a
//! hard timeout; whether a failure blocks or passes is the caller's policy
//! (`block_on_fail`).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

/// One `{label, score}` pair from the classifier.
#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub label: String,
    pub score: f32,
}

/// HTTP client for the remote classifier.
pub struct RemoteClassifier {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl RemoteClassifier {
    pub fn new(url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("driftd/0.4")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            url,
            timeout,
        }
    }

    /// Classify a message. The future is additionally wrapped in
    /// `tokio::time::timeout` so a stalled connect cannot exceed the
    /// budget even if the client-level timeout misbehaves.
    pub async fn classify(&self, content: &str) -> Result<Vec<Label>, ClassifierError> {
        let request = self
            .client
            .post(&self.url)
            .json(&ClassifyRequest { text: content });

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| ClassifierError::Timeout(self.timeout))??
            .error_for_status()?;

        let labels: Vec<Label> = tokio::time::timeout(self.timeout, response.json())
            .await
            .map_err(|_| ClassifierError::Timeout(self.timeout))??;

        debug!(labels = labels.len(), "Remote classification complete");
        Ok(labels)
    }

    /// Labels at or above the threshold.
    pub fn flagged(labels: &[Label], threshold: f32) -> Vec<String> {
        labels
            .iter()
            .filter(|l| l.score >= threshold)
            .map(|l| l.label.clone())
            .collect()
    }
}
