//! Location autocomplete with debounce and stale-response protection.
//!
//! Every input event bumps a generation counter; the fetch task spawned for
//! an event re-checks the counter after the quiet period and again after the
//! network call, so only the newest input ever lands in `suggestions`.
//! Selecting a suggestion raises a skip flag that swallows the one input
//! event the selection itself echoes back.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::client::LivenessToken;
use crate::config::LocationConfig;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

const SUGGESTION_LIMIT: u8 = 5;

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("location service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("location service unreachable: {0}")]
    Network(String),
}

#[derive(Debug, Deserialize)]
struct AutocompleteResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: FeatureProperties,
}

#[derive(Debug, Deserialize)]
struct FeatureProperties {
    #[serde(default)]
    formatted: Option<String>,
}

/// Geocoding autocomplete client. Without an endpoint and access key the
/// feature is disabled and every lookup resolves to no suggestions.
#[derive(Debug, Clone)]
pub struct LocationClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl LocationClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &LocationConfig) -> Self {
        Self::new(&config.api_url, &config.api_key)
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_url.is_empty() && !self.api_key.is_empty()
    }

    /// Fetch formatted place names matching `text`.
    pub async fn suggest(&self, text: &str) -> Result<Vec<String>, LocationError> {
        let text = text.trim();
        if text.is_empty() || !self.is_enabled() {
            return Ok(Vec::new());
        }

        let response = self
            .http
            .get(&self.api_url)
            .query(&[("text", text), ("apiKey", self.api_key.as_str())])
            .query(&[("limit", SUGGESTION_LIMIT)])
            .send()
            .await
            .map_err(|err| LocationError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.trim().is_empty() {
                status.to_string()
            } else {
                body
            };
            return Err(LocationError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: AutocompleteResponse = response
            .json()
            .await
            .map_err(|err| LocationError::Network(err.to_string()))?;

        Ok(parsed
            .features
            .into_iter()
            .filter_map(|feature| feature.properties.formatted)
            .filter(|name| !name.trim().is_empty())
            .collect())
    }
}

struct FieldInner {
    client: LocationClient,
    quiet_period: Duration,
    generation: AtomicU64,
    skip_next: AtomicBool,
    alive: LivenessToken,
    suggestions: Mutex<Vec<String>>,
}

/// Stateful autocomplete field shared between the input handler and the
/// fetch tasks it spawns. Cheap to clone.
#[derive(Clone)]
pub struct LocationField {
    inner: Arc<FieldInner>,
}

impl LocationField {
    pub fn new(client: LocationClient) -> Self {
        Self::with_quiet_period(client, DEFAULT_QUIET_PERIOD)
    }

    pub fn with_quiet_period(client: LocationClient, quiet_period: Duration) -> Self {
        Self {
            inner: Arc::new(FieldInner {
                client,
                quiet_period,
                generation: AtomicU64::new(0),
                skip_next: AtomicBool::new(false),
                alive: LivenessToken::new(),
                suggestions: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Record a keystroke. Schedules a fetch after the quiet period unless a
    /// newer input supersedes it first. Must run inside a tokio runtime.
    pub fn on_input(&self, text: &str) {
        let inner = &self.inner;
        if inner.skip_next.swap(false, Ordering::AcqRel) {
            // The input echoed by a selection; invalidate any in-flight
            // fetch but do not start a new one.
            inner.generation.fetch_add(1, Ordering::AcqRel);
            return;
        }

        let my_generation = inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let text = text.trim().to_string();
        if text.is_empty() || !inner.client.is_enabled() {
            lock(&inner.suggestions).clear();
            return;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.quiet_period).await;
            if inner.generation.load(Ordering::Acquire) != my_generation
                || !inner.alive.is_alive()
            {
                return;
            }

            match inner.client.suggest(&text).await {
                Ok(names) => {
                    if inner.generation.load(Ordering::Acquire) == my_generation
                        && inner.alive.is_alive()
                    {
                        *lock(&inner.suggestions) = names;
                    }
                }
                Err(err) => {
                    warn!("location autocomplete failed: {}", err);
                    if inner.generation.load(Ordering::Acquire) == my_generation {
                        lock(&inner.suggestions).clear();
                    }
                }
            }
        });
    }

    /// Commit a chosen suggestion. Clears the list, invalidates in-flight
    /// fetches, and arms the skip flag for the echoed input event. Returns
    /// the committed text for assignment into the draft.
    pub fn select(&self, value: &str) -> String {
        let inner = &self.inner;
        inner.skip_next.store(true, Ordering::Release);
        inner.generation.fetch_add(1, Ordering::AcqRel);
        lock(&inner.suggestions).clear();
        value.trim().to_string()
    }

    /// Stop the field for good; late fetch results are dropped.
    pub fn teardown(&self) {
        self.inner.alive.revoke();
        lock(&self.inner.suggestions).clear();
    }

    pub fn suggestions(&self) -> Vec<String> {
        lock(&self.inner.suggestions).clone()
    }
}

fn lock(m: &Mutex<Vec<String>>) -> MutexGuard<'_, Vec<String>> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
