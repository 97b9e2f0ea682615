//! # Link Validation
//!
//! Probes candidate URLs with a `HEAD` request and keeps only those that answer
//! with a success status. Redirects are not followed, so a moved page counts as
//! unreachable.

use crate::errors::ProviderError;
use reqwest::{redirect::Policy, Client as ReqwestClient};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// The probe timeout used when none is configured.
pub const DEFAULT_LINK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct LinkValidator {
    client: ReqwestClient,
    timeout: Duration,
    cache: Option<Mutex<HashMap<String, bool>>>,
}

impl LinkValidator {
    /// Creates a validator whose probes give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = ReqwestClient::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .build()
            .map_err(ProviderError::ReqwestClientBuild)?;
        Ok(Self {
            client,
            timeout,
            cache: None,
        })
    }

    /// Remembers each verdict for the lifetime of the validator, so a URL that
    /// appears in several items is only probed once per run.
    pub fn with_memoization(mut self) -> Self {
        self.cache = Some(Mutex::new(HashMap::new()));
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns `true` only if a `HEAD` request to `url` answers with a 2xx status.
    ///
    /// Network errors, timeouts, redirects and error statuses all yield `false`.
    pub async fn is_valid(&self, url: &str) -> bool {
        if let Some(verdict) = self.cached(url) {
            return verdict;
        }

        let verdict = match self.client.head(url).send().await {
            Ok(response) => {
                let status = response.status();
                if !status.is_success() {
                    debug!(%url, %status, "Link answered with a non-success status");
                }
                status.is_success()
            }
            Err(e) => {
                debug!(%url, error = %e, "Link probe failed");
                false
            }
        };

        self.remember(url, verdict);
        verdict
    }

    /// Filters `urls` down to the reachable ones, preserving their order.
    pub async fn retain_valid(&self, urls: &[String]) -> Vec<String> {
        let mut valid = Vec::with_capacity(urls.len());
        for url in urls {
            if self.is_valid(url).await {
                valid.push(url.clone());
            } else {
                warn!(%url, "Dropping unreachable link");
            }
        }
        valid
    }

    fn cached(&self, url: &str) -> Option<bool> {
        let cache = self.cache.as_ref()?;
        cache.lock().ok()?.get(url).copied()
    }

    fn remember(&self, url: &str, verdict: bool) {
        if let Some(cache) = &self.cache {
            if let Ok(mut cache) = cache.lock() {
                cache.insert(url.to_string(), verdict);
            }
        }
    }
}
