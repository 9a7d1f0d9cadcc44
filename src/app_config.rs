//! Runtime configuration.
//!
//! Every field has a default matching the deployed restaurant page, so an
//! empty JSON object is a valid configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Store name; the environment lives in `<db_name>.lmdb`.
    pub db_name: String,
    pub schema_version: u32,
    pub map_size_mb: usize,
    pub reviews_url: String,
    /// Favorite updates go to `<favorites_url>/<restaurant-id>/?is_favorite=true`.
    pub favorites_url: String,
    pub http_timeout_secs: u64,
    pub cache_bucket: String,
    pub asset_base_url: String,
    pub asset_manifest: Vec<String>,
    pub retry: RetryPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_name: "restaurant-db".to_string(),
            schema_version: 1,
            map_size_mb: 64,
            reviews_url: "http://localhost:1337/reviews/".to_string(),
            favorites_url: "http://localhost:1337/restaurants".to_string(),
            http_timeout_secs: 30,
            cache_bucket: "restaurant-static-v1".to_string(),
            asset_base_url: "http://localhost:8000".to_string(),
            asset_manifest: default_manifest(),
            retry: RetryPolicy::default(),
        }
    }
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self, AppResponse> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AppResponse> {
        let raw = fs::read_to_string(path.as_ref()).map_err(|e| {
            AppResponse::BadRequest(format!("Cannot read config {}: {e}", path.as_ref().display()))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), AppResponse> {
        if self.db_name.trim().is_empty() {
            return Err(AppResponse::BadRequest("db_name must not be empty".to_string()));
        }
        if self.schema_version == 0 {
            return Err(AppResponse::BadRequest("schema_version must be at least 1".to_string()));
        }
        if self.cache_bucket.trim().is_empty() {
            return Err(AppResponse::BadRequest("cache_bucket must not be empty".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppResponse::BadRequest("retry.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn map_size(&self) -> usize {
        self.map_size_mb.max(1) * 1024 * 1024
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn favorite_url(&self, restaurant_id: u64) -> String {
        format!(
            "{}/{restaurant_id}/?is_favorite=true",
            self.favorites_url.trim_end_matches('/')
        )
    }
}

/// Backoff schedule for replaying queued reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    pub fn no_delay(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling up to the cap.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Assets cached at install time by the page's worker.
pub fn default_manifest() -> Vec<String> {
    let mut manifest = vec!["/".to_string(), "dist/js/all.js".to_string()];
    manifest.extend((1..=10).map(|i| format!("dist/img/{i}.jpg")));
    manifest.extend(
        [
            "dist/css/responsive.min.css",
            "dist/css/styles.min.css",
            "data/restaurants.json",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    manifest
}
