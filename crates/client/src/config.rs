//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the offline reporting client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend API (e.g. `https://api.example.com/api`).
    pub api_url: String,
    /// Timeout for ordinary requests.
    pub request_timeout: Duration,
    /// Timeout for photo uploads (large multipart/base64 bodies).
    pub upload_timeout: Duration,
    /// Timeout for the health probe; kept short so point-in-time
    /// connectivity checks answer quickly.
    pub probe_timeout: Duration,
    /// How often the connectivity probe polls the health endpoint.
    pub probe_period: Duration,
    /// Explicit database file; defaults to `{data_dir}/linereport/client.db`.
    pub db_path: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            request_timeout: Duration::from_secs(10),
            upload_timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(5),
            probe_period: Duration::from_secs(30),
            db_path: None,
        }
    }
}
