//! Seed data source
//!
//! Read-only endpoint serving demo todos used to populate an empty store.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::{Error, Result};

pub const DEFAULT_SEED_URL: &str = "https://jsonplaceholder.typicode.com/todos";

/// One item of the external seed batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedItem {
    pub id: u64,
    pub title: String,
    pub completed: bool,
}

#[async_trait]
pub trait SeedSource: Send + Sync {
    /// Fetch up to `limit` seed items
    async fn fetch(&self, limit: usize) -> Result<Vec<SeedItem>>;
}

/// Seed source over HTTP (`GET <url>?_limit=<n>`)
pub struct HttpSeedSource {
    client: Client,
    url: String,
}

impl HttpSeedSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SeedSource for HttpSeedSource {
    async fn fetch(&self, limit: usize) -> Result<Vec<SeedItem>> {
        debug!("Fetching {} seed items from {}", limit, self.url);

        let response = self
            .client
            .get(&self.url)
            .query(&[("_limit", limit)])
            .send()
            .await
            .map_err(|e| Error::Seed(format!("Failed to reach seed source: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Seed(format!("HTTP {}", response.status())));
        }

        let mut items: Vec<SeedItem> = response
            .json()
            .await
            .map_err(|e| Error::Seed(format!("Malformed seed data: {}", e)))?;
        items.truncate(limit);
        Ok(items)
    }
}

/// Fixed seed items, for tests and offline demos
pub struct StaticSeedSource {
    items: Vec<SeedItem>,
}

impl StaticSeedSource {
    pub fn new(items: Vec<SeedItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl SeedSource for StaticSeedSource {
    async fn fetch(&self, limit: usize) -> Result<Vec<SeedItem>> {
        Ok(self.items.iter().take(limit).cloned().collect())
    }
}
