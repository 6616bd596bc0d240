//! Runtime configuration
//!
//! Read from `TASKDASH_*` environment variables. The persistence backend is
//! picked here and injected into the store as a [`TaskGateway`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::seed::{BootstrapImporter, HttpSeedSource, DEFAULT_SEED_LIMIT, DEFAULT_SEED_URL};
use crate::task::{FileTaskGateway, MemoryTaskGateway, RemoteConfig, RemoteTaskGateway, TaskGateway};
use crate::{Error, Result};

const DEFAULT_DATA_DIR: &str = ".taskdash-data";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Where tasks are persisted
#[derive(Debug, Clone)]
pub enum Backend {
    Remote(RemoteConfig),
    Local { data_dir: PathBuf },
    Memory,
}

#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub enabled: bool,
    pub url: String,
    pub limit: usize,
    pub placeholder_fallback: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: DEFAULT_SEED_URL.to_string(),
            limit: DEFAULT_SEED_LIMIT,
            placeholder_fallback: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub backend: Backend,
    pub seed: SeedConfig,
    pub http_timeout: Duration,
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let timeout_secs = match var("TASKDASH_HTTP_TIMEOUT_SECS") {
            Some(raw) => parse_number(&raw, "TASKDASH_HTTP_TIMEOUT_SECS")?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        let http_timeout = Duration::from_secs(timeout_secs);

        let backend = match var("TASKDASH_BACKEND")
            .map(|v| v.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("local") => Backend::Local {
                data_dir: var("TASKDASH_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            },
            Some("memory") => Backend::Memory,
            Some("remote") => {
                let url = var("TASKDASH_REMOTE_URL")
                    .ok_or_else(|| Error::Config("TASKDASH_REMOTE_URL is required".into()))?;
                let key = var("TASKDASH_REMOTE_KEY")
                    .ok_or_else(|| Error::Config("TASKDASH_REMOTE_KEY is required".into()))?;
                let mut remote = RemoteConfig::new(url, key).with_timeout(http_timeout);
                if let Some(table) = var("TASKDASH_REMOTE_TABLE") {
                    remote = remote.with_table(table);
                }
                Backend::Remote(remote)
            }
            Some(other) => {
                return Err(Error::Config(format!("Unknown backend: {}", other)));
            }
        };

        let defaults = SeedConfig::default();
        let seed = SeedConfig {
            enabled: flag(var("TASKDASH_SEED_ENABLED"), defaults.enabled),
            url: var("TASKDASH_SEED_URL").unwrap_or(defaults.url),
            limit: match var("TASKDASH_SEED_LIMIT") {
                Some(raw) => parse_number(&raw, "TASKDASH_SEED_LIMIT")? as usize,
                None => defaults.limit,
            },
            placeholder_fallback: flag(
                var("TASKDASH_SEED_PLACEHOLDER"),
                defaults.placeholder_fallback,
            ),
        };

        Ok(Self {
            backend,
            seed,
            http_timeout,
        })
    }

    /// Open the configured backend
    pub async fn connect(&self) -> Result<Arc<dyn TaskGateway>> {
        let gateway: Arc<dyn TaskGateway> = match &self.backend {
            Backend::Remote(remote) => Arc::new(RemoteTaskGateway::new(remote.clone())?),
            Backend::Local { data_dir } => Arc::new(FileTaskGateway::in_dir(data_dir).await),
            Backend::Memory => Arc::new(MemoryTaskGateway::new()),
        };
        info!("Using {} task backend", gateway.backend());
        Ok(gateway)
    }

    /// The bootstrap importer, unless seeding is switched off
    pub fn importer(&self) -> Result<Option<BootstrapImporter>> {
        if !self.seed.enabled {
            return Ok(None);
        }
        let source = HttpSeedSource::new(self.seed.url.clone(), self.http_timeout)?;
        Ok(Some(
            BootstrapImporter::new(Arc::new(source))
                .with_limit(self.seed.limit)
                .with_placeholder_fallback(self.seed.placeholder_fallback),
        ))
    }
}

fn flag(raw: Option<String>, default: bool) -> bool {
    match raw {
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        None => default,
    }
}

fn parse_number(raw: &str, name: &str) -> Result<u64> {
    raw.parse()
        .map_err(|_| Error::Config(format!("{} must be a number, got {:?}", name, raw)))
}
