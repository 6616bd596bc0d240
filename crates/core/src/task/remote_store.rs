//! Remote table task gateway
//!
//! Talks to a PostgREST-style table endpoint (`/rest/v1/<table>`).

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

use super::gateway::TaskGateway;
use super::model::{Task, TaskDraft, TaskPatch};
use crate::{Error, Result};

/// Connection settings for the remote table
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,
    /// Anonymous API key, sent as `apikey` and bearer token
    pub api_key: String,
    pub table: String,
    pub timeout: Duration,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            table: "tasks".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn table_url(&self) -> String {
        format!(
            "{}/rest/v1/{}",
            self.base_url.trim_end_matches('/'),
            self.table
        )
    }
}

pub struct RemoteTaskGateway {
    client: Client,
    config: RemoteConfig,
}

impl RemoteTaskGateway {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        info!("Remote task gateway at {}", config.table_url());
        Ok(Self { client, config })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    fn row_url(&self, id: &str) -> String {
        format!(
            "{}?id=eq.{}",
            self.config.table_url(),
            urlencoding::encode(id)
        )
    }

    /// Send a request and decode the returned rows
    async fn rows<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Vec<T>> {
        let response = self
            .authorized(request)
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(|e| Error::StoreUnavailable(format!("Request failed: {}", e)))?;

        let response = check_status(response).await?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| Error::StoreUnavailable(format!("Malformed response: {}", e)))
    }

    async fn insert_rows(&self, drafts: Vec<TaskDraft>) -> Result<Vec<Task>> {
        let request = self.client.post(self.config.table_url()).json(&drafts);
        let created: Vec<Task> = self.rows(request).await?;
        if created.len() != drafts.len() {
            return Err(Error::StoreUnavailable(format!(
                "Expected {} inserted rows, got {}",
                drafts.len(),
                created.len()
            )));
        }
        Ok(created)
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Err(Error::Validation(
            format!("Remote store rejected the write ({}): {}", status, body),
        )),
        _ => Err(Error::StoreUnavailable(format!(
            "Remote store returned {}: {}",
            status, body
        ))),
    }
}

#[async_trait]
impl TaskGateway for RemoteTaskGateway {
    async fn list(&self) -> Result<Vec<Task>> {
        let request = self
            .client
            .get(self.config.table_url())
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        let tasks = self.rows(request).await?;
        debug!("Fetched {} remote tasks", tasks.len());
        Ok(tasks)
    }

    async fn insert(&self, draft: TaskDraft) -> Result<Task> {
        let draft = draft.validated()?;
        let mut created = self.insert_rows(vec![draft]).await?;
        created
            .pop()
            .ok_or_else(|| Error::StoreUnavailable("Insert returned no row".to_string()))
    }

    async fn insert_batch(&self, drafts: Vec<TaskDraft>) -> Result<Vec<Task>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        let drafts = drafts
            .into_iter()
            .map(TaskDraft::validated)
            .collect::<Result<Vec<_>>>()?;
        self.insert_rows(drafts).await
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> Result<()> {
        let patch = patch.validated()?;
        let request = self.client.patch(self.row_url(id)).json(&patch);
        let touched: Vec<Task> = self.rows(request).await?;
        if touched.is_empty() {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let request = self.client.delete(self.row_url(id));
        let removed: Vec<Task> = self.rows(request).await?;
        if removed.is_empty() {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "remote"
    }
}
