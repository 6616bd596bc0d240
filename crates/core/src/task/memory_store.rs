//! In-memory task gateway
//!
//! Ephemeral backend for demos and tests. Nothing survives the process.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::gateway::TaskGateway;
use super::model::{Task, TaskDraft, TaskPatch};
use crate::{Error, Result};

#[derive(Default)]
pub struct MemoryTaskGateway {
    tasks: RwLock<Vec<Task>>,
}

impl MemoryTaskGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with existing records
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: RwLock::new(tasks),
        }
    }
}

#[async_trait]
impl TaskGateway for MemoryTaskGateway {
    async fn list(&self) -> Result<Vec<Task>> {
        Ok(self.tasks.read().await.clone())
    }

    async fn insert(&self, draft: TaskDraft) -> Result<Task> {
        let task = Task::from_draft(draft.validated()?, Utc::now());
        self.tasks.write().await.push(task.clone());
        Ok(task)
    }

    async fn insert_batch(&self, drafts: Vec<TaskDraft>) -> Result<Vec<Task>> {
        let now = Utc::now();
        let created = drafts
            .into_iter()
            .map(|draft| draft.validated().map(|d| Task::from_draft(d, now)))
            .collect::<Result<Vec<_>>>()?;
        self.tasks.write().await.extend(created.iter().cloned());
        Ok(created)
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> Result<()> {
        let patch = patch.validated()?;
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        task.apply(&patch);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
