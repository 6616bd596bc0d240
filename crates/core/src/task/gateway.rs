//! Persistence gateway trait
//!
//! Defines the interface every durable task backend implements.

use async_trait::async_trait;

use super::model::{Task, TaskDraft, TaskPatch};
use crate::Result;

/// Durable storage for task records
///
/// `list` makes no ordering promise; callers sort explicitly.
#[async_trait]
pub trait TaskGateway: Send + Sync {
    /// Get all tasks
    async fn list(&self) -> Result<Vec<Task>>;

    /// Insert a draft, returning the stored record with its id and timestamps
    async fn insert(&self, draft: TaskDraft) -> Result<Task>;

    /// Insert several drafts in one write
    async fn insert_batch(&self, drafts: Vec<TaskDraft>) -> Result<Vec<Task>>;

    /// Apply a partial update to the task with the given id
    async fn update(&self, id: &str, patch: TaskPatch) -> Result<()>;

    /// Delete the task with the given id
    async fn delete(&self, id: &str) -> Result<()>;

    /// Short backend name for logs
    fn backend(&self) -> &'static str;
}
