//! File-based task gateway
//!
//! Keeps the whole collection as one JSON blob on disk, rewritten after
//! every mutation.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::gateway::TaskGateway;
use super::model::{Task, TaskDraft, TaskPatch};
use crate::{Error, Result};

/// File name of the persisted blob inside the data directory
pub const STORAGE_KEY: &str = "task_mgmt_tasks.json";

/// File-based task gateway using JSON
pub struct FileTaskGateway {
    /// Path to the JSON file
    path: PathBuf,
    /// In-memory copy of the blob, in insertion order
    cache: RwLock<Vec<Task>>,
}

impl FileTaskGateway {
    /// Open the blob at `path`.
    ///
    /// A missing or unreadable blob starts an empty collection; the file is
    /// created on first write.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let tasks = load_blob(&path).await;
        debug!("Loaded {} tasks from {:?}", tasks.len(), path);

        Self {
            path,
            cache: RwLock::new(tasks),
        }
    }

    /// Open the well-known blob inside `data_dir`
    pub async fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::open(data_dir.as_ref().join(STORAGE_KEY)).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `tasks` to disk.
    ///
    /// The blob is written to a temp file next to it and renamed into
    /// place, so a crash mid-write never leaves a torn blob behind.
    async fn persist(&self, tasks: &[Task]) -> Result<()> {
        let content = serde_json::to_string_pretty(tasks)?;

        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent).await?;

        let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4().as_hyphenated()));
        tokio::fs::write(&temp_path, content).await?;

        if let Err(e) = replace_file(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Run `mutate` against a copy of the collection and keep the copy only
    /// if it reached the disk.
    async fn write_with<T>(
        &self,
        mutate: impl FnOnce(&mut Vec<Task>) -> Result<T>,
    ) -> Result<T> {
        let mut cache = self.cache.write().await;
        let mut next = cache.clone();
        let value = mutate(&mut next)?;
        self.persist(&next).await.map_err(|e| {
            Error::StoreUnavailable(format!("Failed to write {:?}: {}", self.path, e))
        })?;
        *cache = next;
        Ok(value)
    }
}

/// Move `temp` over `target`, restoring the previous `target` on failure
async fn replace_file(temp: &Path, target: &Path) -> std::io::Result<()> {
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    let backup = parent.join(format!(".{}.bak", Uuid::new_v4().as_hyphenated()));

    let had_original = tokio::fs::metadata(target).await.is_ok();
    if had_original {
        tokio::fs::rename(target, &backup).await?;
    }

    if let Err(e) = tokio::fs::rename(temp, target).await {
        if had_original {
            let _ = tokio::fs::rename(&backup, target).await;
        }
        return Err(e);
    }

    if had_original {
        let _ = tokio::fs::remove_file(&backup).await;
    }
    Ok(())
}

async fn load_blob(path: &Path) -> Vec<Task> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Failed to read task blob {:?}, starting empty: {}", path, e);
            return Vec::new();
        }
    };

    match serde_json::from_str(&content) {
        Ok(tasks) => tasks,
        Err(e) => {
            warn!("Corrupt task blob {:?}, starting empty: {}", path, e);
            set_aside(path).await;
            Vec::new()
        }
    }
}

/// Keep an unreadable blob next to the live one so the next write does
/// not destroy it
async fn set_aside(path: &Path) {
    let mut name = path.as_os_str().to_owned();
    name.push(".corrupt");
    let target = PathBuf::from(name);
    match tokio::fs::copy(path, &target).await {
        Ok(_) => warn!("Kept corrupt task blob as {:?}", target),
        Err(e) => warn!("Failed to keep corrupt task blob {:?}: {}", path, e),
    }
}

#[async_trait]
impl TaskGateway for FileTaskGateway {
    async fn list(&self) -> Result<Vec<Task>> {
        Ok(self.cache.read().await.clone())
    }

    async fn insert(&self, draft: TaskDraft) -> Result<Task> {
        let draft = draft.validated()?;
        self.write_with(|tasks| {
            let task = Task::from_draft(draft, Utc::now());
            tasks.push(task.clone());
            Ok(task)
        })
        .await
    }

    async fn insert_batch(&self, drafts: Vec<TaskDraft>) -> Result<Vec<Task>> {
        let drafts = drafts
            .into_iter()
            .map(TaskDraft::validated)
            .collect::<Result<Vec<_>>>()?;
        self.write_with(|tasks| {
            let now = Utc::now();
            let created: Vec<Task> = drafts
                .into_iter()
                .map(|draft| Task::from_draft(draft, now))
                .collect();
            tasks.extend(created.iter().cloned());
            Ok(created)
        })
        .await
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> Result<()> {
        let patch = patch.validated()?;
        self.write_with(|tasks| {
            let task = tasks
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            task.apply(&patch);
            Ok(())
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.write_with(|tasks| {
            let index = tasks
                .iter()
                .position(|t| t.id == id)
                .ok_or_else(|| Error::NotFound(id.to_string()))?;
            tasks.remove(index);
            Ok(())
        })
        .await
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}
