//! Task store
//!
//! Owns the in-memory task collection and keeps it in step with a
//! [`TaskGateway`]. Every mutation is write-through: memory changes only
//! after the gateway confirms the write.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::seed::{BootstrapImporter, ImportOutcome};
use crate::task::{Task, TaskDraft, TaskGateway, TaskPatch, TaskStatus};
use crate::view::{derive, TaskStats, ViewQuery};
use crate::Result;

/// Store state as seen by one render
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreState {
    /// Newest first, unless a mutation prepended out of order
    pub tasks: Vec<Task>,
    pub loading: bool,
    pub last_error: Option<String>,
}

impl StoreState {
    pub fn stats(&self) -> TaskStats {
        TaskStats::from_tasks(&self.tasks)
    }

    pub fn view(&self, query: &ViewQuery) -> Vec<Task> {
        derive(&self.tasks, query)
    }
}

/// Shared task store with write-through persistence
#[derive(Clone)]
pub struct TaskStore {
    gateway: Arc<dyn TaskGateway>,
    state: Arc<RwLock<StoreState>>,
    /// Ids with a mutation currently waiting on the gateway
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Releases a record for further mutations when dropped
struct InFlight {
    ids: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        ids.remove(&self.id);
    }
}

impl TaskStore {
    /// Create an empty store over `gateway`; call [`TaskStore::load`] next
    pub fn new(gateway: Arc<dyn TaskGateway>) -> Self {
        Self {
            gateway,
            state: Arc::new(RwLock::new(StoreState::default())),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn TaskGateway> {
        &self.gateway
    }

    /// Immutable copy of the current state
    pub async fn snapshot(&self) -> StoreState {
        self.state.read().await.clone()
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.state.read().await.tasks.clone()
    }

    pub async fn stats(&self) -> TaskStats {
        self.state.read().await.stats()
    }

    pub async fn view(&self, query: &ViewQuery) -> Vec<Task> {
        self.state.read().await.view(query)
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    /// Dismiss the current error notification
    pub async fn clear_error(&self) {
        self.state.write().await.last_error = None;
    }

    /// Initial load: seed an empty store if an importer is given, then
    /// refresh from the gateway.
    ///
    /// Import problems are recorded as the last error and never fail the
    /// load; only a failed refresh does.
    pub async fn load(&self, importer: Option<&BootstrapImporter>) -> Result<()> {
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.last_error = None;
        }

        if let Some(importer) = importer {
            match importer.run(self.gateway.as_ref()).await {
                Ok(ImportOutcome::Placeholder { reason, .. }) => {
                    self.record_error(format!(
                        "Failed to fetch tasks from the seed source, showing placeholder data: {}",
                        reason
                    ))
                    .await;
                }
                Ok(outcome) => debug!("Bootstrap import: {:?}", outcome),
                Err(e) => {
                    warn!("Bootstrap import failed: {}", e);
                    self.record_error(e.to_string()).await;
                }
            }
        }

        let result = self.refresh().await;
        self.state.write().await.loading = false;
        result
    }

    /// Replace the collection with the gateway's, newest first.
    ///
    /// On failure the previous collection is kept and the error recorded.
    pub async fn refresh(&self) -> Result<()> {
        match self.gateway.list().await {
            Ok(mut tasks) => {
                tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                debug!("Refreshed {} tasks from {}", tasks.len(), self.gateway.backend());
                self.state.write().await.tasks = tasks;
                Ok(())
            }
            Err(e) => {
                warn!("Failed to refresh tasks: {}", e);
                self.record_error(e.to_string()).await;
                Err(e)
            }
        }
    }

    /// Create a task and put it first in the collection
    pub async fn add(&self, draft: TaskDraft) -> Result<Task> {
        let draft = draft.validated()?;

        let task = match self.gateway.insert(draft).await {
            Ok(task) => task,
            Err(e) => return Err(self.mutation_failed(e).await),
        };

        let mut state = self.state.write().await;
        state.tasks.retain(|t| t.id != task.id);
        state.tasks.insert(0, task.clone());
        info!("Added task {}", task.id);
        Ok(task)
    }

    /// Set a task's status
    pub async fn update_status(&self, id: &str, status: TaskStatus) -> Result<()> {
        self.patch(id, TaskPatch::status(status)).await
    }

    /// Edit a task's fields.
    ///
    /// A patch that changes nothing succeeds without touching the gateway.
    pub async fn update(&self, id: &str, patch: TaskPatch) -> Result<()> {
        let patch = patch.validated()?;
        if patch.is_empty() {
            return Ok(());
        }
        self.patch(id, patch).await
    }

    /// Delete a task
    pub async fn remove(&self, id: &str) -> Result<()> {
        let _guard = self.claim(id)?;

        if let Err(e) = self.gateway.delete(id).await {
            return Err(self.mutation_failed(e).await);
        }

        self.state.write().await.tasks.retain(|t| t.id != id);
        info!("Removed task {}", id);
        Ok(())
    }

    async fn patch(&self, id: &str, patch: TaskPatch) -> Result<()> {
        let _guard = self.claim(id)?;

        let previous = {
            let state = self.state.read().await;
            state.tasks.iter().find(|t| t.id == id).map(|t| t.updated_at)
        };
        let patch = patch.stamped(next_stamp(previous));

        if let Err(e) = self.gateway.update(id, patch.clone()).await {
            return Err(self.mutation_failed(e).await);
        }

        let mut state = self.state.write().await;
        if let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) {
            task.apply(&patch);
        }
        debug!("Updated task {}", id);
        Ok(())
    }

    /// Mark `id` as busy until the returned guard drops
    fn claim(&self, id: &str) -> Result<InFlight> {
        let mut ids = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !ids.insert(id.to_string()) {
            return Err(Error::Busy(id.to_string()));
        }
        Ok(InFlight {
            ids: Arc::clone(&self.in_flight),
            id: id.to_string(),
        })
    }

    /// Record a failed write; a vanished record also triggers a refresh
    async fn mutation_failed(&self, error: Error) -> Error {
        warn!("Task mutation failed: {}", error);
        self.record_error(error.to_string()).await;
        if error.requires_refresh() {
            // refresh records its own failure
            let _ = self.refresh().await;
        }
        error
    }

    async fn record_error(&self, message: String) {
        self.state.write().await.last_error = Some(message);
    }
}

/// A fresh `updated_at` that is strictly later than `previous`
fn next_stamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    match previous {
        Some(previous) if now <= previous => previous + Duration::microseconds(1),
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{MemoryTaskGateway, TaskPriority};
    use crate::view::{SortKey, StatusFilter};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Memory gateway that can be told to fail and counts calls
    #[derive(Default)]
    struct FlakyGateway {
        inner: MemoryTaskGateway,
        down: AtomicBool,
        slow: AtomicBool,
        calls: AtomicUsize,
        updates: AtomicUsize,
    }

    impl FlakyGateway {
        fn set_down(&self, down: bool) {
            self.down.store(down, Ordering::SeqCst);
        }

        fn set_slow(&self, slow: bool) {
            self.slow.store(slow, Ordering::SeqCst);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn check(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                return Err(Error::StoreUnavailable("network down".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TaskGateway for FlakyGateway {
        async fn list(&self) -> Result<Vec<Task>> {
            self.check()?;
            self.inner.list().await
        }
        async fn insert(&self, draft: TaskDraft) -> Result<Task> {
            self.check()?;
            self.inner.insert(draft).await
        }
        async fn insert_batch(&self, drafts: Vec<TaskDraft>) -> Result<Vec<Task>> {
            self.check()?;
            self.inner.insert_batch(drafts).await
        }
        async fn update(&self, id: &str, patch: TaskPatch) -> Result<()> {
            self.check()?;
            self.updates.fetch_add(1, Ordering::SeqCst);
            if self.slow.load(Ordering::SeqCst) {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
            self.inner.update(id, patch).await
        }
        async fn delete(&self, id: &str) -> Result<()> {
            self.check()?;
            self.inner.delete(id).await
        }
        fn backend(&self) -> &'static str {
            "flaky"
        }
    }

    async fn store_with(titles: &[&str]) -> (TaskStore, Arc<FlakyGateway>) {
        let gateway = Arc::new(FlakyGateway::default());
        for title in titles {
            gateway.inner.insert(TaskDraft::new(*title)).await.unwrap();
        }
        let store = TaskStore::new(gateway.clone());
        store.load(None).await.unwrap();
        (store, gateway)
    }

    #[tokio::test]
    async fn test_add_prepends_and_counts() {
        let (store, _gateway) = store_with(&["Existing"]).await;
        let before = store.stats().await;

        let task = store
            .add(TaskDraft::new("Write release notes").with_priority(TaskPriority::High))
            .await
            .unwrap();

        let view = store.view(&ViewQuery::new()).await;
        assert_eq!(view[0].id, task.id);
        let after = store.stats().await;
        assert_eq!(after.total, before.total + 1);
        assert_eq!(after.high_priority, before.high_priority + 1);
    }

    #[tokio::test]
    async fn test_blank_title_never_reaches_gateway() {
        let (store, gateway) = store_with(&["Existing"]).await;
        let before = store.snapshot().await;
        let calls = gateway.calls();

        let result = store.add(TaskDraft::new("   ")).await;

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(gateway.calls(), calls);
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_failed_add_leaves_collection() {
        let (store, gateway) = store_with(&["Existing"]).await;
        let before = store.tasks().await;
        gateway.set_down(true);

        let result = store.add(TaskDraft::new("Lost")).await;

        assert!(matches!(result, Err(Error::StoreUnavailable(_))));
        assert_eq!(store.tasks().await, before);
        assert!(store.last_error().await.is_some());
    }

    #[tokio::test]
    async fn test_complete_pending_task() {
        let (store, _gateway) = store_with(&["Pending one"]).await;
        let original = store.tasks().await.remove(0);
        let before = store.stats().await;

        store
            .update_status(&original.id, TaskStatus::Completed)
            .await
            .unwrap();

        let updated = store.tasks().await.remove(0);
        assert_eq!(updated.status, TaskStatus::Completed);
        assert!(updated.updated_at > original.updated_at);
        assert_eq!(updated.created_at, original.created_at);
        assert_eq!(updated.title, original.title);

        let after = store.stats().await;
        assert_eq!(after.pending, before.pending - 1);
        assert_eq!(after.completed, before.completed + 1);
    }

    #[tokio::test]
    async fn test_failed_update_and_remove_preserve_state() {
        let (store, gateway) = store_with(&["One", "Two"]).await;
        let before = store.tasks().await;
        let id = before[0].id.clone();
        gateway.set_down(true);

        let update = store.update_status(&id, TaskStatus::Completed).await;
        let remove = store.remove(&id).await;

        assert!(matches!(update, Err(Error::StoreUnavailable(_))));
        assert!(matches!(remove, Err(Error::StoreUnavailable(_))));
        assert_eq!(store.tasks().await, before);
    }

    #[tokio::test]
    async fn test_remove() {
        let (store, gateway) = store_with(&["Keep", "Drop"]).await;
        let id = store
            .tasks()
            .await
            .into_iter()
            .find(|t| t.title == "Drop")
            .unwrap()
            .id;

        store.remove(&id).await.unwrap();

        let titles: Vec<String> = store.tasks().await.into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["Keep".to_string()]);
        assert_eq!(gateway.inner.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_not_found_reconciles_with_gateway() {
        let (store, gateway) = store_with(&["Stale"]).await;
        let id = store.tasks().await[0].id.clone();
        // Someone else deleted it behind our back
        gateway.inner.delete(&id).await.unwrap();

        let result = store.update_status(&id, TaskStatus::Completed).await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(store.tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_not_found_reconciles_with_gateway() {
        let (store, gateway) = store_with(&["Gone", "Stays"]).await;
        let id = store
            .tasks()
            .await
            .into_iter()
            .find(|t| t.title == "Gone")
            .unwrap()
            .id;
        gateway.inner.delete(&id).await.unwrap();

        let result = store.remove(&id).await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        let titles: Vec<String> = store.tasks().await.into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["Stays".to_string()]);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_tasks() {
        let (store, gateway) = store_with(&["One"]).await;
        let before = store.tasks().await;
        gateway.set_down(true);

        assert!(store.refresh().await.is_err());

        assert_eq!(store.tasks().await, before);
        assert_eq!(
            store.last_error().await.as_deref(),
            Some("Store unavailable: network down")
        );
        store.clear_error().await;
        assert!(store.last_error().await.is_none());
    }

    #[tokio::test]
    async fn test_refresh_orders_newest_first() {
        let (store, _gateway) = store_with(&["first", "second", "third"]).await;

        let tasks = store.tasks().await;

        assert!(tasks
            .windows(2)
            .all(|pair| pair[0].created_at >= pair[1].created_at));
    }

    #[tokio::test]
    async fn test_edit_fields() {
        let (store, _gateway) = store_with(&["Draft"]).await;
        let id = store.tasks().await[0].id.clone();

        store
            .update(
                &id,
                TaskPatch::default()
                    .with_title(" Final ")
                    .with_priority(TaskPriority::High),
            )
            .await
            .unwrap();

        let task = store.tasks().await.remove(0);
        assert_eq!(task.title, "Final");
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_edit_with_blank_title_is_rejected() {
        let (store, gateway) = store_with(&["Draft"]).await;
        let id = store.tasks().await[0].id.clone();
        let calls = gateway.calls();

        let result = store.update(&id, TaskPatch::default().with_title("")).await;

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(gateway.calls(), calls);
    }

    #[tokio::test]
    async fn test_busy_record_is_rejected() {
        let (store, _gateway) = store_with(&["Contended"]).await;
        let id = store.tasks().await[0].id.clone();

        let guard = store.claim(&id).unwrap();
        let result = store.update_status(&id, TaskStatus::Completed).await;
        assert!(matches!(result, Err(Error::Busy(_))));

        drop(guard);
        store
            .update_status(&id, TaskStatus::Completed)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_updates_on_one_record() {
        let (store, gateway) = store_with(&["Contended"]).await;
        let id = store.tasks().await[0].id.clone();
        gateway.set_slow(true);

        let (first, second) = tokio::join!(
            store.update_status(&id, TaskStatus::Completed),
            store.update_status(&id, TaskStatus::Pending),
        );

        let busy = [&first, &second]
            .iter()
            .filter(|r| matches!(r, Err(Error::Busy(_))))
            .count();
        assert_eq!(busy, 1);
        assert!(first.is_ok() || second.is_ok());
        assert_eq!(gateway.updates.load(Ordering::SeqCst), 1);
        assert_eq!(store.tasks().await, gateway.inner.list().await.unwrap());
    }

    #[tokio::test]
    async fn test_stats_ignore_view_settings() {
        let (store, _gateway) = store_with(&["a", "b", "c"]).await;
        let id = store.tasks().await[0].id.clone();
        store.update_status(&id, TaskStatus::Completed).await.unwrap();

        let completed_view = store
            .view(
                &ViewQuery::new()
                    .with_filter(StatusFilter::Completed)
                    .with_sort(SortKey::Priority),
            )
            .await;
        let stats = store.stats().await;

        assert_eq!(completed_view.len(), 1);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.pending, 2);
    }

    #[test]
    fn test_next_stamp_moves_forward() {
        let future = Utc::now() + Duration::hours(1);
        assert!(next_stamp(Some(future)) > future);
        assert!(next_stamp(None) <= Utc::now());
    }
}
