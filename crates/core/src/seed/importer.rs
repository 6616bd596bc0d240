//! Bootstrap importer
//!
//! Populates an empty store from the seed source, once per session.

use chrono::{Duration, Local, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use super::source::{SeedItem, SeedSource};
use crate::task::{TaskDraft, TaskGateway, TaskPriority, TaskStatus};
use crate::Result;

pub const DEFAULT_SEED_LIMIT: usize = 5;

/// Seed due dates fall within this many days from today
const DUE_WINDOW_DAYS: i64 = 10;

/// Description written on every imported task; also the dedup key
pub fn seed_tag(item_id: u64) -> String {
    format!("{}{})", SEED_TAG_PREFIX, item_id)
}

/// What a bootstrap run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The store already had tasks, or the import already ran
    Skipped,
    /// Seed items were written
    Imported(usize),
    /// The seed source failed and placeholder tasks were written instead
    Placeholder { count: usize, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImportState {
    Pending,
    /// A write was attempted and may have landed partially
    Interrupted,
    Done,
}

pub struct BootstrapImporter {
    source: Arc<dyn SeedSource>,
    limit: usize,
    fallback_to_placeholder: bool,
    rng: Mutex<StdRng>,
    state: tokio::sync::Mutex<ImportState>,
}

impl BootstrapImporter {
    pub fn new(source: Arc<dyn SeedSource>) -> Self {
        Self {
            source,
            limit: DEFAULT_SEED_LIMIT,
            fallback_to_placeholder: false,
            rng: Mutex::new(StdRng::from_entropy()),
            state: tokio::sync::Mutex::new(ImportState::Pending),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Write placeholder tasks when the seed source cannot be reached
    pub fn with_placeholder_fallback(mut self, enabled: bool) -> Self {
        self.fallback_to_placeholder = enabled;
        self
    }

    /// Make priorities and due dates reproducible
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Import seed data into `gateway` if it is empty.
    ///
    /// The emptiness check and the write happen under one guard, so
    /// concurrent or repeated calls never write a second batch. After an
    /// interrupted write, a retry only inserts items whose tag is missing.
    pub async fn run(&self, gateway: &dyn TaskGateway) -> Result<ImportOutcome> {
        let mut state = self.state.lock().await;
        if *state == ImportState::Done {
            return Ok(ImportOutcome::Skipped);
        }

        let existing = gateway.list().await?;
        if !existing.is_empty() {
            let resumable = *state == ImportState::Interrupted
                && existing.iter().all(|t| is_import_record(&t.description));
            if !resumable {
                info!("Store has {} tasks, skipping seed import", existing.len());
                *state = ImportState::Done;
                return Ok(ImportOutcome::Skipped);
            }
        }

        let today = Local::now().date_naive();
        let (drafts, placeholder_reason) = match self.source.fetch(self.limit).await {
            Ok(items) => (self.map_items(&items, today), None),
            Err(e) if self.fallback_to_placeholder => {
                warn!("Seed fetch failed, using placeholder tasks: {}", e);
                (placeholder_drafts(today), Some(e.to_string()))
            }
            Err(e) => {
                warn!("Seed fetch failed: {}", e);
                return Err(e);
            }
        };

        let known: HashSet<&str> = existing.iter().map(|t| t.description.as_str()).collect();
        let drafts: Vec<TaskDraft> = drafts
            .into_iter()
            .filter(|d| !known.contains(d.description.as_str()))
            .collect();

        let count = match gateway.insert_batch(drafts).await {
            Ok(created) => created.len(),
            Err(e) => {
                // The backend may have kept part of the batch
                *state = ImportState::Interrupted;
                return Err(e);
            }
        };
        *state = ImportState::Done;

        info!("Seeded {} tasks into {} store", count, gateway.backend());
        Ok(match placeholder_reason {
            Some(reason) => ImportOutcome::Placeholder { count, reason },
            None => ImportOutcome::Imported(count),
        })
    }

    fn map_items(&self, items: &[SeedItem], today: NaiveDate) -> Vec<TaskDraft> {
        // A poisoned rng is still a usable rng
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        items
            .iter()
            .filter(|item| {
                let keep = !item.title.trim().is_empty();
                if !keep {
                    warn!("Skipping seed item {} with a blank title", item.id);
                }
                keep
            })
            .map(|item| map_seed_item(item, &mut *rng, today))
            .collect()
    }
}

/// Turn one seed item into a draft
pub fn map_seed_item(item: &SeedItem, rng: &mut impl Rng, today: NaiveDate) -> TaskDraft {
    let priority = TaskPriority::ALL[rng.gen_range(0..TaskPriority::ALL.len())];
    let due = today + Duration::days(rng.gen_range(1..=DUE_WINDOW_DAYS));
    let status = if item.completed {
        TaskStatus::Completed
    } else {
        TaskStatus::Pending
    };

    TaskDraft::new(item.title.clone())
        .with_description(seed_tag(item.id))
        .with_priority(priority)
        .with_due_date(due)
        .with_status(status)
}

const SEED_TAG_PREFIX: &str = "Task imported from API (ID: ";

/// Title, description, status, priority and due offset in days
const PLACEHOLDER_ROWS: [(&str, &str, TaskStatus, TaskPriority, i64); 5] = [
    ("Design landing page", "Create wireframes and mockups for the new landing page", TaskStatus::Pending, TaskPriority::High, 3),
    ("Set up API integration", "Connect backend REST APIs to the frontend", TaskStatus::Completed, TaskPriority::Medium, 5),
    ("Write unit tests", "Add tests for all utility functions", TaskStatus::Pending, TaskPriority::Low, 8),
    ("Code review session", "Review pull requests from the development team", TaskStatus::Pending, TaskPriority::High, 11),
    ("Deploy to staging", "Push latest build to the staging environment", TaskStatus::Completed, TaskPriority::Medium, 14),
];

/// Demo tasks shown when the seed source is down
pub fn placeholder_drafts(today: NaiveDate) -> Vec<TaskDraft> {
    PLACEHOLDER_ROWS
        .into_iter()
        .map(|(title, description, status, priority, days)| {
            TaskDraft::new(title)
                .with_description(description)
                .with_status(status)
                .with_priority(priority)
                .with_due_date(today + Duration::days(days))
        })
        .collect()
}

/// True for descriptions written by the importer, seed or placeholder
fn is_import_record(description: &str) -> bool {
    let tagged = description
        .strip_prefix(SEED_TAG_PREFIX)
        .and_then(|rest| rest.strip_suffix(')'))
        .is_some_and(|id| id.parse::<u64>().is_ok());
    tagged || PLACEHOLDER_ROWS.iter().any(|row| row.1 == description)
}
