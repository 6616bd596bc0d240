use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};

use taskdash_core::store::TaskStore;
use taskdash_core::task::{Task, TaskDraft, TaskPatch, TaskPriority, TaskStatus};
use taskdash_core::view::{SortDirection, SortKey, StatusFilter, TaskStats, ViewQuery};

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List tasks
    List(ListArgs),
    /// Show task counts
    Stats,
    /// Add a task
    Add(AddArgs),
    /// Mark a task as completed
    Complete { id: String },
    /// Mark a task as pending again
    Reopen { id: String },
    /// Change a task's fields
    Edit(EditArgs),
    /// Delete a task
    Delete { id: String },
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long, value_enum)]
    filter: Option<Filter>,
    #[arg(long, value_enum)]
    sort: Option<Sort>,
    /// Oldest or lowest priority first
    #[arg(long)]
    asc: bool,
    /// Only titles containing this text
    #[arg(long)]
    search: Option<String>,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    title: String,
    #[arg(long)]
    description: Option<String>,
    /// Due date as YYYY-MM-DD
    #[arg(long)]
    due: Option<NaiveDate>,
    #[arg(long)]
    priority: Option<TaskPriority>,
}

#[derive(Args, Debug)]
pub struct EditArgs {
    id: String,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long, conflicts_with = "clear_due")]
    due: Option<NaiveDate>,
    #[arg(long)]
    clear_due: bool,
    #[arg(long)]
    priority: Option<TaskPriority>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Filter {
    All,
    Pending,
    Completed,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Sort {
    Created,
    Priority,
}

impl Command {
    pub async fn execute(self, store: &TaskStore) -> anyhow::Result<()> {
        match self {
            Self::List(args) => {
                let query = ViewQuery::new()
                    .with_filter(match args.filter {
                        Some(Filter::Pending) => StatusFilter::Pending,
                        Some(Filter::Completed) => StatusFilter::Completed,
                        Some(Filter::All) | None => StatusFilter::All,
                    })
                    .with_sort(match args.sort {
                        Some(Sort::Priority) => SortKey::Priority,
                        Some(Sort::Created) | None => SortKey::CreatedAt,
                    })
                    .with_direction(if args.asc {
                        SortDirection::Asc
                    } else {
                        SortDirection::Desc
                    })
                    .with_search(args.search.unwrap_or_default());

                let tasks = store.view(&query).await;
                if tasks.is_empty() {
                    println!("No tasks found");
                }
                for task in &tasks {
                    print_task(task);
                }
            }
            Self::Stats => print_stats(&store.stats().await),
            Self::Add(args) => {
                let mut draft = TaskDraft::new(args.title)
                    .with_description(args.description.unwrap_or_default())
                    .with_priority(args.priority.unwrap_or_default());
                if let Some(due) = args.due {
                    draft = draft.with_due_date(due);
                }
                let task = store.add(draft).await.context("Failed to add task")?;
                println!("Added {}", task.id);
            }
            Self::Complete { id } => {
                store
                    .update_status(&id, TaskStatus::Completed)
                    .await
                    .with_context(|| format!("Failed to complete {}", id))?;
                println!("Completed {}", id);
            }
            Self::Reopen { id } => {
                store
                    .update_status(&id, TaskStatus::Pending)
                    .await
                    .with_context(|| format!("Failed to reopen {}", id))?;
                println!("Reopened {}", id);
            }
            Self::Edit(args) => {
                let mut patch = TaskPatch::default();
                if let Some(title) = args.title {
                    patch = patch.with_title(title);
                }
                if let Some(description) = args.description {
                    patch = patch.with_description(description);
                }
                if args.clear_due {
                    patch = patch.with_due_date(None);
                } else if let Some(due) = args.due {
                    patch = patch.with_due_date(Some(due));
                }
                if let Some(priority) = args.priority {
                    patch = patch.with_priority(priority);
                }
                store
                    .update(&args.id, patch)
                    .await
                    .with_context(|| format!("Failed to edit {}", args.id))?;
                println!("Updated {}", args.id);
            }
            Self::Delete { id } => {
                store
                    .remove(&id)
                    .await
                    .with_context(|| format!("Failed to delete {}", id))?;
                println!("Deleted {}", id);
            }
        }
        Ok(())
    }
}

fn print_task(task: &Task) {
    let mark = match task.status {
        TaskStatus::Completed => "x",
        TaskStatus::Pending => " ",
    };
    let due = task
        .due_date
        .map(|d| d.format("%b %-d, %Y").to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "[{}] {:<6} {:<14} {}  ({})",
        mark,
        task.priority.as_str(),
        due,
        task.title,
        task.id
    );
    if !task.description.is_empty() {
        println!("           {}", task.description);
    }
}

fn print_stats(stats: &TaskStats) {
    println!("Total tasks:   {}", stats.total);
    println!("Completed:     {}", stats.completed);
    println!("Pending:       {}", stats.pending);
    println!("High priority: {}", stats.high_priority);
}
