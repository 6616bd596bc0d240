//! Task store
//!
//! The single owner of the in-memory task collection.

mod task_store;

pub use task_store::{StoreState, TaskStore};
