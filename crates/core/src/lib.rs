//! Core library for the taskdash dashboard
//!
//! This crate contains the task-management core, including:
//! - Task records and persistence gateways (remote table, local file, memory)
//! - One-time seed import into an empty store
//! - The write-through task store
//! - Filtered and sorted views plus aggregate counts

pub mod config;
pub mod error;
pub mod seed;
pub mod store;
pub mod task;
pub mod view;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;
