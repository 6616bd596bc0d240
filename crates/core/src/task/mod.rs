//! Task module
//!
//! Task records and the persistence gateways that store them.

mod file_store;
mod gateway;
mod memory_store;
mod model;
mod remote_store;

pub use file_store::{FileTaskGateway, STORAGE_KEY};
pub use gateway::TaskGateway;
pub use memory_store::MemoryTaskGateway;
pub use model::*;
pub use remote_store::{RemoteConfig, RemoteTaskGateway};
