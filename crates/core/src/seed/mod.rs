//! Seed import
//!
//! One-time population of an empty store from a demo data source.

mod importer;
mod source;

pub use importer::{
    map_seed_item, placeholder_drafts, seed_tag, BootstrapImporter, ImportOutcome,
    DEFAULT_SEED_LIMIT,
};
pub use source::{HttpSeedSource, SeedItem, SeedSource, StaticSeedSource, DEFAULT_SEED_URL};
