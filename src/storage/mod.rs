//! Storage module for persisting crawl progress
//!
//! This module handles checkpointing a crawl so it can be suspended and
//! resumed without downloading anything twice:
//! - An append-only, newline-delimited JSON log of every crawl result
//! - The set of URIs still to load, replaced atomically on each checkpoint
//! - Restoring both into the sets a crawler is seeded with

mod archive;
mod traits;

pub use archive::{DirectoryArchive, DomainRecord, RestoredCrawl};
pub use traits::{CheckpointStore, StorageError, StorageResult};
