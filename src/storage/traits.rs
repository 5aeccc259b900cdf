//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use crate::crawler::CrawlResult;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not an existing directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Serialization error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Corrupt archive at {}: {reason}", .path.display())]
    CorruptArchive { path: PathBuf, reason: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for checkpoint backends
///
/// Results are handed over one at a time with [`put`](CheckpointStore::put)
/// and buffered in memory; [`checkpoint`](CheckpointStore::checkpoint) makes
/// the buffered results and the current pending set durable together.
///
/// Implementations are shared between the crawl loop and the periodic
/// checkpoint task and must be safe to call from any thread.
pub trait CheckpointStore: Send + Sync {
    /// The root URI the stored crawl is scoped to
    fn domain(&self) -> &Url;

    /// Buffers a result until the next checkpoint
    fn put(&self, result: &CrawlResult);

    /// Persists every buffered result together with the pending set
    ///
    /// `pending` is called once, after the buffer has been captured. Results
    /// buffered while it runs are not part of this checkpoint, so their URIs
    /// are stored as pending as well.
    ///
    /// On failure the previous checkpoint stays intact and the buffer is kept
    /// so the next attempt writes the same records again.
    fn checkpoint(&self, pending: &dyn Fn() -> Vec<Url>) -> StorageResult<()>;

    /// Number of results waiting for the next checkpoint
    fn buffered(&self) -> usize;
}
