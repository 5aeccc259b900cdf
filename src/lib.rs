//! Sitewalk: a resumable, domain-scoped site crawler
//!
//! This crate crawls every reachable page inside a root domain, records the
//! outgoing links and fetch outcome of each page, checkpoints its progress to
//! an archive directory so a crawl can be suspended and resumed, and computes
//! link-graph analytics (shortest-path distances, in-link counts) over what it
//! discovered.

pub mod analysis;
pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sitewalk operations
#[derive(Debug, Error)]
pub enum SitewalkError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Crawler has been cancelled")]
    Terminated,

    #[error("URI {uri} does not belong to domain {domain}")]
    OutOfDomain { uri: String, domain: String },

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("URI has not been crawled: {0}")]
    UnknownUri(String),

    #[error("Distances from {0} have not been computed")]
    NotComputed(String),

    #[error("Operation requires the crawl to be suspended")]
    CrawlRunning,

    #[error("Crawl is still being suspended")]
    CrawlStopping,

    #[error("Computation cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Domain must not carry a query or fragment: {0}")]
    NotADomain(String),
}

/// Result type alias for Sitewalk operations
pub type Result<T> = std::result::Result<T, SitewalkError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use analysis::{DistanceEngine, LinkIndex, UriDistance};
pub use config::Config;
pub use crawler::{CrawlResult, CrawlScheduler, FetchError, Loader, LoaderFactory, Poll, SiteCrawler};
pub use state::{Frontier, PageState};
pub use crate::url::{check_domain, in_domain, resolve_link};
