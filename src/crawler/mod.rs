//! Crawler module for page loading and crawl control
//!
//! This module contains the core crawling logic, including:
//! - The loader capability and its default HTTP implementation
//! - HTML link extraction
//! - A bounded pool that runs loads concurrently
//! - The crawl scheduler and its control loop
//! - The domain-scoped, checkpointed site crawler

mod fetcher;
mod parser;
mod pool;
mod result;
mod scheduler;
mod site;

pub use fetcher::{
    build_http_client, FetchError, HttpLoader, HttpLoaderFactory, Loader, LoaderFactory,
};
pub use parser::extract_links;
pub use pool::{Completion, FetchHandle, FetchMode, FetchOutcome, FetchPool, PoolError};
pub use result::{CrawlResult, Poll, ResultSink};
pub use scheduler::{CrawlScheduler, CrawlSchedulerBuilder, PageLinkPredicate};
pub use site::SiteCrawler;
