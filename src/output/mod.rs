//! Output module for crawl reports
//!
//! This module handles gathering summary statistics from a crawl and
//! printing them.

pub mod stats;

pub use stats::{print_statistics, CrawlStatistics};
