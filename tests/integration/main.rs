//! Integration tests for Sitewalk
//!
//! These drive a `SiteCrawler` end to end, either against in-memory loaders
//! or against a wiremock HTTP server.

mod analysis_tests;
mod common;
mod crawl_tests;
mod persistence_tests;
