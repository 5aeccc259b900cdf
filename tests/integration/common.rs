//! Shared fixtures for the integration tests

use async_trait::async_trait;
use sitewalk::config::CrawlerConfig;
use sitewalk::crawler::{CrawlResult, FetchError, Loader, LoaderFactory, Poll, SiteCrawler};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Serves fixed link lists
///
/// Unknown pages are 404s, every page on `gone.test` fails its existence
/// check, and a page at path `/stall` never finishes loading.
#[derive(Clone)]
pub struct MapLoader {
    pages: Arc<HashMap<String, Vec<String>>>,
}

#[async_trait]
impl Loader for MapLoader {
    async fn fetch(&self, url: &Url) -> Result<Vec<String>, FetchError> {
        if url.path() == "/stall" {
            std::future::pending::<()>().await;
        }
        self.pages
            .get(url.as_str())
            .cloned()
            .ok_or(FetchError::Status(404))
    }

    async fn check(&self, url: &Url) -> Result<(), FetchError> {
        if url.host_str() == Some("gone.test") {
            Err(FetchError::Status(404))
        } else {
            Ok(())
        }
    }
}

/// Never finishes a load
pub struct StallLoader;

#[async_trait]
impl Loader for StallLoader {
    async fn fetch(&self, _url: &Url) -> Result<Vec<String>, FetchError> {
        std::future::pending().await
    }

    async fn check(&self, _url: &Url) -> Result<(), FetchError> {
        std::future::pending().await
    }
}

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub fn site(pages: &[(&str, &[&str])]) -> Arc<dyn LoaderFactory> {
    let loader = MapLoader {
        pages: Arc::new(
            pages
                .iter()
                .map(|(page, links)| {
                    (page.to_string(), links.iter().map(|l| l.to_string()).collect())
                })
                .collect(),
        ),
    };
    Arc::new(move || -> Box<dyn Loader> { Box::new(loader.clone()) })
}

pub fn stalled() -> Arc<dyn LoaderFactory> {
    Arc::new(|| -> Box<dyn Loader> { Box::new(StallLoader) })
}

pub fn config(fetch_workers: usize) -> CrawlerConfig {
    CrawlerConfig {
        fetch_workers,
        check_workers: 4,
        ..CrawlerConfig::default()
    }
}

/// Polls until nothing is left to load, returning results in poll order
pub async fn drain(crawler: &SiteCrawler) -> Vec<CrawlResult> {
    let mut results = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        match crawler.poll().unwrap() {
            Poll::Item(result) => results.push(result),
            Poll::Pending if crawler.to_load().unwrap().is_empty() => {
                while let Poll::Item(result) = crawler.poll().unwrap() {
                    results.push(result);
                }
                return results;
            }
            Poll::Pending => {
                assert!(tokio::time::Instant::now() < deadline, "crawl did not finish");
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            Poll::NotRunning => return results,
        }
    }
}

/// Starts the crawler, waits for it to run dry, then suspends it
pub async fn crawl_to_end(crawler: &SiteCrawler) -> Vec<CrawlResult> {
    crawler.start().unwrap();
    let results = drain(crawler).await;
    crawler.suspend().await.unwrap();
    results
}
