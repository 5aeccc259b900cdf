//! Crawl results and the poll protocol

use crate::crawler::fetcher::FetchError;
use serde::{Deserialize, Serialize};
use url::Url;

/// The recorded outcome of loading one URI
///
/// `links` and `malformed_links` are present exactly when the URI is a link
/// page, i.e. a page whose links the crawler follows. `error` is present
/// exactly when loading failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlResult {
    pub uri: Url,
    pub is_link_page: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<Url>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub malformed_links: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FetchError>,
}

impl CrawlResult {
    /// A link page that loaded successfully
    pub fn page(uri: Url, links: Vec<Url>, malformed_links: Vec<String>) -> Self {
        Self {
            uri,
            is_link_page: true,
            links: Some(links),
            malformed_links: Some(malformed_links),
            error: None,
        }
    }

    /// A non-link page that was found to exist
    pub fn checked(uri: Url) -> Self {
        Self {
            uri,
            is_link_page: false,
            links: None,
            malformed_links: None,
            error: None,
        }
    }

    /// A URI that could not be loaded
    pub fn failure(uri: Url, is_link_page: bool, error: FetchError) -> Self {
        let (links, malformed_links) = if is_link_page {
            (Some(Vec::new()), Some(Vec::new()))
        } else {
            (None, None)
        };
        Self {
            uri,
            is_link_page,
            links,
            malformed_links,
            error: Some(error),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// Outgoing links, empty for non-link pages
    pub fn links(&self) -> &[Url] {
        self.links.as_deref().unwrap_or(&[])
    }

    /// Raw links that could not be resolved, empty for non-link pages
    pub fn malformed_links(&self) -> &[String] {
        self.malformed_links.as_deref().unwrap_or(&[])
    }
}

/// Result of a non-blocking poll for the next crawl result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    /// The crawl is not running; nothing more will arrive until it restarts
    NotRunning,
    /// The crawl is running but no result is ready yet
    Pending,
    /// The next result in completion order
    Item(CrawlResult),
}

impl Poll {
    pub fn into_item(self) -> Option<CrawlResult> {
        match self {
            Self::Item(result) => Some(result),
            _ => None,
        }
    }
}

/// Receives every result as soon as the crawl loop classifies it
///
/// The sink runs before the result becomes pollable, so anything observed
/// through [`Poll`] is already recorded.
pub trait ResultSink: Send + Sync {
    fn record(&self, result: &CrawlResult);
}
