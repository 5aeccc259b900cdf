//! Page loading
//!
//! This module defines the capability the crawler uses to reach the network:
//! - The [`Loader`] trait: fetch a page's raw links, or probe that a URI exists
//! - The [`LoaderFactory`] trait: creates loader instances for the fetch pool
//! - [`HttpLoader`]: the default reqwest-backed implementation
//! - Error classification into [`FetchError`]

use crate::config::{LoaderConfig, UserAgentConfig};
use crate::crawler::parser::extract_links;
use async_trait::async_trait;
use reqwest::{header, redirect::Policy, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Why a URI could not be loaded
///
/// Fetch errors are data: they are recorded in the URI's
/// [`CrawlResult`](crate::crawler::CrawlResult), never returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FetchError {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Failed to read body: {0}")]
    Body(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Short name of the error kind, used for statistics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Network(_) => "network",
            Self::UnsupportedScheme(_) => "unsupported_scheme",
            Self::Body(_) => "body",
            Self::Other(_) => "other",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            Self::Status(status.as_u16())
        } else if e.is_timeout() {
            Self::Network("Request timeout".to_string())
        } else if e.is_connect() {
            Self::Network(format!("Connection failed: {}", e))
        } else if e.is_redirect() {
            Self::Other(format!("Redirect error: {}", e))
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// A page loader
///
/// One instance handles one request at a time; the fetch pool keeps several
/// instances and hands each submission a free one.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Loads the page at `url` and returns its raw, unresolved links
    ///
    /// A document that is not HTML has no links.
    async fn fetch(&self, url: &Url) -> Result<Vec<String>, FetchError>;

    /// Checks that `url` exists without reading its content
    async fn check(&self, url: &Url) -> Result<(), FetchError>;
}

/// Creates loader instances
///
/// Any `Fn() -> Box<dyn Loader>` closure is a factory.
pub trait LoaderFactory: Send + Sync {
    fn create(&self) -> Box<dyn Loader>;
}

impl<F> LoaderFactory for F
where
    F: Fn() -> Box<dyn Loader> + Send + Sync,
{
    fn create(&self) -> Box<dyn Loader> {
        self()
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `loader` - Timeouts and redirect limit
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use sitewalk::config::{LoaderConfig, UserAgentConfig};
/// use sitewalk::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), &LoaderConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    loader: &LoaderConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(loader.request_timeout_secs))
        .connect_timeout(Duration::from_secs(loader.connect_timeout_secs))
        .redirect(Policy::limited(loader.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Loader backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: Client,
}

impl HttpLoader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Loader for HttpLoader {
    async fn fetch(&self, url: &Url) -> Result<Vec<String>, FetchError> {
        let response = self.client.get(url.clone()).send().await?;
        let response = ensure_success(response)?;

        if !is_html(&response) {
            return Ok(Vec::new());
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;

        Ok(extract_links(&body))
    }

    async fn check(&self, url: &Url) -> Result<(), FetchError> {
        let response = self.client.head(url.clone()).send().await?;

        // Some servers refuse HEAD outright
        let response = match response.status() {
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED => {
                self.client.get(url.clone()).send().await?
            }
            _ => response,
        };

        ensure_success(response).map(|_| ())
    }
}

/// Creates [`HttpLoader`]s sharing one connection pool
#[derive(Debug, Clone)]
pub struct HttpLoaderFactory {
    client: Client,
}

impl HttpLoaderFactory {
    pub fn new(user_agent: &UserAgentConfig, loader: &LoaderConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(user_agent, loader)?,
        })
    }
}

impl LoaderFactory for HttpLoaderFactory {
    fn create(&self) -> Box<dyn Loader> {
        Box::new(HttpLoader::new(self.client.clone()))
    }
}

fn ensure_success(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FetchError::Status(status.as_u16()))
    }
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.contains("text/html") || ct.contains("application/xhtml+xml")
        })
        .unwrap_or(false)
}
