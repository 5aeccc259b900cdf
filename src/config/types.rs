use serde::Deserialize;

/// Main configuration structure for Sitewalk
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    pub site: SiteConfig,
    #[serde(default)]
    pub distance: DistanceConfig,
}

/// Crawl engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of loader instances used for full page fetches
    #[serde(rename = "fetch-workers", default = "default_fetch_workers")]
    pub fetch_workers: usize,

    /// Maximum number of concurrent existence checks
    #[serde(rename = "check-workers", default = "default_check_workers")]
    pub check_workers: usize,

    /// Seconds between checkpoints while a crawl is running
    #[serde(
        rename = "checkpoint-interval-secs",
        default = "default_checkpoint_interval_secs"
    )]
    pub checkpoint_interval_secs: u64,

    /// Number of results a slow subscriber may lag behind before losing some
    #[serde(
        rename = "result-stream-capacity",
        default = "default_result_stream_capacity"
    )]
    pub result_stream_capacity: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            fetch_workers: default_fetch_workers(),
            check_workers: default_check_workers(),
            checkpoint_interval_secs: default_checkpoint_interval_secs(),
            result_stream_capacity: default_result_stream_capacity(),
        }
    }
}

fn default_fetch_workers() -> usize {
    55
}

fn default_check_workers() -> usize {
    65
}

fn default_checkpoint_interval_secs() -> u64 {
    30
}

fn default_result_stream_capacity() -> usize {
    1024
}

/// HTTP loader configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    /// Whole-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Connection establishment timeout in seconds
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Maximum number of redirects followed for a single request
    #[serde(rename = "max-redirects", default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_redirects() -> usize {
    10
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "Sitewalk".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/sitewalk".to_string(),
            contact_email: "sitewalk@example.com".to_string(),
        }
    }
}

/// The site to crawl
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Root URI that scopes the crawl
    pub domain: String,

    /// Seed URIs; the domain itself is used when empty
    #[serde(default)]
    pub seeds: Vec<String>,

    /// Directory holding the crawl archive
    #[serde(default)]
    pub archive: Option<String>,
}

/// Distance engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DistanceConfig {
    /// Maximum number of breadth-first searches run in parallel
    #[serde(default = "default_distance_workers")]
    pub workers: usize,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            workers: default_distance_workers(),
        }
    }
}

fn default_distance_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
