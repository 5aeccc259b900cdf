//! Statistics over a crawl
//!
//! This module gathers summary numbers from a [`SiteCrawler`] and prints
//! them in a human-readable form.

use crate::analysis::LinkIndex;
use crate::crawler::SiteCrawler;
use crate::url::in_domain;
use crate::Result;
use std::collections::{HashMap, HashSet};
use url::Url;

/// Crawl statistics summary
#[derive(Debug, Clone, Default)]
pub struct CrawlStatistics {
    /// URIs with a successful result
    pub discovered: u64,

    /// URIs still waiting to be loaded
    pub pending: u64,

    /// URIs whose load failed
    pub failed: u64,

    /// Successful results that are link pages of the crawl domain
    pub link_pages: u64,

    /// Successful results that were only checked for existence
    pub checked_pages: u64,

    /// Links recorded across all link pages
    pub total_links: u64,

    /// Links that could not be resolved to a URI
    pub malformed_links: u64,

    /// Distinct out-of-domain URIs linked from the crawl
    pub external_uris: u64,

    /// Failed URIs grouped by error kind
    pub errors_by_kind: HashMap<&'static str, u64>,

    /// The URI linked from the most pages, with that count
    pub most_pointed: Option<(Url, usize)>,
}

impl CrawlStatistics {
    /// Collects statistics from a crawler
    ///
    /// # Errors
    ///
    /// * `Terminated` - the crawler has been cancelled
    pub fn collect(crawler: &SiteCrawler) -> Result<Self> {
        let discovered = crawler.loaded()?.len() as u64;
        let pending = crawler.to_load()?.len() as u64;
        let failed = crawler.errors()?.len() as u64;
        let domain = crawler.domain();

        let mut stats = crawler.with_results(|results| {
            let mut stats = Self::default();
            let mut external = HashSet::new();

            for result in results.values() {
                if let Some(error) = &result.error {
                    *stats.errors_by_kind.entry(error.kind()).or_insert(0) += 1;
                    continue;
                }

                if result.is_link_page {
                    stats.link_pages += 1;
                } else {
                    stats.checked_pages += 1;
                }
                stats.total_links += result.links().len() as u64;
                stats.malformed_links += result.malformed_links().len() as u64;

                external.extend(result.links().iter().filter(|link| !in_domain(domain, link)));
            }

            stats.external_uris = external.len() as u64;
            stats
        });

        stats.discovered = discovered;
        stats.pending = pending;
        stats.failed = failed;
        stats.most_pointed = LinkIndex::build(crawler).most_pointed();

        Ok(stats)
    }

    /// Total number of URIs the crawl knows about
    pub fn total_uris(&self) -> u64 {
        self.discovered + self.pending + self.failed
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(domain: &Url, stats: &CrawlStatistics) {
    println!("=== Crawl Statistics: {} ===\n", domain);

    println!("Overview:");
    println!("  Total URIs: {}", stats.total_uris());
    println!("  Discovered: {}", stats.discovered);
    println!("  Pending: {}", stats.pending);
    println!("  Failed: {}", stats.failed);
    println!();

    println!("Pages:");
    println!("  Link pages: {}", stats.link_pages);
    println!("  Checked only: {}", stats.checked_pages);
    println!("  Links found: {}", stats.total_links);
    println!("  Malformed links: {}", stats.malformed_links);
    println!("  External URIs: {}", stats.external_uris);
    println!();

    if !stats.errors_by_kind.is_empty() {
        println!("Error Summary:");
        let mut error_counts: Vec<_> = stats.errors_by_kind.iter().collect();
        error_counts.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

        for (kind, count) in error_counts {
            println!("  {}: {}", kind, count);
        }
        println!();
    }

    if let Some((uri, count)) = &stats.most_pointed {
        println!("Most linked: {} ({} pages)", uri, count);
    }

    let finished = stats.discovered + stats.failed;
    let success_rate = if finished > 0 {
        (stats.discovered as f64 / finished as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} URIs loaded)",
        success_rate, stats.discovered, finished
    );
}
