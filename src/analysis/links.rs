//! In-link analytics
//!
//! A [`LinkIndex`] inverts the crawled link graph: for every URI it records
//! which successfully loaded pages link to it.

use crate::crawler::SiteCrawler;
use crate::url::{check_domain, in_domain};
use crate::{Result, SitewalkError};
use std::collections::{BTreeMap, BTreeSet};
use url::Url;

/// URIs mapped to the pages that link to them
#[derive(Debug, Clone, Default)]
pub struct LinkIndex {
    pointings: BTreeMap<Url, BTreeSet<Url>>,
}

impl LinkIndex {
    /// Indexes every successfully loaded link page of `crawler`
    pub fn build(crawler: &SiteCrawler) -> Self {
        crawler.with_results(|results| {
            let mut index = Self::default();
            for result in results.values() {
                if !result.is_link_page || result.is_failure() {
                    continue;
                }
                for link in result.links() {
                    index
                        .pointings
                        .entry(link.clone())
                        .or_default()
                        .insert(result.uri.clone());
                }
            }
            index
        })
    }

    /// Pages linking to `uri`, in URI order
    pub fn pointing_to(&self, uri: &Url) -> Vec<Url> {
        self.pointings
            .get(uri)
            .map(|pages| pages.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of distinct pages linking to `uri`
    pub fn count(&self, uri: &Url) -> usize {
        self.pointings.get(uri).map_or(0, BTreeSet::len)
    }

    /// The URI linked from the most distinct pages, with that count
    ///
    /// Ties go to the smallest URI.
    pub fn most_pointed(&self) -> Option<(Url, usize)> {
        let mut best: Option<(&Url, usize)> = None;
        for (uri, pages) in &self.pointings {
            if best.map_or(true, |(_, count)| pages.len() > count) {
                best = Some((uri, pages.len()));
            }
        }
        best.map(|(uri, count)| (uri.clone(), count))
    }

    pub fn is_empty(&self) -> bool {
        self.pointings.is_empty()
    }
}

/// Every link from a loaded in-domain page that falls inside `other_domain`
///
/// # Errors
///
/// * `InvalidDomain` - `other_domain` is not a valid domain
pub fn links_to_domain(crawler: &SiteCrawler, other_domain: &Url) -> Result<BTreeSet<Url>> {
    check_domain(other_domain)
        .map_err(|e| SitewalkError::InvalidDomain(format!("{}: {}", other_domain, e)))?;

    let loaded = crawler.loaded()?;
    let domain = crawler.domain();

    Ok(crawler.with_results(|results| {
        loaded
            .iter()
            .filter(|uri| in_domain(domain, uri))
            .filter_map(|uri| results.get(uri))
            .flat_map(|result| result.links())
            .filter(|link| in_domain(other_domain, link))
            .cloned()
            .collect()
    }))
}
