//! Link distances over a crawled site
//!
//! The [`DistanceEngine`] answers shortest-path questions on the graph of
//! in-domain pages a [`SiteCrawler`] has loaded. Distance maps are cached per
//! source and thrown away whenever the crawl is started again.

use crate::analysis::graph::{CancelToken, DistanceMap, LinkGraph};
use crate::config::DistanceConfig;
use crate::crawler::SiteCrawler;
use crate::{Result, SitewalkError};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// A pair of URIs and the link distance between them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriDistance {
    pub from: Url,
    pub to: Url,
    pub distance: u32,
}

#[derive(Default)]
struct DistanceCache {
    generation: u64,
    maps: BTreeMap<Url, DistanceMap>,
}

/// Computes and caches link distances for one crawler
pub struct DistanceEngine {
    crawler: Arc<SiteCrawler>,
    workers: usize,
    cache: Mutex<DistanceCache>,
}

impl DistanceEngine {
    pub fn new(crawler: Arc<SiteCrawler>, config: &DistanceConfig) -> Self {
        let generation = crawler.generation();
        Self {
            crawler,
            workers: config.workers.max(1),
            cache: Mutex::new(DistanceCache {
                generation,
                maps: BTreeMap::new(),
            }),
        }
    }

    /// The cached distance map from `uri`
    ///
    /// # Errors
    ///
    /// * `CrawlRunning` - the crawl is running
    /// * `NotComputed` - no map from `uri` is cached
    pub fn distance_map_from(&self, uri: &Url) -> Result<DistanceMap> {
        let cache = self.ready_cache()?;
        cache
            .maps
            .get(uri)
            .cloned()
            .ok_or_else(|| SitewalkError::NotComputed(uri.to_string()))
    }

    /// Computes (or returns the cached) distance map from `uri`
    ///
    /// # Errors
    ///
    /// * `CrawlRunning` - the crawl is running
    /// * `UnknownUri` - `uri` is not a loaded or failed page of the domain
    /// * `Cancelled` - `cancel` fired; nothing is cached
    pub async fn compute_distances(&self, uri: &Url, cancel: &CancelToken) -> Result<DistanceMap> {
        let generation = {
            let cache = self.ready_cache()?;
            if let Some(map) = cache.maps.get(uri) {
                return Ok(map.clone());
            }
            cache.generation
        };

        let graph = LinkGraph::snapshot(&self.crawler)?;
        if !graph.contains(uri) {
            return Err(SitewalkError::UnknownUri(uri.to_string()));
        }

        let source = uri.clone();
        let token = cancel.clone();
        let map = tokio::task::spawn_blocking(move || graph.distances_from(&source, &token))
            .await
            .map_err(|e| SitewalkError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
            .ok_or(SitewalkError::Cancelled)?;

        self.store(generation, uri.clone(), map.clone());
        Ok(map)
    }

    /// Finds the pair of pages farthest apart
    ///
    /// Every page without a cached map is searched from, at most
    /// `distance.workers` at a time. Pairs are compared in URI order and the
    /// first maximum wins. Returns None if no page has been loaded.
    ///
    /// When `cancel` fires, no further searches are started, the finished ones
    /// stay cached and `Cancelled` is returned.
    pub async fn compute_max_distance(&self, cancel: &CancelToken) -> Result<Option<UriDistance>> {
        let (generation, cached) = {
            let cache = self.ready_cache()?;
            let cached: HashSet<Url> = cache.maps.keys().cloned().collect();
            (cache.generation, cached)
        };

        let graph = Arc::new(LinkGraph::snapshot(&self.crawler)?);
        if graph.is_empty() {
            return Ok(None);
        }
        let sources: Vec<Url> = graph
            .nodes()
            .filter(|node| !cached.contains(*node))
            .cloned()
            .collect();

        tracing::debug!(
            "Computing distances from {} of {} pages",
            sources.len(),
            graph.len()
        );

        let permits = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();
        for source in sources {
            if cancel.is_cancelled() {
                break;
            }
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let graph = Arc::clone(&graph);
            let token = cancel.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let map = graph.distances_from(&source, &token);
                (source, map)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((source, Some(map))) => self.store(generation, source, map),
                Ok((source, None)) => tracing::trace!("Search from {} cancelled", source),
                Err(e) => tracing::warn!("Distance search failed: {}", e),
            }
        }

        if cancel.is_cancelled() {
            return Err(SitewalkError::Cancelled);
        }

        let cache = self.ready_cache()?;
        let mut best: Option<UriDistance> = None;
        for (from, map) in cache.maps.iter().filter(|(from, _)| graph.contains(from)) {
            for (to, &distance) in map {
                if best.as_ref().map_or(true, |b| distance > b.distance) {
                    best = Some(UriDistance {
                        from: from.clone(),
                        to: to.clone(),
                        distance,
                    });
                }
            }
        }
        Ok(best)
    }

    /// Locks the cache after checking the crawl is idle, dropping stale maps
    fn ready_cache(&self) -> Result<MutexGuard<'_, DistanceCache>> {
        if self.crawler.is_running() {
            return Err(SitewalkError::CrawlRunning);
        }
        let generation = self.crawler.generation();
        let mut cache = lock(&self.cache);
        if cache.generation != generation {
            tracing::debug!("Crawl restarted, dropping {} distance maps", cache.maps.len());
            cache.maps.clear();
            cache.generation = generation;
        }
        Ok(cache)
    }

    fn store(&self, generation: u64, source: Url, map: DistanceMap) {
        let mut cache = lock(&self.cache);
        if cache.generation == generation && self.crawler.generation() == generation {
            cache.maps.insert(source, map);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
