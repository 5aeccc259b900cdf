//! Link graph snapshot used by the distance engine

use crate::crawler::SiteCrawler;
use crate::url::in_domain;
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

/// Shortest link distance from a fixed source to every reachable node
pub type DistanceMap = BTreeMap<Url, u32>;

/// Cooperative cancellation flag shared with running computations
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Immutable copy of the in-domain link graph
///
/// Nodes are the in-domain URIs that were loaded or failed. An edge runs from
/// a node to every node among its result's links.
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    edges: BTreeMap<Url, Vec<Url>>,
}

impl LinkGraph {
    /// Copies the graph out of a crawler
    pub fn snapshot(crawler: &SiteCrawler) -> crate::Result<Self> {
        let domain = crawler.domain();
        let nodes: BTreeSet<Url> = crawler
            .loaded()?
            .into_iter()
            .chain(crawler.errors()?)
            .filter(|uri| in_domain(domain, uri))
            .collect();

        let edges = crawler.with_results(|results| {
            nodes
                .iter()
                .map(|node| {
                    let mut seen = HashSet::new();
                    let targets = results
                        .get(node)
                        .map(|result| {
                            result
                                .links()
                                .iter()
                                .filter(|link| nodes.contains(*link) && seen.insert(*link))
                                .cloned()
                                .collect()
                        })
                        .unwrap_or_default();
                    (node.clone(), targets)
                })
                .collect()
        });

        Ok(Self { edges })
    }

    /// Builds a graph from explicit adjacency lists
    ///
    /// Targets that are not themselves nodes are dropped.
    pub fn from_edges(edges: impl IntoIterator<Item = (Url, Vec<Url>)>) -> Self {
        let raw: BTreeMap<Url, Vec<Url>> = edges.into_iter().collect();
        let edges = raw
            .iter()
            .map(|(node, targets)| {
                let targets = targets
                    .iter()
                    .filter(|t| raw.contains_key(*t))
                    .cloned()
                    .collect();
                (node.clone(), targets)
            })
            .collect();
        Self { edges }
    }

    pub fn contains(&self, uri: &Url) -> bool {
        self.edges.contains_key(uri)
    }

    /// Nodes in URI order
    pub fn nodes(&self) -> impl Iterator<Item = &Url> {
        self.edges.keys()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Breadth-first search from `source`
    ///
    /// Returns None if `cancel` fires before the search completes. The token
    /// is checked each time a node is expanded.
    pub fn distances_from(&self, source: &Url, cancel: &CancelToken) -> Option<DistanceMap> {
        let mut distances = DistanceMap::new();
        if !self.contains(source) {
            return Some(distances);
        }

        let mut visited: HashSet<&Url> = HashSet::from([source]);
        let mut queue: VecDeque<(&Url, u32)> = VecDeque::from([(source, 0)]);

        while let Some((node, distance)) = queue.pop_front() {
            if cancel.is_cancelled() {
                return None;
            }
            distances.insert(node.clone(), distance);

            for next in self.edges.get(node).into_iter().flatten() {
                if visited.insert(next) {
                    queue.push_back((next, distance + 1));
                }
            }
        }

        Some(distances)
    }
}
