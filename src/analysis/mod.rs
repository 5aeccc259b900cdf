//! Analytics over the crawled link graph
//!
//! # Components
//!
//! - `DistanceEngine`: shortest link distances between pages, computed with
//!   cancelable, parallel breadth-first searches
//! - `LinkIndex`: which pages link to a URI, and the most linked-to URI
//! - `links_to_domain`: links leaving the crawled domain toward another one

mod distance;
mod graph;
mod links;

pub use distance::{DistanceEngine, UriDistance};
pub use graph::{CancelToken, DistanceMap, LinkGraph};
pub use links::{links_to_domain, LinkIndex};
