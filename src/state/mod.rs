//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `Frontier`: the pending / discovered / failed partition of every URI the
//!   crawler has accepted
//! - `PageState`: where a single URI sits in that partition

mod frontier;
mod page_state;

// Re-export main types
pub use frontier::Frontier;
pub use page_state::PageState;
