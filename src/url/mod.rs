//! URL handling module for Sitewalk
//!
//! This module provides domain validation, the domain-membership predicate
//! that scopes a crawl, and link resolution for raw `href` values.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{check_domain, in_domain, parse_domain};
pub use normalize::{parse_absolute, resolve_link, RawUri};
