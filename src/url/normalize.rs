use crate::{UrlError, UrlResult};
use url::{ParseError, Url};

/// Outcome of parsing a raw URI string without a base
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawUri {
    /// The string is an absolute URI
    Absolute(Url),
    /// The string is a relative reference and needs a base to be resolved
    Relative(String),
}

/// Parses a raw string that is expected to be an absolute URI
///
/// Relative references are reported as [`RawUri::Relative`] rather than as an
/// error so callers can decide how to treat them.
pub fn parse_absolute(raw: &str) -> UrlResult<RawUri> {
    match Url::parse(raw) {
        Ok(url) => Ok(RawUri::Absolute(url)),
        Err(ParseError::RelativeUrlWithoutBase) => Ok(RawUri::Relative(raw.to_string())),
        Err(e) => Err(UrlError::Parse(e.to_string())),
    }
}

/// Resolves a raw `href` found on `base` into an absolute URI
///
/// # Resolution Steps
///
/// 1. Join the raw reference against the page it was found on
/// 2. Drop the fragment (`#...`), which never names a different resource
/// 3. Re-parse the serialized form so equal resources compare equal
///
/// # Arguments
///
/// * `base` - The URI of the page the link was found on
/// * `raw` - The raw link text as extracted from the page
///
/// # Returns
///
/// * `Ok(Url)` - The resolved, canonical URI
/// * `Err(UrlError)` - The raw link cannot be turned into a URI
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitewalk::url::resolve_link;
///
/// let base = Url::parse("http://a.test/docs/intro").unwrap();
/// let link = resolve_link(&base, "../about#team").unwrap();
/// assert_eq!(link.as_str(), "http://a.test/about");
/// ```
pub fn resolve_link(base: &Url, raw: &str) -> UrlResult<Url> {
    let mut joined = base
        .join(raw)
        .map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    joined.set_fragment(None);

    Url::parse(joined.as_str()).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("http://a.test/dir/page.html").unwrap()
    }

    #[test]
    fn test_parse_absolute() {
        assert_eq!(
            parse_absolute("http://a.test/x").unwrap(),
            RawUri::Absolute(Url::parse("http://a.test/x").unwrap())
        );
    }

    #[test]
    fn test_parse_relative() {
        assert_eq!(
            parse_absolute("/x/y").unwrap(),
            RawUri::Relative("/x/y".to_string())
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_absolute("http://[::1").is_err());
    }

    #[test]
    fn test_resolve_relative_path() {
        let url = resolve_link(&base(), "other.html").unwrap();
        assert_eq!(url.as_str(), "http://a.test/dir/other.html");
    }

    #[test]
    fn test_resolve_root_relative() {
        let url = resolve_link(&base(), "/b").unwrap();
        assert_eq!(url.as_str(), "http://a.test/b");
    }

    #[test]
    fn test_resolve_absolute_link() {
        let url = resolve_link(&base(), "https://b.test/page").unwrap();
        assert_eq!(url.as_str(), "https://b.test/page");
    }

    #[test]
    fn test_resolve_drops_fragment() {
        let url = resolve_link(&base(), "#section").unwrap();
        assert_eq!(url.as_str(), "http://a.test/dir/page.html");
    }

    #[test]
    fn test_resolve_removes_dot_segments() {
        let url = resolve_link(&base(), "./a/../b").unwrap();
        assert_eq!(url.as_str(), "http://a.test/dir/b");
    }

    #[test]
    fn test_resolve_canonicalizes_host_case() {
        let url = resolve_link(&base(), "HTTP://A.TEST/Path").unwrap();
        assert_eq!(url.as_str(), "http://a.test/Path");
    }

    #[test]
    fn test_resolve_malformed() {
        assert!(resolve_link(&base(), "http://[::1").is_err());
        assert!(resolve_link(&base(), "http://").is_err());
    }
}
