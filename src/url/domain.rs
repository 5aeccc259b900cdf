use crate::{UrlError, UrlResult};
use url::Url;

/// Checks whether a URL can be used as the root of a crawl
///
/// A domain must use the `http` or `https` scheme, have a host, and carry
/// neither a query nor a fragment.
pub fn check_domain(domain: &Url) -> UrlResult<()> {
    if domain.scheme() != "http" && domain.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            domain.scheme()
        )));
    }

    if domain.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    if domain.query().is_some() || domain.fragment().is_some() {
        return Err(UrlError::NotADomain(domain.to_string()));
    }

    Ok(())
}

/// Parses and validates a domain string
pub fn parse_domain(raw: &str) -> UrlResult<Url> {
    let domain = Url::parse(raw).map_err(|e| UrlError::Parse(e.to_string()))?;
    check_domain(&domain)?;
    Ok(domain)
}

/// Returns true if `uri` lies inside `domain`
///
/// The URI must share the domain's scheme, host and port, and its path must
/// start with the domain's path.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitewalk::url::in_domain;
///
/// let domain = Url::parse("https://example.com/docs/").unwrap();
/// assert!(in_domain(&domain, &Url::parse("https://example.com/docs/a").unwrap()));
/// assert!(!in_domain(&domain, &Url::parse("https://example.com/blog").unwrap()));
/// ```
pub fn in_domain(domain: &Url, uri: &Url) -> bool {
    domain.scheme() == uri.scheme()
        && domain.host_str().map(str::to_lowercase) == uri.host_str().map(str::to_lowercase)
        && domain.port_or_known_default() == uri.port_or_known_default()
        && uri.path().starts_with(domain.path())
}
