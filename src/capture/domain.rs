//! Domain scoping for captured requests

/// Whether `hostname` falls under `filter_suffix`.
///
/// An empty filter accepts every host. Otherwise this is a plain string-suffix
/// check, so `evilexample.com` matches `example.com`.
pub fn matches(hostname: &str, filter_suffix: &str) -> bool {
    filter_suffix.is_empty() || hostname.ends_with(filter_suffix)
}

/// Last two dot-separated labels of a hostname.
///
/// Multi-part public suffixes are not handled: `shop.example.co.uk` yields
/// `co.uk`.
pub fn base_domain(hostname: &str) -> String {
    let labels: Vec<&str> = hostname.split('.').collect();
    let start = labels.len().saturating_sub(2);
    labels[start..].join(".")
}

/// Hostname of an absolute URL, or `None` if the URL does not parse or has no
/// host.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    parsed.host_str().map(str::to_string)
}

/// Hostname of an `http`/`https` URL. Browser-internal pages such as
/// `chrome://newtab` or extension pages yield `None`.
pub fn web_host_of(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    match parsed.scheme() {
        "http" | "https" => parsed.host_str().map(str::to_string),
        _ => None,
    }
}

/// Whether the URL's host is in scope for the filter. Malformed URLs never
/// match.
pub fn url_matches(url: &str, filter_suffix: &str) -> bool {
    match host_of(url) {
        Some(host) => matches(&host, filter_suffix),
        None => {
            tracing::debug!("Dropping request with unparseable URL: {}", url);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_host_requires_http_scheme() {
        assert_eq!(
            web_host_of("https://app.example.com/x").as_deref(),
            Some("app.example.com")
        );
        assert_eq!(web_host_of("http://localhost:8080/").as_deref(), Some("localhost"));
        assert_eq!(web_host_of("chrome://newtab"), None);
        assert_eq!(web_host_of("chrome-extension://abcdef/popup.html"), None);
        assert_eq!(web_host_of("about:blank"), None);
        assert_eq!(host_of("chrome://newtab").as_deref(), Some("newtab"));
    }

    #[test]
    fn empty_filter_accepts_everything() {
        assert!(matches("api.example.com", ""));
        assert!(matches("", ""));
        assert!(matches("localhost", ""));
    }

    #[test]
    fn suffix_semantics() {
        assert!(matches("api.example.com", "example.com"));
        assert!(matches("example.com", "example.com"));
        assert!(!matches("example.com.evil.net", "example.com"));
        assert!(!matches("example.org", "example.com"));
    }

    #[test]
    fn plain_suffix_accepts_lookalike_hosts() {
        assert!(matches("evilexample.com", "example.com"));
    }

    #[test]
    fn base_domain_keeps_last_two_labels() {
        assert_eq!(base_domain("app.dev.example.com"), "example.com");
        assert_eq!(base_domain("example.com"), "example.com");
        assert_eq!(base_domain("localhost"), "localhost");
        assert_eq!(base_domain("shop.example.co.uk"), "co.uk");
    }

    #[test]
    fn host_extraction() {
        assert_eq!(
            host_of("https://api.example.com:8443/v1?q=1").as_deref(),
            Some("api.example.com")
        );
        assert_eq!(host_of("not a url"), None);
        assert_eq!(host_of("/relative/path"), None);
    }

    #[test]
    fn malformed_urls_never_match() {
        assert!(!url_matches("::::", ""));
        assert!(url_matches("https://api.example.com/x", "example.com"));
        assert!(!url_matches("https://cdn.other.net/x", "example.com"));
    }
}
