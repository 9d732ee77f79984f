use url::Url;

/// Extracts the host from a URL
///
/// The host is lowercased. The port is not part of the result, so
/// `http://example.com:8080/` and `https://example.com/` share a host.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_mirror::url::extract_host;
///
/// let url = Url::parse("https://Sub.Example.com:8443/path").unwrap();
/// assert_eq!(extract_host(&url), Some("sub.example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str()
        .filter(|h| !h.is_empty())
        .map(|h| h.to_lowercase())
}
