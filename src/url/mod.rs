//! URL handling module for Site-Mirror
//!
//! This module provides URL normalization, host extraction, and the
//! [`Origin`] identity that scopes a crawl to a single site.

mod domain;
mod normalize;

use crate::{UrlError, UrlResult};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use url::Url;

// Re-export main functions
pub use domain::extract_host;
pub use normalize::{normalize_parsed, normalize_url};

/// The identity of a crawled site
///
/// An origin is the normalized scheme and host of the seed URL. Same-origin
/// checks compare hosts only: a site that redirects from `http` to `https`,
/// or serves assets from another port, is still the same mirror.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Origin {
    scheme: String,
    host: String,
}

impl Origin {
    /// Derives the origin of a URL
    ///
    /// # Examples
    ///
    /// ```
    /// use site_mirror::url::{normalize_url, Origin};
    ///
    /// let seed = normalize_url("https://Example.com/start").unwrap();
    /// let origin = Origin::from_url(&seed).unwrap();
    /// assert_eq!(origin.host(), "example.com");
    /// assert_eq!(origin.to_string(), "https://example.com");
    /// ```
    pub fn from_url(url: &Url) -> UrlResult<Self> {
        let host = extract_host(url).ok_or(UrlError::MissingHost)?;
        Ok(Self {
            scheme: url.scheme().to_string(),
            host,
        })
    }

    /// The lowercase host; also the name of the mirror directory
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Returns true if the URL belongs to this origin
    pub fn contains(&self, url: &Url) -> bool {
        self.matches_host(url.host_str().unwrap_or_default())
    }

    /// Returns true if the host string belongs to this origin
    pub fn matches_host(&self, host: &str) -> bool {
        host.eq_ignore_ascii_case(&self.host)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.host)
    }
}

/// Reduces raw absolute links to the unique same-origin URLs worth crawling
///
/// Links that fail to parse, use a non-HTTP scheme, or point at another host
/// are dropped. Fragments are removed before de-duplication, and the first
/// occurrence of each URL keeps its position.
pub fn same_origin_links<S: AsRef<str>>(links: &[S], origin: &Origin) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut result = Vec::new();

    for link in links {
        let url = match normalize_url(link.as_ref()) {
            Ok(url) => url,
            Err(e) => {
                tracing::trace!("Dropping link {}: {}", link.as_ref(), e);
                continue;
            }
        };

        if !origin.contains(&url) {
            tracing::trace!("Dropping off-origin link {}", url);
            continue;
        }

        if seen.insert(url.as_str().to_string()) {
            result.push(url);
        }
    }

    result
}
