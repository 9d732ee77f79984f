//! URL to mirror-path mapping
//!
//! Every captured URL maps to exactly one relative path inside its mirror
//! directory. The mapping is a pure function of the URL path: the query
//! string and fragment never influence it.

use std::borrow::Cow;
use std::path::PathBuf;
use url::Url;

/// File name used for URLs whose path ends in `/`
pub const INDEX_FILE: &str = "index.html";

/// Extension appended to file names that have none
pub const DEFAULT_EXTENSION: &str = "html";

/// Maps a URL to its relative path inside a mirror
///
/// # Mapping Rules
///
/// 1. Split the URL path on `/` and percent-decode each segment
/// 2. Drop empty, `.` and `..` segments; replace separators that appeared
///    through decoding with `_`
/// 3. If the path ends in `/` (or is empty), append `index.html`
/// 4. If the final file name has no extension, append `.html`
///
/// The result only contains normal components, so joining it onto a mirror
/// directory can never escape that directory.
///
/// # Examples
///
/// ```
/// use site_mirror::storage::map_url_path;
/// use std::path::PathBuf;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/docs/").unwrap();
/// assert_eq!(map_url_path(&url), PathBuf::from("docs/index.html"));
///
/// let url = Url::parse("https://example.com/about").unwrap();
/// assert_eq!(map_url_path(&url), PathBuf::from("about.html"));
/// ```
pub fn map_url_path(url: &Url) -> PathBuf {
    let raw_path = url.path();
    let mut relative = PathBuf::new();

    for segment in raw_path.split('/') {
        if segment.is_empty() {
            continue;
        }

        let decoded = decode_segment(segment);
        match decoded.as_str() {
            "." | ".." => continue,
            name => relative.push(name),
        }
    }

    if raw_path.ends_with('/') || relative.as_os_str().is_empty() {
        relative.push(INDEX_FILE);
    }

    if relative.extension().is_none() {
        let mut file_name = relative
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        file_name.push(".");
        file_name.push(DEFAULT_EXTENSION);
        relative.set_file_name(file_name);
    }

    relative
}

/// Percent-decodes one path segment into a single safe file name component
fn decode_segment(segment: &str) -> String {
    let decoded = urlencoding::decode(segment).unwrap_or(Cow::Borrowed(segment));

    decoded
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            other => other,
        })
        .collect()
}
