use std::path::{Path, PathBuf};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::models::Variant;

/// Base name that turns a request into a latest lookup
pub const LATEST: &str = "latest";

/// Only suffix the archive server hands out directly
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

const SEPARATOR: char = '/';

/// Everything outside the RFC 3986 unreserved set gets escaped in a segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Why a request path was refused before touching the filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("empty path")]
    EmptyPath,
    #[error("invalid percent-encoding")]
    InvalidEncoding,
    #[error("trailing separator")]
    TrailingSeparator,
    #[error("path escapes root")]
    EscapesRoot,
    #[error("unsupported extension")]
    UnsupportedExtension,
    #[error("filename not allowed")]
    FilenameNotAllowed,
}

/// Outcome of classifying a URL path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Malformed(Rejection),
    /// Serve the file at this path as-is.
    Direct(String),
    /// Resolve the newest entry of this directory.
    Latest(String),
}

/// Classify a URL path for the given server variant.
///
/// Rules apply in order: empty, trailing separator, parent segments,
/// `latest` base name, then the variant's rule for everything else.
pub fn classify(url_path: &str, variant: Variant) -> Classification {
    if url_path.is_empty() {
        return Classification::Malformed(Rejection::EmptyPath);
    }

    if url_path.ends_with(SEPARATOR) {
        return Classification::Malformed(Rejection::TrailingSeparator);
    }

    if url_path.split(SEPARATOR).any(|segment| segment == "..") {
        return Classification::Malformed(Rejection::EscapesRoot);
    }

    if base_name(url_path) == LATEST {
        return Classification::Latest(parent(url_path).to_string());
    }

    match variant {
        Variant::Archive if !url_path.ends_with(ARCHIVE_SUFFIX) => {
            Classification::Malformed(Rejection::UnsupportedExtension)
        }
        Variant::Archive => Classification::Direct(url_path.to_string()),
        Variant::LatestOnly => Classification::Malformed(Rejection::FilenameNotAllowed),
    }
}

/// Percent-decode a raw URI path.
///
/// Classification must run on the decoded form so an escaped `..` is still
/// caught.
pub fn decode_path(raw: &str) -> Result<String, Rejection> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(|_| Rejection::InvalidEncoding)
}

/// Escape one path segment for use in a URI reference
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Final segment of a URL path
pub fn base_name(url_path: &str) -> &str {
    match url_path.rfind(SEPARATOR) {
        Some(idx) => &url_path[idx + 1..],
        None => url_path,
    }
}

/// Everything before the final segment, without the separator
pub fn parent(url_path: &str) -> &str {
    match url_path.rfind(SEPARATOR) {
        Some(idx) => &url_path[..idx],
        None => "",
    }
}

/// Append the segments of a URL path to `root`.
///
/// Empty and `.` segments are skipped so a leading separator never replaces
/// the root. Callers must have rejected `..` segments through [`classify`].
pub fn join_under_root(root: &Path, url_path: &str) -> PathBuf {
    url_path
        .split(SEPARATOR)
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}
