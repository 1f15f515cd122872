//! Repository location normalization.
//!
//! Applications reference repositories over HTTP(S), while clones run over
//! SSH. [`normalize`] rewrites web URLs into the scp-like `git@host:path`
//! form; the result doubles as the clone cache key.

use url::Url;

use crate::domain::{Result, RoarError};

const SSH_PREFIX: &str = "git@";

/// Rewrite an `http(s)://host/path` URL to `git@host:path`.
///
/// SSH locations are returned unchanged, as are other schemes and
/// scheme-less references such as local paths.
pub fn normalize(location: &str) -> Result<String> {
    if location.starts_with(SSH_PREFIX) {
        return Ok(location.to_string());
    }

    let parsed = match Url::parse(location) {
        Ok(parsed) => parsed,
        Err(url::ParseError::RelativeUrlWithoutBase) if !location.starts_with(':') => {
            return Ok(location.to_string());
        }
        Err(err) => {
            return Err(RoarError::InvalidLocation {
                url: location.to_string(),
                reason: format!("could not parse URL: {err}"),
            });
        }
    };

    if parsed.scheme() != "https" && parsed.scheme() != "http" {
        return Ok(location.to_string());
    }

    // `Url` canonicalizes host, port and path; the rewrite keeps them as
    // written.
    let (host, path) = raw_host_and_path(location);
    let path = path.strip_prefix('/').unwrap_or(path);

    Ok(format!("{SSH_PREFIX}{host}:{path}"))
}

/// Host (with any port, without user info) and path of a
/// `scheme://authority/path` string, as written.
fn raw_host_and_path(location: &str) -> (&str, &str) {
    let rest = location
        .split_once("://")
        .map_or(location, |(_, rest)| rest);
    let end = rest.find(|c| c == '?' || c == '#').unwrap_or(rest.len());
    let rest = &rest[..end];
    let (authority, path) = rest.split_at(rest.find('/').unwrap_or(rest.len()));
    let host = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host);
    (host, path)
}

/// Identity of one checkout: normalized location plus revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub location: String,
    pub revision: String,
}

impl CacheKey {
    /// Normalize `location` and pair it with `revision`.
    pub fn new(location: &str, revision: &str) -> Result<Self> {
        Ok(Self {
            location: normalize(location)?,
            revision: revision.to_string(),
        })
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.location, self.revision)
    }
}
