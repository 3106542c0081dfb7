//! Resource URLs
//!
//! `kzb://<root>/<path>` addresses an entry in the merged directory. The
//! directory key is `<root>/<path>`; the bare key form is accepted as well.

use std::fmt;
use std::str::FromStr;
use strata_core::{Error, Result};

pub const URL_SCHEME: &str = "kzb://";

/// Parsed resource URL
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceUrl {
    root: String,
    path: String,
}

impl ResourceUrl {
    /// Parse `kzb://root/path` or `root/path`
    pub fn parse(url: &str) -> Result<Self> {
        let rest = match url.strip_prefix(URL_SCHEME) {
            Some(rest) => rest,
            None if url.contains("://") => {
                return Err(Error::InvalidUrl(format!("unsupported scheme in '{}'", url)))
            }
            None => url,
        };

        let rest = rest.trim_matches('/');
        let (root, path) = rest
            .split_once('/')
            .ok_or_else(|| Error::InvalidUrl(format!("'{}' has no path below its root", url)))?;

        if root.is_empty() || path.is_empty() {
            return Err(Error::InvalidUrl(format!("'{}' has an empty segment", url)));
        }
        if path.split('/').any(|segment| segment.is_empty() || segment == "..") {
            return Err(Error::InvalidUrl(format!("'{}' has an invalid segment", url)));
        }

        Ok(Self {
            root: root.to_string(),
            path: path.to_string(),
        })
    }

    /// Logical root (usually the project name)
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Path below the root
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Key in the binary directory
    pub fn directory_key(&self) -> String {
        format!("{}/{}", self.root, self.path)
    }

    /// URL of a sibling path under the same root
    pub fn join(&self, relative: &str) -> Result<Self> {
        Self::parse(&format!("{}/{}", self.root, relative))
    }
}

impl fmt::Display for ResourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", URL_SCHEME, self.root, self.path)
    }
}

impl FromStr for ResourceUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_url() {
        let url = ResourceUrl::parse("kzb://project/materials/foo").unwrap();
        assert_eq!(url.root(), "project");
        assert_eq!(url.path(), "materials/foo");
        assert_eq!(url.directory_key(), "project/materials/foo");
        assert_eq!(url.to_string(), "kzb://project/materials/foo");
    }

    #[test]
    fn test_bare_key_equals_url() {
        assert_eq!(
            ResourceUrl::parse("material/foo").unwrap(),
            "kzb://material/foo".parse::<ResourceUrl>().unwrap()
        );
    }

    #[test]
    fn test_rejects_bad_urls() {
        for bad in ["http://x/y", "kzb://", "kzb://rootonly", "kzb://a//b", "kzb://a/../b"] {
            assert!(
                matches!(ResourceUrl::parse(bad), Err(Error::InvalidUrl(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_join() {
        let url = ResourceUrl::parse("kzb://project/materials/foo").unwrap();
        assert_eq!(
            url.join("shaders/basic").unwrap().directory_key(),
            "project/shaders/basic"
        );
    }
}
