//! Binary config file
//!
//! A plain-text list of containers to merge, one path per line. Blank lines
//! and lines starting with `#` are ignored. Relative paths are resolved
//! against the directory holding the config file.

use std::path::{Path, PathBuf};
use strata_core::Result;

/// Ordered list of container paths
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BinaryConfig {
    paths: Vec<PathBuf>,
}

impl BinaryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse config text, resolving relative paths against `base_dir`
    pub fn parse(text: &str, base_dir: &Path) -> Self {
        let paths = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| {
                let path = Path::new(line);
                if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    base_dir.join(path)
                }
            })
            .collect();
        Self { paths }
    }

    /// Read and parse a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let config = Self::parse(&text, base);
        log::debug!("Binary config {} lists {} binaries", path.display(), config.paths.len());
        Ok(config)
    }

    /// Append a container path
    pub fn push(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    /// Container paths in merge order
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let text = "# base content\nbase.kzb\n\n   patches/patch.kzb  \n#old.kzb\n";
        let config = BinaryConfig::parse(text, Path::new("/data"));
        assert_eq!(
            config.paths(),
            &[PathBuf::from("/data/base.kzb"), PathBuf::from("/data/patches/patch.kzb")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_absolute_paths_kept() {
        let config = BinaryConfig::parse("/opt/app/base.kzb", Path::new("/data"));
        assert_eq!(config.paths(), &[PathBuf::from("/opt/app/base.kzb")]);
    }
}
