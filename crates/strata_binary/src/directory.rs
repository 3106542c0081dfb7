//! Binary directory
//!
//! Merges any number of sources into one path table. Merge order is the only
//! precedence rule: a path present in several sources resolves to the source
//! merged last, which is how patch binaries replace entries of a base binary.

use crate::config::BinaryConfig;
use crate::format::IndexEntry;
use crate::source::{BinarySource, EntryData, SourceMode};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use strata_core::{Error, Result, TypeTag};

/// Position of a source in merge order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceId(usize);

impl SourceId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Where a path currently resolves to
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryFileInfo {
    pub source: SourceId,
    pub path: String,
    pub resource_type: TypeTag,
    pub length: u64,
    entry: usize,
}

/// Outcome of one merge
#[derive(Clone, Debug, Default)]
pub struct MergeReport {
    pub source: Option<SourceId>,
    /// Paths new to the directory
    pub added: Vec<String>,
    /// Paths that now resolve to the merged source instead of an earlier one
    pub overridden: Vec<String>,
}

/// Merged path table over many sources
#[derive(Default)]
pub struct BinaryDirectory {
    sources: Vec<Arc<BinarySource>>,
    entries: BTreeMap<String, BinaryFileInfo>,
}

impl BinaryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open every binary listed in a config, merging in listed order
    pub fn from_config(config: &BinaryConfig, mode: SourceMode) -> Result<Self> {
        let mut directory = Self::new();
        for path in config.paths() {
            directory.merge(BinarySource::open(path, mode)?);
        }
        Ok(directory)
    }

    /// Merge a source; its paths replace any already present
    pub fn merge(&mut self, source: BinarySource) -> MergeReport {
        let id = SourceId(self.sources.len());
        let mut report = MergeReport {
            source: Some(id),
            ..MergeReport::default()
        };

        for (index, entry) in source.entries().iter().enumerate() {
            let info = BinaryFileInfo {
                source: id,
                path: entry.path.clone(),
                resource_type: entry.resource_type.clone(),
                length: entry.length,
                entry: index,
            };
            match self.entries.insert(entry.path.clone(), info) {
                Some(_) => report.overridden.push(entry.path.clone()),
                None => report.added.push(entry.path.clone()),
            }
        }

        log::info!(
            "Merged binary '{}': {} new paths, {} overridden",
            source.name(),
            report.added.len(),
            report.overridden.len()
        );
        self.sources.push(Arc::new(source));
        report
    }

    /// Where a path resolves to
    pub fn get(&self, path: &str) -> Option<&BinaryFileInfo> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    fn index_entry(&self, info: &BinaryFileInfo) -> Result<(&Arc<BinarySource>, &IndexEntry)> {
        let source = self
            .sources
            .get(info.source.0)
            .ok_or_else(|| Error::NotFound(format!("source #{}", info.source.0)))?;
        let entry = source
            .entries()
            .get(info.entry)
            .ok_or_else(|| Error::NotFound(info.path.clone()))?;
        Ok((source, entry))
    }

    /// Bytes of the winning entry for a path
    pub fn read_entry(&self, path: &str) -> Result<EntryData> {
        let info = self
            .entries
            .get(path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        let (source, entry) = self.index_entry(info)?;
        source.read(entry)
    }

    /// All paths in order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Paths beginning with `prefix`, in order
    pub fn paths_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(path, _)| path.as_str())
            .take_while(move |path| path.starts_with(prefix))
    }

    /// Number of distinct paths
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merged sources in merge order
    pub fn sources(&self) -> &[Arc<BinarySource>] {
        &self.sources
    }

    pub fn source(&self, id: SourceId) -> Option<&Arc<BinarySource>> {
        self.sources.get(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::BinaryWriter;

    fn source(name: &str, entries: &[(&str, &str, &str)]) -> BinarySource {
        let mut writer = BinaryWriter::new();
        for (path, kind, payload) in entries {
            writer.add(*path, TypeTag::new(*kind), payload.as_bytes().to_vec());
        }
        BinarySource::from_bytes(name, writer.finish()).unwrap()
    }

    #[test]
    fn test_last_merge_wins() {
        let mut directory = BinaryDirectory::new();
        directory.merge(source(
            "base.kzb",
            &[("material/foo", "Material", "base"), ("material/bar", "Material", "bar")],
        ));
        let report = directory.merge(source("patch.kzb", &[("material/foo", "Material", "patch")]));

        assert_eq!(report.overridden, vec!["material/foo".to_string()]);
        assert!(report.added.is_empty());
        assert_eq!(&*directory.read_entry("material/foo").unwrap(), b"patch");
        assert_eq!(&*directory.read_entry("material/bar").unwrap(), b"bar");
        assert_eq!(directory.get("material/foo").unwrap().source, SourceId(1));
        assert_eq!(directory.len(), 2);
    }

    #[test]
    fn test_read_missing() {
        let directory = BinaryDirectory::new();
        assert!(matches!(directory.read_entry("nope"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_prefix_listing() {
        let mut directory = BinaryDirectory::new();
        directory.merge(source(
            "a.kzb",
            &[
                ("project/materials/a", "Material", "1"),
                ("project/materials/b", "Material", "2"),
                ("project/meshes/c", "Mesh", "3"),
                ("projectx/materials/d", "Material", "4"),
            ],
        ));

        let materials: Vec<_> = directory.paths_with_prefix("project/materials/").collect();
        assert_eq!(materials, vec!["project/materials/a", "project/materials/b"]);
        assert_eq!(directory.paths().count(), 4);
    }

    #[test]
    fn test_type_follows_winning_source() {
        let mut directory = BinaryDirectory::new();
        directory.merge(source("a.kzb", &[("thing", "Text", "t")]));
        directory.merge(source("b.kzb", &[("thing", "Script", "s")]));
        assert_eq!(
            directory.get("thing").unwrap().resource_type,
            TypeTag::new("Script")
        );
    }
}
