//! Container writer

use crate::format::{write_index_entry, ContainerHeader, IndexEntry, FORMAT_VERSION, HEADER_SIZE};
use std::path::Path;
use strata_core::{Result, TypeTag};

/// Builds a container in memory
#[derive(Default)]
pub struct BinaryWriter {
    entries: Vec<(String, TypeTag, Vec<u8>)>,
    flags: u32,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set header flags
    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Add an entry; adding the same path again replaces it
    pub fn add(&mut self, path: impl Into<String>, resource_type: TypeTag, bytes: Vec<u8>) -> &mut Self {
        let path = path.into();
        match self.entries.iter_mut().find(|(existing, _, _)| *existing == path) {
            Some(slot) => *slot = (path, resource_type, bytes),
            None => self.entries.push((path, resource_type, bytes)),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Produce the container bytes
    pub fn finish(&self) -> Vec<u8> {
        let mut out = vec![0u8; HEADER_SIZE];
        let mut index = Vec::new();
        let mut written = 0u32;

        for (path, resource_type, bytes) in &self.entries {
            let entry = IndexEntry {
                path: path.clone(),
                resource_type: resource_type.clone(),
                offset: out.len() as u64,
                length: bytes.len() as u64,
                checksum: crc32fast::hash(bytes),
            };
            match write_index_entry(&mut index, &entry) {
                Ok(()) => {
                    out.extend_from_slice(bytes);
                    written += 1;
                }
                Err(err) => log::error!("Skipping entry '{}': {}", path, err),
            }
        }

        let header = ContainerHeader {
            version: FORMAT_VERSION,
            flags: self.flags,
            entry_count: written,
            index_offset: out.len() as u64,
            index_length: index.len() as u32,
            index_crc: crc32fast::hash(&index),
        };
        out.extend_from_slice(&index);

        let mut head = Vec::with_capacity(HEADER_SIZE);
        if header.write(&mut head).is_ok() {
            out[..HEADER_SIZE].copy_from_slice(&head);
        }
        out
    }

    /// Write the container to a file
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.finish())?;
        Ok(())
    }
}
