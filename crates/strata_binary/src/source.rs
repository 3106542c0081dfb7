//! Binary sources
//!
//! A source is one opened container. In-memory and memory-mapped sources hand
//! out zero-copy `EntryData` views that keep the backing storage alive; a
//! streamed source seeks and reads each entry into an owned buffer.

use crate::format::{check_bounds, parse_index, short_read, ContainerHeader, IndexEntry, HEADER_SIZE};
use memmap2::Mmap;
use parking_lot::Mutex;
use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;
use strata_core::{Error, Result};

/// How a container file is accessed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Memory-map the file
    #[default]
    Mapped,
    /// Keep the file open and read entries on demand
    Streamed,
    /// Read the whole file into memory
    Memory,
}

#[derive(Clone)]
enum SharedBytes {
    Memory(Arc<[u8]>),
    Mapped(Arc<Mmap>),
}

impl Deref for SharedBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Memory(bytes) => bytes,
            Self::Mapped(map) => map,
        }
    }
}

enum Storage {
    Shared(SharedBytes),
    Streamed { file: Mutex<File>, len: u64 },
}

/// Bytes of one entry
pub struct EntryData {
    repr: EntryRepr,
}

enum EntryRepr {
    Owned(Vec<u8>),
    View {
        bytes: SharedBytes,
        start: usize,
        end: usize,
    },
}

impl EntryData {
    /// Whether the bytes borrow the source's storage instead of a copy
    pub fn is_zero_copy(&self) -> bool {
        matches!(self.repr, EntryRepr::View { .. })
    }
}

impl Deref for EntryData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match &self.repr {
            EntryRepr::Owned(bytes) => bytes,
            EntryRepr::View { bytes, start, end } => &bytes[*start..*end],
        }
    }
}

impl AsRef<[u8]> for EntryData {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl fmt::Debug for EntryData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryData")
            .field("len", &self.len())
            .field("zero_copy", &self.is_zero_copy())
            .finish()
    }
}

/// One opened container
pub struct BinarySource {
    name: String,
    header: ContainerHeader,
    entries: Vec<IndexEntry>,
    storage: Storage,
}

impl BinarySource {
    /// Open a container held in memory
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        Self::from_shared(name.into(), SharedBytes::Memory(bytes.into()))
    }

    /// Memory-map a container file
    pub fn map_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and containers are not modified while mounted
        let map = unsafe { Mmap::map(&file)? };
        Self::from_shared(display_name(path), SharedBytes::Mapped(Arc::new(map)))
    }

    /// Open a container file for on-demand reads
    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();

        let mut header_bytes = [0u8; HEADER_SIZE];
        file.read_exact(&mut header_bytes)
            .map_err(|e| short_read(e, "container header", 0, HEADER_SIZE as u64, len))?;
        let header = ContainerHeader::parse(&header_bytes)?;

        let (index_start, _) = header.index_range_within(len)?;
        let mut index = vec![0u8; header.index_length as usize];
        file.seek(SeekFrom::Start(index_start))?;
        file.read_exact(&mut index)
            .map_err(|e| short_read(e, "container index", index_start, index.len() as u64, len))?;

        let entries = parse_index(&header, &index)?;
        check_bounds(&header, &entries, len)?;

        Ok(Self {
            name: display_name(path),
            header,
            entries,
            storage: Storage::Streamed {
                file: Mutex::new(file),
                len,
            },
        })
    }

    /// Open a container file the given way
    pub fn open(path: impl AsRef<Path>, mode: SourceMode) -> Result<Self> {
        let path = path.as_ref();
        match mode {
            SourceMode::Mapped => Self::map_file(path),
            SourceMode::Streamed => Self::open_file(path),
            SourceMode::Memory => {
                let bytes = std::fs::read(path)?;
                Self::from_bytes(display_name(path), bytes)
            }
        }
    }

    fn from_shared(name: String, bytes: SharedBytes) -> Result<Self> {
        let header = ContainerHeader::parse(&bytes)?;
        let total = bytes.len() as u64;
        let (index_start, index_end) = header.index_range_within(total)?;

        let entries = parse_index(&header, &bytes[index_start as usize..index_end as usize])?;
        check_bounds(&header, &entries, total)?;

        Ok(Self {
            name,
            header,
            entries,
            storage: Storage::Shared(bytes),
        })
    }

    /// Display name (file name or the name given to `from_bytes`)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Index records in container order
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Index record for a path
    pub fn entry(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.iter().find(|entry| entry.path == path)
    }

    /// How this source reads its bytes
    pub fn mode(&self) -> SourceMode {
        match &self.storage {
            Storage::Shared(SharedBytes::Memory(_)) => SourceMode::Memory,
            Storage::Shared(SharedBytes::Mapped(_)) => SourceMode::Mapped,
            Storage::Streamed { .. } => SourceMode::Streamed,
        }
    }

    /// Read and verify one entry
    pub fn read(&self, entry: &IndexEntry) -> Result<EntryData> {
        let data = match &self.storage {
            Storage::Shared(bytes) => {
                let start = entry.offset as usize;
                let end = start + entry.length as usize;
                if end > bytes.len() {
                    return Err(Error::Truncated {
                        context: format!("entry '{}'", entry.path),
                        offset: entry.offset,
                        needed: entry.length,
                        available: (bytes.len() as u64).saturating_sub(entry.offset),
                    });
                }
                EntryData {
                    repr: EntryRepr::View {
                        bytes: bytes.clone(),
                        start,
                        end,
                    },
                }
            }
            Storage::Streamed { file, len } => {
                let mut buf = vec![0u8; entry.length as usize];
                let mut file = file.lock();
                file.seek(SeekFrom::Start(entry.offset))?;
                file.read_exact(&mut buf).map_err(|e| {
                    short_read(
                        e,
                        &format!("entry '{}'", entry.path),
                        entry.offset,
                        entry.length,
                        len.saturating_sub(entry.offset),
                    )
                })?;
                EntryData {
                    repr: EntryRepr::Owned(buf),
                }
            }
        };

        let crc = crc32fast::hash(&data);
        if crc != entry.checksum {
            return Err(Error::MalformedContainer(format!(
                "checksum mismatch for '{}' in {}",
                entry.path, self.name
            )));
        }
        Ok(data)
    }

    /// Read and verify the entry at `path`
    pub fn read_path(&self, path: &str) -> Result<EntryData> {
        let entry = self
            .entry(path)
            .ok_or_else(|| Error::NotFound(format!("{} in {}", path, self.name)))?;
        self.read(entry)
    }
}

impl fmt::Debug for BinarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinarySource")
            .field("name", &self.name)
            .field("mode", &self.mode())
            .field("entries", &self.entries.len())
            .finish()
    }
}

fn display_name(path: &Path) -> String {
    path.display().to_string()
}
