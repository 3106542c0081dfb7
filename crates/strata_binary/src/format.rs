//! Container layout
//!
//! All integers are little-endian.
//!
//! ```text
//! header (32 bytes)
//!   magic        [u8; 4]  "KZB1"
//!   version      u32
//!   flags        u32
//!   entry_count  u32
//!   index_offset u64
//!   index_length u32
//!   index_crc32  u32
//! payload chunks
//! index (entry_count records)
//!   path_len u16 | path | type_len u8 | type | offset u64 | length u64 | crc32 u32
//! ```

use std::io::{self, Read, Write};
use strata_core::{Error, Result, TypeTag};

pub const MAGIC: [u8; 4] = *b"KZB1";
pub const FORMAT_VERSION: u32 = 1;
pub const HEADER_SIZE: usize = 32;

/// Smallest possible index record: a one-byte path and an empty type name
pub const MIN_RECORD_LEN: usize = 2 + 1 + 1 + 8 + 8 + 4;

/// Parsed container header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContainerHeader {
    pub version: u32,
    pub flags: u32,
    pub entry_count: u32,
    pub index_offset: u64,
    pub index_length: u32,
    pub index_crc: u32,
}

/// One index record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub path: String,
    pub resource_type: TypeTag,
    pub offset: u64,
    pub length: u64,
    pub checksum: u32,
}

/// Map a short read onto `Truncated`, keep every other I/O failure
pub(crate) fn short_read(err: io::Error, context: &str, offset: u64, needed: u64, available: u64) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::Truncated {
            context: context.to_string(),
            offset,
            needed,
            available,
        }
    } else {
        Error::Io(err)
    }
}

fn read_exact_array<const N: usize, R: Read>(reader: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    Ok(read_exact_array::<1, _>(reader)?[0])
}

fn read_u16<R: Read>(reader: &mut R) -> io::Result<u16> {
    Ok(u16::from_le_bytes(read_exact_array::<2, _>(reader)?))
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    Ok(u32::from_le_bytes(read_exact_array::<4, _>(reader)?))
}

fn read_u64<R: Read>(reader: &mut R) -> io::Result<u64> {
    Ok(u64::from_le_bytes(read_exact_array::<8, _>(reader)?))
}

fn read_string<R: Read>(reader: &mut R, len: usize, what: &str) -> Result<String> {
    let mut buf = vec![0u8; len];
    reader
        .read_exact(&mut buf)
        .map_err(|e| short_read(e, what, 0, len as u64, 0))?;
    String::from_utf8(buf)
        .map_err(|_| Error::MalformedContainer(format!("{} is not valid UTF-8", what)))
}

impl ContainerHeader {
    /// Parse the fixed header. `bytes` must hold at least `HEADER_SIZE` bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::Truncated {
                context: "container header".into(),
                offset: 0,
                needed: HEADER_SIZE as u64,
                available: bytes.len() as u64,
            });
        }

        let mut reader = &bytes[..HEADER_SIZE];
        let header_err = |e: io::Error| short_read(e, "container header", 0, HEADER_SIZE as u64, bytes.len() as u64);

        let magic = read_exact_array::<4, _>(&mut reader).map_err(header_err)?;
        if magic != MAGIC {
            return Err(Error::MalformedContainer(format!(
                "bad magic {:02x?}, expected {:02x?}",
                magic, MAGIC
            )));
        }

        let header = Self {
            version: read_u32(&mut reader).map_err(header_err)?,
            flags: read_u32(&mut reader).map_err(header_err)?,
            entry_count: read_u32(&mut reader).map_err(header_err)?,
            index_offset: read_u64(&mut reader).map_err(header_err)?,
            index_length: read_u32(&mut reader).map_err(header_err)?,
            index_crc: read_u32(&mut reader).map_err(header_err)?,
        };

        if header.version != FORMAT_VERSION {
            return Err(Error::MalformedContainer(format!(
                "unsupported version {}",
                header.version
            )));
        }
        Ok(header)
    }

    /// Serialize to exactly `HEADER_SIZE` bytes
    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&MAGIC)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&self.flags.to_le_bytes())?;
        writer.write_all(&self.entry_count.to_le_bytes())?;
        writer.write_all(&self.index_offset.to_le_bytes())?;
        writer.write_all(&self.index_length.to_le_bytes())?;
        writer.write_all(&self.index_crc.to_le_bytes())?;
        Ok(())
    }

    /// Byte range of the index within the container
    pub fn index_range(&self) -> Result<(u64, u64)> {
        let end = self
            .index_offset
            .checked_add(self.index_length as u64)
            .ok_or_else(|| {
                Error::MalformedContainer(format!(
                    "index at {:#x} with length {} overflows the address space",
                    self.index_offset, self.index_length
                ))
            })?;
        Ok((self.index_offset, end))
    }

    /// Index range checked against the container length
    pub(crate) fn index_range_within(&self, total_len: u64) -> Result<(u64, u64)> {
        let (start, end) = self.index_range()?;
        if end > total_len {
            return Err(Error::Truncated {
                context: "container index".into(),
                offset: start,
                needed: self.index_length as u64,
                available: total_len.saturating_sub(start),
            });
        }
        Ok((start, end))
    }
}

/// Verify the index checksum and parse every record
pub fn parse_index(header: &ContainerHeader, index: &[u8]) -> Result<Vec<IndexEntry>> {
    let crc = crc32fast::hash(index);
    if crc != header.index_crc {
        return Err(Error::MalformedContainer(format!(
            "index checksum mismatch: stored {:#010x}, computed {:#010x}",
            header.index_crc, crc
        )));
    }

    let total = index.len() as u64;
    let needed = header.entry_count as u64 * MIN_RECORD_LEN as u64;
    if needed > total {
        return Err(Error::Truncated {
            context: format!("index of {} records", header.entry_count),
            offset: header.index_offset,
            needed,
            available: total,
        });
    }

    let mut reader = index;
    let mut entries = Vec::with_capacity(header.entry_count as usize);

    for n in 0..header.entry_count {
        let consumed = total - reader.len() as u64;
        let record_err = |e: io::Error| short_read(e, "index record", header.index_offset + consumed, 1, total - consumed);

        let path_len = read_u16(&mut reader).map_err(record_err)? as usize;
        let path = read_string(&mut reader, path_len, "entry path")?;
        let type_len = read_u8(&mut reader).map_err(record_err)? as usize;
        let resource_type = read_string(&mut reader, type_len, "entry type")?;
        let offset = read_u64(&mut reader).map_err(record_err)?;
        let length = read_u64(&mut reader).map_err(record_err)?;
        let checksum = read_u32(&mut reader).map_err(record_err)?;

        if path.is_empty() {
            return Err(Error::MalformedContainer(format!("index record {} has an empty path", n)));
        }

        entries.push(IndexEntry {
            path,
            resource_type: TypeTag::new(resource_type),
            offset,
            length,
            checksum,
        });
    }

    Ok(entries)
}

/// Serialize one index record
pub fn write_index_entry<W: Write>(writer: &mut W, entry: &IndexEntry) -> io::Result<()> {
    let path = entry.path.as_bytes();
    let kind = entry.resource_type.name().as_bytes();
    if path.len() > u16::MAX as usize {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "entry path is too long"));
    }
    if kind.len() > u8::MAX as usize {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "entry type name is too long"));
    }

    writer.write_all(&(path.len() as u16).to_le_bytes())?;
    writer.write_all(path)?;
    writer.write_all(&[kind.len() as u8])?;
    writer.write_all(kind)?;
    writer.write_all(&entry.offset.to_le_bytes())?;
    writer.write_all(&entry.length.to_le_bytes())?;
    writer.write_all(&entry.checksum.to_le_bytes())?;
    Ok(())
}

/// Check that every entry lies inside the payload area
pub(crate) fn check_bounds(header: &ContainerHeader, entries: &[IndexEntry], total_len: u64) -> Result<()> {
    header.index_range_within(total_len)?;

    for entry in entries {
        let end = entry.offset.checked_add(entry.length).ok_or_else(|| {
            Error::MalformedContainer(format!("entry '{}' overflows the address space", entry.path))
        })?;
        if entry.offset < HEADER_SIZE as u64 {
            return Err(Error::MalformedContainer(format!(
                "entry '{}' overlaps the header",
                entry.path
            )));
        }
        if end > total_len {
            return Err(Error::Truncated {
                context: format!("entry '{}'", entry.path),
                offset: entry.offset,
                needed: entry.length,
                available: total_len.saturating_sub(entry.offset),
            });
        }
    }
    Ok(())
}
