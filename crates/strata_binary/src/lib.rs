//! # strata_binary - Binary Containers
//!
//! Reads `.kzb` containers and merges them into one directory of paths:
//! - **Format**: fixed header, payload chunks, checksummed index
//! - **Sources**: in-memory, memory-mapped, or streamed from disk
//! - **Directory**: last merge wins, so later binaries patch earlier ones
//! - **Config**: plain-text list of binaries to merge in order
//! - **URLs**: `kzb://<root>/<path>` resource addresses
//!
//! ## Example
//!
//! ```ignore
//! use strata_binary::prelude::*;
//!
//! let mut directory = BinaryDirectory::new();
//! directory.merge(BinarySource::open("base.kzb", SourceMode::Mapped)?);
//! directory.merge(BinarySource::open("patch.kzb", SourceMode::Mapped)?);
//!
//! let bytes = directory.read_entry("material/foo")?;
//! ```

pub mod config;
pub mod directory;
pub mod format;
pub mod source;
pub mod url;
pub mod writer;

pub use config::BinaryConfig;
pub use directory::{BinaryDirectory, BinaryFileInfo, MergeReport, SourceId};
pub use format::{ContainerHeader, IndexEntry, FORMAT_VERSION, HEADER_SIZE, MAGIC};
pub use source::{BinarySource, EntryData, SourceMode};
pub use url::{ResourceUrl, URL_SCHEME};
pub use writer::BinaryWriter;

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::config::BinaryConfig;
    pub use crate::directory::{BinaryDirectory, BinaryFileInfo};
    pub use crate::source::{BinarySource, EntryData, SourceMode};
    pub use crate::url::ResourceUrl;
    pub use crate::writer::BinaryWriter;
}
