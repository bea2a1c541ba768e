//! Archive Abstraction
//!
//! Searchable containers of named data streams:
//! - [`Archive`]: the trait the resource group manager indexes and opens
//!   resources through
//! - [`FileSystemArchive`]: a directory tree
//! - [`ZipArchive`]: a zip container
//! - [`MemoryArchive`]: an in-memory map, for tests and procedural content

pub mod filesystem;
pub mod memory;
pub mod zip;

pub use filesystem::FileSystemArchive;
pub use memory::MemoryArchive;
pub use zip::ZipArchive;

use std::io::{Read, Seek};

use crate::errors::Result;

/// Combined read + seek bound for resource streams.
///
/// The mesh reader rewinds by one chunk-header width when it meets a chunk it
/// does not recognize, so plain `Read` is not enough.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// An open resource stream.
pub type DataStream = Box<dyn ReadSeek>;

/// A searchable container of named data streams.
///
/// Names are `/`-separated relative paths. Implementations are read-only from
/// the pipeline's point of view; writing assets back is a tooling concern.
pub trait Archive {
    /// Identifying name of this location (path, URL, label).
    fn name(&self) -> &str;

    /// Opens a named entry for reading. Fails with `FileNotFound` if the
    /// entry does not exist.
    fn open(&self, filename: &str) -> Result<DataStream>;

    /// Lists every entry name, optionally descending into subdirectories.
    fn list(&self, recursive: bool) -> Vec<String>;

    /// Lists entry names matching a `*`-wildcard pattern.
    fn find(&self, pattern: &str, recursive: bool) -> Vec<String> {
        self.list(recursive)
            .into_iter()
            .filter(|name| pattern_match(name, pattern))
            .collect()
    }

    /// Whether a named entry exists.
    fn exists(&self, filename: &str) -> bool;
}

/// Matches a name against a pattern where `*` spans any run of characters.
///
/// Matching is case-sensitive and anchored at both ends.
#[must_use]
pub fn pattern_match(name: &str, pattern: &str) -> bool {
    fn match_inner(name: &[u8], pattern: &[u8]) -> bool {
        match pattern.split_first() {
            None => name.is_empty(),
            Some((b'*', rest)) => (0..=name.len()).any(|skip| match_inner(&name[skip..], rest)),
            Some((ch, rest)) => name.first() == Some(ch) && match_inner(&name[1..], rest),
        }
    }
    match_inner(name.as_bytes(), pattern.as_bytes())
}
