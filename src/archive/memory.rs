//! In-memory archive.

use std::io::Cursor;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::archive::{Archive, DataStream};
use crate::errors::{RelicError, Result, fail};

/// An [`Archive`] backed by an in-memory map of name → bytes.
///
/// Entry names may contain `/` separators; everything after the last `/` is
/// treated as living in a "subdirectory" for the purposes of non-recursive
/// listing, matching the filesystem archive's behavior.
#[derive(Default)]
pub struct MemoryArchive {
    name: String,
    entries: FxHashMap<String, Arc<Vec<u8>>>,
}

impl MemoryArchive {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: FxHashMap::default(),
        }
    }

    /// Adds or replaces an entry.
    pub fn insert(&mut self, filename: &str, bytes: Vec<u8>) {
        self.entries.insert(filename.to_string(), Arc::new(bytes));
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, filename: &str, bytes: Vec<u8>) -> Self {
        self.insert(filename, bytes);
        self
    }
}

impl Archive for MemoryArchive {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, filename: &str) -> Result<DataStream> {
        match self.entries.get(filename) {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes.as_ref().clone()))),
            None => fail(RelicError::FileNotFound(format!(
                "'{filename}' in archive '{}'",
                self.name
            ))),
        }
    }

    fn list(&self, recursive: bool) -> Vec<String> {
        let mut out: Vec<String> = self
            .entries
            .keys()
            .filter(|name| recursive || !name.contains('/'))
            .cloned()
            .collect();
        out.sort();
        out
    }

    fn exists(&self, filename: &str) -> bool {
        self.entries.contains_key(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_and_exists() {
        let archive = MemoryArchive::new("test").with("a.mesh", vec![1, 2, 3]);
        assert!(archive.exists("a.mesh"));
        assert!(!archive.exists("b.mesh"));
        assert!(archive.open("a.mesh").is_ok());
        assert!(archive.open("b.mesh").is_err());
    }

    #[test]
    fn nonrecursive_list_skips_subdirectories() {
        let archive = MemoryArchive::new("test")
            .with("top.mesh", vec![])
            .with("sub/deep.mesh", vec![]);
        assert_eq!(archive.list(false), vec!["top.mesh"]);
        assert_eq!(archive.list(true), vec!["sub/deep.mesh", "top.mesh"]);
    }

    #[test]
    fn find_filters_by_pattern() {
        let archive = MemoryArchive::new("test")
            .with("a.mesh", vec![])
            .with("a.material", vec![]);
        assert_eq!(archive.find("*.mesh", true), vec!["a.mesh"]);
    }
}
