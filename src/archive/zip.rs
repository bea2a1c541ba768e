//! Zip-container archive.

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use crate::archive::{Archive, DataStream};
use crate::errors::{RelicError, Result, fail};

/// An [`Archive`] over a zip container.
///
/// Entries are decompressed into memory on [`open`](Archive::open); the
/// chunk reader needs a seekable stream and zip entries are not.
pub struct ZipArchive {
    name: String,
    inner: RefCell<zip::ZipArchive<BufReader<File>>>,
}

impl ZipArchive {
    /// Opens a zip file as an archive.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let inner = zip::ZipArchive::new(BufReader::new(file))?;
        Ok(Self {
            name: path.to_string_lossy().into_owned(),
            inner: RefCell::new(inner),
        })
    }
}

impl Archive for ZipArchive {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, filename: &str) -> Result<DataStream> {
        let mut inner = self.inner.borrow_mut();
        let mut entry = match inner.by_name(filename) {
            Ok(entry) => entry,
            Err(zip::result::ZipError::FileNotFound) => {
                return fail(RelicError::FileNotFound(format!(
                    "'{filename}' in archive '{}'",
                    self.name
                )));
            }
            Err(err) => return fail(err.into()),
        };
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn list(&self, recursive: bool) -> Vec<String> {
        let inner = self.inner.borrow();
        let mut out: Vec<String> = inner
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .filter(|name| recursive || !name.contains('/'))
            .map(str::to_string)
            .collect();
        out.sort();
        out
    }

    fn exists(&self, filename: &str) -> bool {
        self.inner.borrow().index_for_name(filename).is_some()
    }
}
