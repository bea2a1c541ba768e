//! Directory-tree archive.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::archive::{Archive, DataStream};
use crate::errors::{RelicError, Result, fail};

/// An [`Archive`] over a directory tree.
///
/// Entry names are `/`-separated paths relative to the root, regardless of
/// the host path separator.
pub struct FileSystemArchive {
    name: String,
    root: PathBuf,
}

impl FileSystemArchive {
    /// Creates an archive rooted at `path`. If `path` names a file, its
    /// parent directory becomes the root.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let root = if path.is_file() {
            path.parent().unwrap_or(Path::new(".")).to_path_buf()
        } else {
            path.to_path_buf()
        };
        Self {
            name: root.to_string_lossy().into_owned(),
            root,
        }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

}

fn walk(dir: &Path, prefix: &str, recursive: bool, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let relative = if prefix.is_empty() {
            file_name.to_string()
        } else {
            format!("{prefix}/{file_name}")
        };
        let path = entry.path();
        if path.is_dir() {
            if recursive {
                walk(&path, &relative, recursive, out);
            }
        } else {
            out.push(relative);
        }
    }
}

impl Archive for FileSystemArchive {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, filename: &str) -> Result<DataStream> {
        let path = self.root.join(filename);
        if !path.is_file() {
            return fail(RelicError::FileNotFound(format!(
                "'{filename}' in archive '{}'",
                self.name
            )));
        }
        let file = File::open(path)?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn list(&self, recursive: bool) -> Vec<String> {
        let mut out = Vec::new();
        walk(&self.root, "", recursive, &mut out);
        out.sort();
        out
    }

    fn exists(&self, filename: &str) -> bool {
        self.root.join(filename).is_file()
    }
}
