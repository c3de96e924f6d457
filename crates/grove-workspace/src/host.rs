//! Filesystem access behind a trait so project loading can be driven by
//! the real disk in production and by fixture directories in tests.

use std::io;
use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use walkdir::WalkDir;

use grove_pkg::SOURCE_EXT;

/// Read access to the machine hosting the workspace.
///
/// Manifest reads are synchronous because they happen once per load and
/// gate everything after them. Source reads return futures so many files
/// can be in flight at once.
pub trait Host: Send + Sync {
    /// Reads a manifest file to a string.
    fn read_manifest(&self, path: &Path) -> io::Result<String>;

    /// Reads one source file to a string.
    fn read_source(&self, path: &Path) -> BoxFuture<'static, io::Result<String>>;

    /// Lists every Elm source file under `dir`, recursively, in a
    /// deterministic order.
    fn source_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;
}

/// [`Host`] backed by the operating system's filesystem.
pub struct OsHost;

impl Host for OsHost {
    fn read_manifest(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn read_source(&self, path: &Path) -> BoxFuture<'static, io::Result<String>> {
        let path = path.to_path_buf();
        async move { tokio::fs::read_to_string(path).await }.boxed()
    }

    fn source_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.into_path();
            if path.extension().is_some_and(|ext| ext == SOURCE_EXT) {
                files.push(path);
            }
        }
        Ok(files)
    }
}
