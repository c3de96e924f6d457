//! Read access to the local package store.
//!
//! Unpacked packages live under a fixed directory layout:
//!
//! ```text
//! <store root>/
//!   elm/
//!     core/
//!       1.0.5/
//!         elm.json
//!         src/...
//! ```
//!
//! The store is read-only from this crate's point of view; nothing here
//! downloads or installs anything. Version listings and their manifests are
//! cached per package name for the lifetime of the store, so repeated
//! resolver queries never touch the disk twice for the same package.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::warn;

use crate::manifest::{PackageManifest, ProjectManifest, MANIFEST_FILE, SOURCE_DIR};
use crate::version::{Constraint, Version};

/// Compiler release whose package tree is read.
const COMPILER_DIR: &str = "0.19.1";
/// Subdirectory of the Elm home that holds unpacked packages.
const PACKAGES_DIR: &str = "packages";

#[derive(Debug, Error)]
pub enum StoreError {
    /// The package has no directory in the store at all.
    #[error("package `{name}` is not present in the local package store at {root}")]
    PackageNotFound { name: String, root: PathBuf },
    /// The package exists, but not at the requested version.
    #[error("version {version} of `{name}` is not present in the local package store")]
    MissingVersion { name: String, version: Version },
    #[error("failed to read package store entry {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One version of a package present in the store.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    pub name: String,
    pub version: Version,
    pub manifest: Arc<PackageManifest>,
}

impl PackageVersion {
    /// The dependency constraints this version declares.
    #[must_use]
    pub fn dependencies(&self) -> &BTreeMap<String, Constraint> {
        &self.manifest.dependencies
    }
}

/// Cached read access to one package store root.
pub struct PackageStore {
    root: PathBuf,
    cache: Mutex<HashMap<String, Arc<Vec<PackageVersion>>>>,
}

impl PackageStore {
    /// Opens the store rooted at `root`. The directory does not have to
    /// exist; lookups against a missing root report packages as not found.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Locates the store of the ambient Elm installation: `$ELM_HOME` if
    /// set, otherwise the platform's conventional home directory, plus the
    /// compiler's package subtree.
    #[must_use]
    pub fn discover() -> Option<Self> {
        let home = elm_home()?;
        Some(Self::new(home.join(COMPILER_DIR).join(PACKAGES_DIR)))
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory that holds all versions of `name`.
    #[must_use]
    pub fn package_dir(&self, name: &str) -> PathBuf {
        match name.split_once('/') {
            Some((author, project)) => self.root.join(author).join(project),
            None => self.root.join(name),
        }
    }

    /// Directory of one exact package version.
    #[must_use]
    pub fn package_root(&self, name: &str, version: Version) -> PathBuf {
        self.package_dir(name).join(version.to_string())
    }

    /// Source directory of one exact package version.
    #[must_use]
    pub fn source_dir(&self, name: &str, version: Version) -> PathBuf {
        self.package_root(name, version).join(SOURCE_DIR)
    }

    /// All versions of `name` present in the store, in no particular order.
    ///
    /// The first call scans the disk; later calls are served from memory.
    pub fn versions(&self, name: &str) -> Result<Arc<Vec<PackageVersion>>, StoreError> {
        {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(hit) = cache.get(name) {
                return Ok(Arc::clone(hit));
            }
        }
        let loaded = Arc::new(self.scan_versions(name)?);
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = cache.entry(name.to_string()).or_insert(loaded);
        Ok(Arc::clone(entry))
    }

    /// The manifest of one exact package version.
    pub fn manifest(
        &self,
        name: &str,
        version: Version,
    ) -> Result<Arc<PackageManifest>, StoreError> {
        let versions = self.versions(name)?;
        versions
            .iter()
            .find(|candidate| candidate.version == version)
            .map(|candidate| Arc::clone(&candidate.manifest))
            .ok_or_else(|| StoreError::MissingVersion {
                name: name.to_string(),
                version,
            })
    }

    fn scan_versions(&self, name: &str) -> Result<Vec<PackageVersion>, StoreError> {
        let dir = self.package_dir(name);
        if !dir.is_dir() {
            return Err(StoreError::PackageNotFound {
                name: name.to_string(),
                root: self.root.clone(),
            });
        }
        let entries = fs::read_dir(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: dir.clone(),
                source,
            })?;
            // entries that are not version directories (registry files and
            // the like) are simply ignored
            let Some(version) = entry
                .file_name()
                .to_str()
                .and_then(|text| text.parse::<Version>().ok())
            else {
                continue;
            };
            let manifest_path = entry.path().join(MANIFEST_FILE);
            match ProjectManifest::from_path(&manifest_path) {
                Ok(ProjectManifest::Package(manifest)) => versions.push(PackageVersion {
                    name: name.to_string(),
                    version,
                    manifest: Arc::new(manifest),
                }),
                Ok(ProjectManifest::Application(_)) => {
                    warn!(
                        path = %manifest_path.display(),
                        "store entry has an application manifest; ignoring it"
                    );
                }
                Err(error) => {
                    warn!(
                        path = %manifest_path.display(),
                        %error,
                        "store entry has an unreadable manifest; ignoring it"
                    );
                }
            }
        }
        Ok(versions)
    }
}

fn elm_home() -> Option<PathBuf> {
    if let Some(home) = std::env::var_os("ELM_HOME") {
        return Some(PathBuf::from(home));
    }
    #[cfg(windows)]
    return std::env::var_os("APPDATA").map(|base| PathBuf::from(base).join("elm"));
    #[cfg(not(windows))]
    std::env::var_os("HOME").map(|base| PathBuf::from(base).join(".elm"))
}
