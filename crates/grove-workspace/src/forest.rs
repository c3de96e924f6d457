//! The forest: every parsed source file in the workspace, keyed by URI,
//! with a module name index that is rebuilt lazily.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use url::Url;

use crate::project::ProjectId;
use crate::tree::SourceTree;

/// One parsed file plus everything needed to answer queries about it.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub uri: Url,
    pub tree: SourceTree,
    /// Whether the file belongs to the root project and may be edited.
    pub writable: bool,
    pub project: ProjectId,
    /// Owning package name, `None` for application files.
    pub qualifier: Option<String>,
}

/// URI keyed cache of parsed source files.
///
/// Inserting or removing a file marks the module name index stale; lookups
/// by module name keep answering from the last synchronized state until
/// [`Forest::synchronize`] runs again.
#[derive(Debug, Default)]
pub struct Forest {
    files: HashMap<Url, SourceFile>,
    by_module: HashMap<String, Url>,
    index_stale: bool,
}

impl Forest {
    /// Inserts or replaces the file at `file.uri`.
    pub fn set_tree(&mut self, file: SourceFile) {
        self.files.insert(file.uri.clone(), file);
        self.index_stale = true;
    }

    #[must_use]
    pub fn by_uri(&self, uri: &Url) -> Option<&SourceFile> {
        self.files.get(uri)
    }

    /// Looks a file up by the module name its header declares, as of the
    /// last synchronize.
    #[must_use]
    pub fn by_module_name(&self, module: &str) -> Option<&SourceFile> {
        let uri = self.by_module.get(module)?;
        self.files.get(uri)
    }

    pub fn remove(&mut self, uri: &Url) -> Option<SourceFile> {
        let removed = self.files.remove(uri);
        if removed.is_some() {
            self.index_stale = true;
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.index_stale
    }

    /// Rebuilds the module name index from the headers of the current
    /// files. Does nothing when the index is already fresh.
    ///
    /// When two files declare the same module name, a writable file beats
    /// a read-only one, and ties go to the smaller URI so the outcome does
    /// not depend on map iteration order.
    pub fn synchronize(&mut self) {
        if !self.index_stale {
            return;
        }
        let mut chosen: HashMap<&str, &SourceFile> = HashMap::new();
        for file in self.files.values() {
            let Some(module) = file.tree.module_name() else {
                continue;
            };
            match chosen.entry(module) {
                Entry::Vacant(slot) => {
                    slot.insert(file);
                }
                Entry::Occupied(mut slot) => {
                    if !keeps_slot(slot.get(), file) {
                        slot.insert(file);
                    }
                }
            }
        }
        let mut by_module = HashMap::with_capacity(chosen.len());
        for (module, file) in chosen {
            by_module.insert(module.to_string(), file.uri.clone());
        }
        self.by_module = by_module;
        self.index_stale = false;
    }
}

/// Whether `existing` keeps its index slot against `candidate`.
fn keeps_slot(existing: &SourceFile, candidate: &SourceFile) -> bool {
    if existing.writable != candidate.writable {
        return existing.writable;
    }
    existing.uri.as_str() <= candidate.uri.as_str()
}
