//! Module discovery and visibility.
//!
//! Filling the module tables of a [`ProjectGraph`] happens in stages:
//!
//! 1. [`discover`] walks every project's source directories and records
//!    which module each file defines, without touching the graph.
//! 2. [`apply`] installs each project's own modules.
//! 3. [`propagate`] copies the exposed modules of each direct dependency
//!    into the consuming project's table.
//!
//! Propagation reads only from the discovery snapshot, never from tables
//! that were already augmented. A package that exposes a module it does
//! not define therefore cannot relay a module belonging to one of its own
//! dependencies.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::host::Host;
use crate::project::{ProjectGraph, ProjectId};

/// One source file found during discovery.
#[derive(Debug, Clone)]
pub struct ModuleFile {
    pub project: ProjectId,
    /// Module name derived from the path relative to its source directory.
    pub module: String,
    pub path: PathBuf,
    /// Whether the file belongs to the root project and may be edited.
    pub writable: bool,
    /// Owning package name, `None` for application files.
    pub qualifier: Option<String>,
}

/// Read-only result of the discovery pass.
#[derive(Debug, Default)]
pub struct DiscoveredModules {
    files: Vec<ModuleFile>,
}

impl DiscoveredModules {
    #[must_use]
    pub fn files(&self) -> &[ModuleFile] {
        &self.files
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Walks every project's source and test directories and derives module
/// names from file paths. The graph is not touched.
///
/// Missing directories are skipped quietly; an application is allowed to
/// list a source directory it has not created yet.
pub fn discover(graph: &ProjectGraph, host: &dyn Host) -> DiscoveredModules {
    let mut files = Vec::new();
    for (id, project) in graph.iter() {
        let writable = id == graph.root();
        let qualifier = project.package_name().map(str::to_string);
        for dir in project.source_dirs.iter().chain(project.test_dirs.iter()) {
            let listed = match host.source_files(dir) {
                Ok(listed) => listed,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!(dir = %dir.display(), "source directory does not exist, skipping");
                    continue;
                }
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "failed to list source directory");
                    continue;
                }
            };
            for path in listed {
                if let Some(module) = module_name_for(dir, &path) {
                    files.push(ModuleFile {
                        project: id,
                        module,
                        path,
                        writable,
                        qualifier: qualifier.clone(),
                    });
                } else {
                    debug!(path = %path.display(), "path does not form a module name, skipping");
                }
            }
        }
    }
    debug!(files = files.len(), "module discovery finished");
    DiscoveredModules { files }
}

/// Derives the dotted module name for `path` relative to `dir`, so
/// `src/Page/Home.elm` becomes `Page.Home`.
fn module_name_for(dir: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(dir).ok()?;
    let stem = relative.with_extension("");
    let mut segments = Vec::new();
    for component in stem.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_str()?),
            _ => return None,
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("."))
}

/// Installs each project's own modules into the graph. When two files
/// claim the same module name, the first one discovered keeps it.
pub fn apply(snapshot: &DiscoveredModules, graph: &mut ProjectGraph) {
    for file in &snapshot.files {
        let project = graph.project_mut(file.project);
        match project.modules.entry(file.module.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(file.path.clone());
            }
            Entry::Occupied(entry) => {
                if *entry.get() != file.path {
                    warn!(
                        module = %file.module,
                        kept = %entry.get().display(),
                        ignored = %file.path.display(),
                        "module is defined in more than one file"
                    );
                }
            }
        }
    }
}

/// Copies the exposed modules of every project's direct dependencies into
/// that project's table. Test dependency edges count only for the root.
/// A module the consumer already defines is never overwritten.
pub fn propagate(snapshot: &DiscoveredModules, graph: &mut ProjectGraph) {
    let mut own: HashMap<ProjectId, BTreeMap<&str, &Path>> = HashMap::new();
    for file in &snapshot.files {
        own.entry(file.project)
            .or_default()
            .entry(file.module.as_str())
            .or_insert(file.path.as_path());
    }

    let mut pending = vec![graph.root()];
    let mut visited = HashSet::new();
    while let Some(id) = pending.pop() {
        if !visited.insert(id) {
            continue;
        }
        let consumer = &graph[id];
        let mut edges: Vec<ProjectId> = consumer.dependencies.values().copied().collect();
        if id == graph.root() {
            edges.extend(consumer.test_dependencies.values().copied());
        }

        let mut additions: Vec<(String, PathBuf)> = Vec::new();
        for dep_id in &edges {
            let dep = &graph[*dep_id];
            let Some(exposed) = dep.exposed() else { continue };
            let dep_own = own.get(dep_id);
            for module in exposed {
                match dep_own.and_then(|table| table.get(module.as_str())) {
                    Some(path) => additions.push((module.clone(), (*path).to_path_buf())),
                    None => warn!(
                        package = %dep.kind.label(),
                        module = %module,
                        "exposed module has no source file"
                    ),
                }
            }
        }

        let consumer = graph.project_mut(id);
        for (module, path) in additions {
            consumer.modules.entry(module).or_insert(path);
        }
        pending.extend(edges);
    }
}
