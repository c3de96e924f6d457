//! Project graphs and how they are loaded.
//!
//! A workspace is one root project (the directory the editor opened) plus
//! every package it can reach through pinned or resolved dependencies.
//! Loading produces a [`ProjectGraph`]: an arena of [`Project`] values
//! addressed by [`ProjectId`], with dependency edges stored as ids. Each
//! `name@version` pair is loaded once per run and shared by every project
//! that depends on it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::ops::Index;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use grove_pkg::{
    ApplicationManifest, ManifestError, PackageManifest, PackageStore, ProjectManifest, Resolution,
    Resolver, SolveError, StoreError, Version, MANIFEST_FILE, SOURCE_DIR, TESTS_DIR,
};

use crate::host::Host;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid manifest at {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: ManifestError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Solve(#[from] SolveError),
    #[error("dependency `{name}` has no pinned version in the resolution")]
    UnpinnedDependency { name: String },
}

/// Index of a project in its [`ProjectGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProjectId(usize);

impl ProjectId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index)
    }
}

/// What kind of project an arena entry is.
#[derive(Debug, Clone)]
pub enum ProjectKind {
    /// The root application the editor opened.
    Application,
    /// A package, either the opened checkout or a store entry.
    Package {
        name: String,
        version: Version,
        /// Modules the package's manifest exposes to consumers.
        exposed: BTreeSet<String>,
    },
}

impl ProjectKind {
    /// A short human readable tag, for logs and listings.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Application => "application".to_string(),
            Self::Package { name, version, .. } => format!("{name}@{version}"),
        }
    }
}

/// One loaded project: the root or any package it depends on.
#[derive(Debug, Clone)]
pub struct Project {
    pub kind: ProjectKind,
    pub root_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub source_dirs: Vec<PathBuf>,
    /// Test directories. Only the root project has any.
    pub test_dirs: Vec<PathBuf>,
    pub dependencies: BTreeMap<String, ProjectId>,
    pub test_dependencies: BTreeMap<String, ProjectId>,
    /// Module name to defining file. Empty until module discovery runs.
    pub modules: BTreeMap<String, PathBuf>,
}

impl Project {
    #[must_use]
    pub fn is_application(&self) -> bool {
        matches!(self.kind, ProjectKind::Application)
    }

    #[must_use]
    pub fn package_name(&self) -> Option<&str> {
        match &self.kind {
            ProjectKind::Package { name, .. } => Some(name),
            ProjectKind::Application => None,
        }
    }

    /// Exposed module names, for packages. Applications expose nothing.
    #[must_use]
    pub fn exposed(&self) -> Option<&BTreeSet<String>> {
        match &self.kind {
            ProjectKind::Package { exposed, .. } => Some(exposed),
            ProjectKind::Application => None,
        }
    }
}

fn project_key(name: &str, version: Version) -> String {
    format!("{name}@{version}")
}

/// Arena of every project loaded for one workspace.
#[derive(Debug)]
pub struct ProjectGraph {
    projects: Vec<Project>,
    root: ProjectId,
    by_key: HashMap<String, ProjectId>,
    resolution: Resolution,
}

impl ProjectGraph {
    #[must_use]
    pub fn root(&self) -> ProjectId {
        self.root
    }

    #[must_use]
    pub fn root_project(&self) -> &Project {
        &self.projects[self.root.index()]
    }

    pub(crate) fn project_mut(&mut self, id: ProjectId) -> &mut Project {
        &mut self.projects[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.projects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Iterates all projects in arena order, root first.
    pub fn iter(&self) -> impl Iterator<Item = (ProjectId, &Project)> {
        self.projects
            .iter()
            .enumerate()
            .map(|(index, project)| (ProjectId(index), project))
    }

    /// Finds the arena entry for an exact package version.
    #[must_use]
    pub fn lookup(&self, name: &str, version: Version) -> Option<ProjectId> {
        self.by_key.get(&project_key(name, version)).copied()
    }

    /// The pinned or solved versions this graph was loaded against.
    #[must_use]
    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        projects: Vec<Project>,
        root: ProjectId,
        resolution: Resolution,
    ) -> Self {
        let by_key = projects
            .iter()
            .enumerate()
            .filter_map(|(index, project)| match &project.kind {
                ProjectKind::Package { name, version, .. } => {
                    Some((project_key(name, *version), ProjectId(index)))
                }
                ProjectKind::Application => None,
            })
            .collect();
        Self {
            projects,
            root,
            by_key,
            resolution,
        }
    }
}

impl Index<ProjectId> for ProjectGraph {
    type Output = Project;

    fn index(&self, id: ProjectId) -> &Project {
        &self.projects[id.index()]
    }
}

/// Accumulates projects while a load is in progress. The key map makes
/// `name@version` loading idempotent within one run.
struct GraphBuilder {
    projects: Vec<Project>,
    by_key: HashMap<String, ProjectId>,
}

impl GraphBuilder {
    fn new() -> Self {
        Self {
            projects: Vec::new(),
            by_key: HashMap::new(),
        }
    }

    fn push(&mut self, project: Project) -> ProjectId {
        let id = ProjectId(self.projects.len());
        self.projects.push(project);
        id
    }

    fn finish(self, root: ProjectId, resolution: Resolution) -> ProjectGraph {
        ProjectGraph {
            projects: self.projects,
            root,
            by_key: self.by_key,
            resolution,
        }
    }
}

/// Loads a root project and its dependency closure into a graph.
pub struct ProjectLoader {
    store: Arc<PackageStore>,
    host: Arc<dyn Host>,
}

impl ProjectLoader {
    #[must_use]
    pub fn new(store: Arc<PackageStore>, host: Arc<dyn Host>) -> Self {
        Self { store, host }
    }

    /// Reads the manifest at `root_dir` and loads the whole graph.
    ///
    /// Applications use their pinned versions verbatim. Package checkouts
    /// have ranges instead of pins, so their dependency and
    /// test-dependency constraints are solved against the store first.
    pub fn load_root(&self, root_dir: &Path) -> Result<ProjectGraph, LoadError> {
        let manifest_path = root_dir.join(MANIFEST_FILE);
        let text = self
            .host
            .read_manifest(&manifest_path)
            .map_err(|source| LoadError::Io {
                path: manifest_path.clone(),
                source,
            })?;
        let manifest =
            ProjectManifest::parse(&text).map_err(|source| LoadError::Manifest {
                path: manifest_path.clone(),
                source,
            })?;
        match manifest {
            ProjectManifest::Application(app) => {
                self.load_application(root_dir, manifest_path, &app)
            }
            ProjectManifest::Package(pkg) => self.load_package_root(root_dir, manifest_path, &pkg),
        }
    }

    fn load_application(
        &self,
        root_dir: &Path,
        manifest_path: PathBuf,
        app: &ApplicationManifest,
    ) -> Result<ProjectGraph, LoadError> {
        let resolution: Resolution = app
            .dependencies
            .iter()
            .chain(app.test_dependencies.iter())
            .map(|(name, version)| (name.clone(), *version))
            .collect();

        let mut builder = GraphBuilder::new();
        let root_id = builder.push(Project {
            kind: ProjectKind::Application,
            root_dir: root_dir.to_path_buf(),
            manifest_path,
            source_dirs: app
                .source_directories
                .iter()
                .map(|dir| root_dir.join(dir))
                .collect(),
            test_dirs: vec![root_dir.join(TESTS_DIR)],
            dependencies: BTreeMap::new(),
            test_dependencies: BTreeMap::new(),
            modules: BTreeMap::new(),
        });

        // Only direct dependencies become edges of the root. Indirect pins
        // are reached through the packages that declare them.
        let mut dependencies = BTreeMap::new();
        for name in app.dependencies.direct.keys() {
            let id = self.load_package(name, &resolution, &mut builder)?;
            dependencies.insert(name.clone(), id);
        }
        let mut test_dependencies = BTreeMap::new();
        for name in app.test_dependencies.direct.keys() {
            let id = self.load_package(name, &resolution, &mut builder)?;
            test_dependencies.insert(name.clone(), id);
        }
        let root = &mut builder.projects[root_id.index()];
        root.dependencies = dependencies;
        root.test_dependencies = test_dependencies;

        Ok(builder.finish(root_id, resolution))
    }

    fn load_package_root(
        &self,
        root_dir: &Path,
        manifest_path: PathBuf,
        pkg: &PackageManifest,
    ) -> Result<ProjectGraph, LoadError> {
        let mut wanted = pkg.dependencies.clone();
        for (name, test_constraint) in &pkg.test_dependencies {
            let merged = match wanted.get(name).copied() {
                Some(main_constraint) => main_constraint.intersect(test_constraint).ok_or_else(
                    || SolveError::Unsatisfiable {
                        name: name.clone(),
                        demands: vec![
                            ("elm.json dependencies".to_string(), main_constraint),
                            ("elm.json test-dependencies".to_string(), *test_constraint),
                        ],
                    },
                )?,
                None => *test_constraint,
            };
            wanted.insert(name.clone(), merged);
        }
        let resolution = Resolver::new(&self.store).solve(&wanted)?;

        let mut builder = GraphBuilder::new();
        let root_id = builder.push(Project {
            kind: ProjectKind::Package {
                name: pkg.name.clone(),
                version: pkg.version,
                exposed: pkg.exposed_set(),
            },
            root_dir: root_dir.to_path_buf(),
            manifest_path,
            source_dirs: vec![root_dir.join(SOURCE_DIR)],
            test_dirs: vec![root_dir.join(TESTS_DIR)],
            dependencies: BTreeMap::new(),
            test_dependencies: BTreeMap::new(),
            modules: BTreeMap::new(),
        });
        builder
            .by_key
            .insert(project_key(&pkg.name, pkg.version), root_id);

        let mut dependencies = BTreeMap::new();
        for name in pkg.dependencies.keys() {
            let id = self.load_package(name, &resolution, &mut builder)?;
            dependencies.insert(name.clone(), id);
        }
        let mut test_dependencies = BTreeMap::new();
        for name in pkg.test_dependencies.keys() {
            let id = self.load_package(name, &resolution, &mut builder)?;
            test_dependencies.insert(name.clone(), id);
        }
        let root = &mut builder.projects[root_id.index()];
        root.dependencies = dependencies;
        root.test_dependencies = test_dependencies;

        Ok(builder.finish(root_id, resolution))
    }

    /// Loads one store package at its resolved version, reusing the arena
    /// entry when the same `name@version` was already loaded this run.
    fn load_package(
        &self,
        name: &str,
        resolution: &Resolution,
        builder: &mut GraphBuilder,
    ) -> Result<ProjectId, LoadError> {
        let Some(version) = resolution.get(name) else {
            return Err(LoadError::UnpinnedDependency {
                name: name.to_string(),
            });
        };
        let key = project_key(name, version);
        if let Some(id) = builder.by_key.get(&key) {
            return Ok(*id);
        }

        let manifest = self.store.manifest(name, version)?;
        let root_dir = self.store.package_root(name, version);
        let id = builder.push(Project {
            kind: ProjectKind::Package {
                name: name.to_string(),
                version,
                exposed: manifest.exposed_set(),
            },
            root_dir: root_dir.clone(),
            manifest_path: root_dir.join(MANIFEST_FILE),
            source_dirs: vec![root_dir.join(SOURCE_DIR)],
            test_dirs: Vec::new(),
            dependencies: BTreeMap::new(),
            test_dependencies: BTreeMap::new(),
            modules: BTreeMap::new(),
        });
        // Registered before recursing so a corrupt store with a dependency
        // cycle terminates instead of loading forever.
        builder.by_key.insert(key, id);

        let mut dependencies = BTreeMap::new();
        for (dep_name, constraint) in &manifest.dependencies {
            if let Some(pinned) = resolution.get(dep_name) {
                if !constraint.satisfies(&pinned) {
                    warn!(
                        package = %name,
                        dependency = %dep_name,
                        pinned = %pinned,
                        wanted = %constraint,
                        "pinned version is outside the declared constraint"
                    );
                }
            }
            let dep_id = self.load_package(dep_name, resolution, builder)?;
            dependencies.insert(dep_name.clone(), dep_id);
        }
        builder.projects[id.index()].dependencies = dependencies;
        Ok(id)
    }
}
