//! The workspace: one root project, its graph, its forest, its caches.
//!
//! State moves like this:
//!
//! ```text
//!           edit                     forest(synchronize: true)
//!   Clean --------> Dirty ----------------------------------> Clean
//!                             (briefly Synchronizing)
//! ```
//!
//! The clean-to-dirty transition clears edit-derived caches, and only
//! that transition does, so a burst of edits invalidates them exactly
//! once. The module name index catches up lazily when a consumer asks
//! for a synchronized forest. Reloads rebuild graph and forest off to
//! the side and install only when no newer reload has started since.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use grove_pkg::PackageStore;

use crate::caches::{CachePayload, DerivedCaches};
use crate::forest::{Forest, SourceFile};
use crate::host::Host;
use crate::module_index;
use crate::project::{LoadError, ProjectGraph, ProjectLoader};
use crate::tree::SourceTree;

/// Upper bound on source files read concurrently during a load.
const MAX_CONCURRENT_READS: usize = 32;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("{uri} belongs to a package and cannot be edited")]
    ReadOnly { uri: Url },
    #[error("{uri} is not part of this workspace")]
    UnknownFile { uri: Url },
}

/// Where the workspace stands between edits and synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Derived state matches the forest.
    Clean,
    /// At least one edit happened since the last synchronize.
    Dirty,
    /// A synchronize pass is running.
    Synchronizing,
}

/// A reload that has finished rebuilding and is waiting to be installed.
pub struct LoadedWorkspace {
    generation: u64,
    graph: ProjectGraph,
    forest: Forest,
}

/// An in-flight reload. It owns clones of everything it reads, so the
/// workspace stays fully usable while the rebuild runs.
pub struct ReloadRun {
    generation: u64,
    root_dir: PathBuf,
    host: Arc<dyn Host>,
    store: Arc<PackageStore>,
}

impl ReloadRun {
    /// Rebuilds the project graph and forest from disk.
    pub async fn run(self) -> Result<LoadedWorkspace, WorkspaceError> {
        let (graph, forest) = initialize(&self.root_dir, &self.host, &self.store).await?;
        Ok(LoadedWorkspace {
            generation: self.generation,
            graph,
            forest,
        })
    }
}

/// All state for one opened root project.
pub struct Workspace {
    root_dir: PathBuf,
    host: Arc<dyn Host>,
    store: Arc<PackageStore>,
    graph: ProjectGraph,
    forest: Forest,
    caches: DerivedCaches,
    analysis: Option<CachePayload>,
    state: SyncState,
    generation: u64,
}

impl Workspace {
    /// Loads the workspace rooted at `root_dir`. A relative root is
    /// resolved against the current directory.
    pub async fn load(
        root_dir: impl Into<PathBuf>,
        host: Arc<dyn Host>,
        store: Arc<PackageStore>,
    ) -> Result<Self, WorkspaceError> {
        let root_dir = absolute_root(root_dir.into())?;
        let (graph, forest) = initialize(&root_dir, &host, &store).await?;
        Ok(Self {
            root_dir,
            host,
            store,
            graph,
            forest,
            caches: DerivedCaches::default(),
            analysis: None,
            state: SyncState::Clean,
            generation: 0,
        })
    }

    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    #[must_use]
    pub fn graph(&self) -> &ProjectGraph {
        &self.graph
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn caches(&self) -> &DerivedCaches {
        &self.caches
    }

    pub fn caches_mut(&mut self) -> &mut DerivedCaches {
        &mut self.caches
    }

    /// The forest, optionally synchronizing its module index first.
    ///
    /// Passing `synchronize: false` answers from the last synchronized
    /// state, which is what cheap read paths want while edits are still
    /// streaming in.
    pub fn forest(&mut self, synchronize: bool) -> &Forest {
        if synchronize && self.state == SyncState::Dirty {
            self.state = SyncState::Synchronizing;
            self.forest.synchronize();
            self.state = SyncState::Clean;
        }
        &self.forest
    }

    /// Replaces the text of the file at `uri` and reparses it.
    ///
    /// Only files of the root project accept edits; package sources are
    /// read-only.
    pub fn update_tree(
        &mut self,
        uri: &Url,
        text: impl Into<String>,
    ) -> Result<(), WorkspaceError> {
        let (writable, project, qualifier) = match self.forest.by_uri(uri) {
            Some(file) => (file.writable, file.project, file.qualifier.clone()),
            None => {
                return Err(WorkspaceError::UnknownFile { uri: uri.clone() });
            }
        };
        if !writable {
            return Err(WorkspaceError::ReadOnly { uri: uri.clone() });
        }
        self.forest.set_tree(SourceFile {
            uri: uri.clone(),
            tree: SourceTree::parse(text.into()),
            writable,
            project,
            qualifier,
        });
        self.mark_dirty();
        Ok(())
    }

    /// Records that derived state no longer matches the forest. Runs the
    /// invalidation only on the clean-to-dirty transition.
    pub fn mark_dirty(&mut self) {
        if self.state != SyncState::Clean {
            return;
        }
        self.state = SyncState::Dirty;
        self.caches.clear_analysis();
        self.analysis = None;
        debug!("workspace marked dirty");
    }

    /// Parks a whole-workspace analysis result. It is dropped again on
    /// the next edit or reload.
    pub fn set_analysis(&mut self, analysis: CachePayload) {
        self.analysis = Some(analysis);
    }

    #[must_use]
    pub fn analysis(&self) -> Option<&CachePayload> {
        self.analysis.as_ref()
    }

    /// Typed view of the parked analysis result.
    #[must_use]
    pub fn analysis_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let payload = self.analysis.as_ref()?;
        Arc::clone(payload).downcast::<T>().ok()
    }

    /// Starts a reload and hands back the run to execute. Starting a new
    /// run supersedes every run started earlier.
    pub fn begin_reload(&mut self) -> ReloadRun {
        self.generation += 1;
        ReloadRun {
            generation: self.generation,
            root_dir: self.root_dir.clone(),
            host: Arc::clone(&self.host),
            store: Arc::clone(&self.store),
        }
    }

    /// Installs a finished reload. Returns false when a newer reload
    /// started after this one, in which case the result is discarded.
    pub fn install(&mut self, loaded: LoadedWorkspace) -> bool {
        if loaded.generation != self.generation {
            debug!(
                loaded = loaded.generation,
                current = self.generation,
                "discarding superseded reload"
            );
            return false;
        }
        self.graph = loaded.graph;
        self.forest = loaded.forest;
        self.caches = DerivedCaches::default();
        self.analysis = None;
        self.state = SyncState::Clean;
        true
    }

    /// Rebuilds the workspace from disk in one step.
    pub async fn reload(&mut self) -> Result<bool, WorkspaceError> {
        let run = self.begin_reload();
        let loaded = run.run().await?;
        Ok(self.install(loaded))
    }
}

/// Forest entries are keyed by `file://` URLs, which only form from
/// absolute paths. Relative roots are settled here, before anything is
/// discovered under them.
fn absolute_root(dir: PathBuf) -> Result<PathBuf, WorkspaceError> {
    if dir.is_absolute() {
        return Ok(dir);
    }
    let cwd = std::env::current_dir().map_err(|source| LoadError::Io {
        path: dir.clone(),
        source,
    })?;
    Ok(cwd.join(&dir).components().collect())
}

/// Loads the graph, reads and parses every discovered source file, and
/// fills in module visibility.
///
/// Dependency resolution and module discovery gate the read fan-out;
/// visibility propagation waits for every read to land. Reads run at most
/// [`MAX_CONCURRENT_READS`] at a time.
async fn initialize(
    root_dir: &Path,
    host: &Arc<dyn Host>,
    store: &Arc<PackageStore>,
) -> Result<(ProjectGraph, Forest), WorkspaceError> {
    let loader = ProjectLoader::new(Arc::clone(store), Arc::clone(host));
    let mut graph = loader.load_root(root_dir)?;
    let snapshot = module_index::discover(&graph, host.as_ref());
    module_index::apply(&snapshot, &mut graph);

    let mut forest = Forest::default();
    let mut reads = stream::iter(snapshot.files().iter().map(|file| {
        let read = host.read_source(&file.path);
        async move { (file, read.await) }
    }))
    .buffer_unordered(MAX_CONCURRENT_READS);
    while let Some((file, outcome)) = reads.next().await {
        let text = match outcome {
            Ok(text) => text,
            Err(err) => {
                warn!(
                    path = %file.path.display(),
                    error = %err,
                    "failed to read source file, skipping"
                );
                continue;
            }
        };
        let Ok(uri) = Url::from_file_path(&file.path) else {
            warn!(path = %file.path.display(), "path does not form a file URI, skipping");
            continue;
        };
        forest.set_tree(SourceFile {
            uri,
            tree: SourceTree::parse(text),
            writable: file.writable,
            project: file.project,
            qualifier: file.qualifier.clone(),
        });
    }

    module_index::propagate(&snapshot, &mut graph);
    forest.synchronize();
    debug!(
        projects = graph.len(),
        files = forest.len(),
        "workspace initialized"
    );
    Ok((graph, forest))
}
