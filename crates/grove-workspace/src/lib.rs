//! Workspace state for an Elm editing session.
//!
//! This crate provides:
//! - Loading a root project and its dependency closure into a project graph
//! - Module discovery and cross-project visibility
//! - A forest of parsed source files keyed by URI
//! - Derived caches and the dirty/synchronize lifecycle around edits

mod caches;
mod forest;
mod host;
pub mod module_index;
mod project;
#[cfg(test)]
mod testutil;
mod tree;
mod workspace;

pub use caches::{CachePayload, DerivedCache, DerivedCaches};
pub use forest::{Forest, SourceFile};
pub use host::{Host, OsHost};
pub use module_index::{DiscoveredModules, ModuleFile};
pub use project::{LoadError, Project, ProjectGraph, ProjectId, ProjectKind, ProjectLoader};
pub use tree::{Exposing, Location, ModuleHeader, ModuleKind, SourceTree};
pub use workspace::{LoadedWorkspace, ReloadRun, SyncState, Workspace, WorkspaceError};
