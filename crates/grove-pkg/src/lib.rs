//! Package metadata and dependency resolution for Elm projects.
//!
//! This crate provides:
//! - Parsing and validation of `elm.json` manifests
//! - Three-part version numbers and `lo <= v < hi` constraints
//! - Read access to the local package store under `ELM_HOME`
//! - Backtracking dependency resolution over the store's contents

mod manifest;
mod solver;
mod store;
#[cfg(test)]
mod testutil;
mod version;

pub use manifest::{
    AppDependencies, ApplicationManifest, ExposedModules, ManifestError, PackageManifest,
    ProjectManifest, MANIFEST_FILE, SOURCE_DIR, SOURCE_EXT, TESTS_DIR,
};
pub use solver::{Resolution, Resolver, SolveError};
pub use store::{PackageStore, PackageVersion, StoreError};
pub use version::{Constraint, Op, Version, VersionError};
