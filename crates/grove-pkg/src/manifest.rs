//! `elm.json` manifests for applications and packages.
//!
//! The manifest kind is discriminated by its `"type"` field:
//!
//! - `"application"` pins every dependency (including indirect ones) to an
//!   exact version and lists the source directories to compile.
//! - `"package"` declares version ranges for its dependencies and the set
//!   of modules it exposes to consumers.
//!
//! Parsing is tolerant of extra fields; [`ProjectManifest::parse`] runs the
//! semantic checks that matter for loading after deserialization.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::{Constraint, Version};

/// File name of a project manifest.
pub const MANIFEST_FILE: &str = "elm.json";
/// Conventional source directory of a package.
pub const SOURCE_DIR: &str = "src";
/// Conventional test directory of a project.
pub const TESTS_DIR: &str = "tests";
/// Extension of Elm source files, without the dot.
pub const SOURCE_EXT: &str = "elm";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid package name `{name}`: expected `author/project`")]
    InvalidPackageName { name: String },
    #[error("`source-directories` must list at least one directory")]
    NoSourceDirectories,
}

/// A parsed `elm.json`, either kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProjectManifest {
    Application(ApplicationManifest),
    Package(PackageManifest),
}

impl ProjectManifest {
    /// Reads and validates the manifest at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parses and validates manifest text.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let manifest: Self = serde_json::from_str(text)?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), ManifestError> {
        match self {
            ProjectManifest::Application(app) => {
                if app.source_directories.is_empty() {
                    return Err(ManifestError::NoSourceDirectories);
                }
            }
            ProjectManifest::Package(pkg) => {
                validate_package_name(&pkg.name)?;
            }
        }
        Ok(())
    }
}

fn validate_package_name(name: &str) -> Result<(), ManifestError> {
    let well_formed = name.split_once('/').is_some_and(|(author, project)| {
        !author.is_empty() && !project.is_empty() && !project.contains('/')
    });
    if well_formed {
        Ok(())
    } else {
        Err(ManifestError::InvalidPackageName {
            name: name.to_string(),
        })
    }
}

/// Manifest of an application project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApplicationManifest {
    pub source_directories: Vec<String>,
    pub elm_version: Version,
    #[serde(default)]
    pub dependencies: AppDependencies,
    #[serde(default)]
    pub test_dependencies: AppDependencies,
}

/// Pinned dependency maps of an application, split by reachability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDependencies {
    #[serde(default)]
    pub direct: BTreeMap<String, Version>,
    #[serde(default)]
    pub indirect: BTreeMap<String, Version>,
}

impl AppDependencies {
    /// Iterates direct entries first, then indirect ones.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Version)> {
        self.direct.iter().chain(self.indirect.iter())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.direct.len() + self.indirect.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.direct.is_empty() && self.indirect.is_empty()
    }
}

/// Manifest of a package project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageManifest {
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub license: String,
    pub version: Version,
    pub exposed_modules: ExposedModules,
    pub elm_version: Constraint,
    #[serde(default)]
    pub dependencies: BTreeMap<String, Constraint>,
    #[serde(default)]
    pub test_dependencies: BTreeMap<String, Constraint>,
}

impl PackageManifest {
    /// The exposed modules as one flat set, regardless of manifest form.
    #[must_use]
    pub fn exposed_set(&self) -> BTreeSet<String> {
        self.exposed_modules.flatten()
    }
}

/// The `exposed-modules` field, written either as a flat list or as named
/// groups for documentation layout. Both forms mean the same set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExposedModules {
    Plain(Vec<String>),
    Grouped(BTreeMap<String, Vec<String>>),
}

impl ExposedModules {
    #[must_use]
    pub fn flatten(&self) -> BTreeSet<String> {
        match self {
            ExposedModules::Plain(modules) => modules.iter().cloned().collect(),
            ExposedModules::Grouped(groups) => groups.values().flatten().cloned().collect(),
        }
    }

    /// Whether `module` is exposed.
    #[must_use]
    pub fn contains(&self, module: &str) -> bool {
        match self {
            ExposedModules::Plain(modules) => modules.iter().any(|m| m == module),
            ExposedModules::Grouped(groups) => groups.values().flatten().any(|m| m == module),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APPLICATION: &str = r#"{
        "type": "application",
        "source-directories": ["src", "generated"],
        "elm-version": "0.19.1",
        "dependencies": {
            "direct": {
                "elm/browser": "1.0.2",
                "elm/core": "1.0.5"
            },
            "indirect": {
                "elm/json": "1.1.3"
            }
        },
        "test-dependencies": {
            "direct": { "elm-explorations/test": "2.1.1" },
            "indirect": {}
        }
    }"#;

    const PACKAGE: &str = r#"{
        "type": "package",
        "name": "author/widgets",
        "summary": "Widget helpers",
        "license": "BSD-3-Clause",
        "version": "2.1.0",
        "exposed-modules": ["Widgets", "Widgets.Button"],
        "elm-version": "0.19.0 <= v < 0.20.0",
        "dependencies": {
            "elm/core": "1.0.0 <= v < 2.0.0"
        },
        "test-dependencies": {}
    }"#;

    #[test]
    fn parses_an_application() {
        let ProjectManifest::Application(app) = ProjectManifest::parse(APPLICATION).unwrap() else {
            panic!("expected an application manifest");
        };
        assert_eq!(app.source_directories, vec!["src", "generated"]);
        assert_eq!(app.elm_version, Version::new(0, 19, 1));
        assert_eq!(app.dependencies.direct.len(), 2);
        assert_eq!(app.dependencies.indirect.len(), 1);
        assert_eq!(app.dependencies.direct["elm/core"], Version::new(1, 0, 5));
        assert_eq!(app.test_dependencies.len(), 1);
    }

    #[test]
    fn parses_a_package() {
        let ProjectManifest::Package(pkg) = ProjectManifest::parse(PACKAGE).unwrap() else {
            panic!("expected a package manifest");
        };
        assert_eq!(pkg.name, "author/widgets");
        assert_eq!(pkg.version, Version::new(2, 1, 0));
        assert!(pkg.exposed_modules.contains("Widgets.Button"));
        assert!(pkg.dependencies["elm/core"].satisfies(&Version::new(1, 0, 5)));
    }

    #[test]
    fn grouped_exposed_modules_flatten_to_one_set() {
        let grouped = r#"{
            "type": "package",
            "name": "author/big",
            "summary": "",
            "license": "MIT",
            "version": "1.0.0",
            "exposed-modules": {
                "Primitives": ["Big.Int", "Big.Float"],
                "Extras": ["Big.Extra"]
            },
            "elm-version": "0.19.0 <= v < 0.20.0",
            "dependencies": {},
            "test-dependencies": {}
        }"#;
        let ProjectManifest::Package(pkg) = ProjectManifest::parse(grouped).unwrap() else {
            panic!("expected a package manifest");
        };
        let exposed = pkg.exposed_set();
        assert_eq!(
            exposed.into_iter().collect::<Vec<_>>(),
            vec!["Big.Extra", "Big.Float", "Big.Int"]
        );
        assert!(pkg.exposed_modules.contains("Big.Int"));
        assert!(!pkg.exposed_modules.contains("Primitives"));
    }

    #[test]
    fn rejects_unknown_project_type() {
        let err = ProjectManifest::parse(r#"{ "type": "library" }"#).unwrap_err();
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn rejects_bad_package_names() {
        for name in ["widgets", "/widgets", "author/", "a/b/c"] {
            let text = PACKAGE.replace("author/widgets", name);
            let err = ProjectManifest::parse(&text).unwrap_err();
            assert!(
                matches!(err, ManifestError::InvalidPackageName { .. }),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn application_requires_source_directories() {
        let text = APPLICATION.replace(r#"["src", "generated"]"#, "[]");
        let err = ProjectManifest::parse(&text).unwrap_err();
        assert!(matches!(err, ManifestError::NoSourceDirectories));
    }

    #[test]
    fn from_path_reads_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        fs::write(&path, PACKAGE).unwrap();
        let manifest = ProjectManifest::from_path(&path).unwrap();
        assert!(matches!(manifest, ProjectManifest::Package(_)));

        let err = ProjectManifest::from_path(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }
}
