//! Fixture helpers shared by the crate's unit tests.

use std::fs;
use std::path::Path;

use crate::manifest::SOURCE_DIR;

/// Writes a package manifest into a store laid out as
/// `<root>/<maintainer>/<name>/<version>/elm.json`.
pub(crate) fn write_package(
    root: &Path,
    name: &str,
    version: &str,
    exposed: &[&str],
    deps: &[(&str, &str)],
) {
    let mut dependencies = serde_json::Map::new();
    for (dep, range) in deps {
        dependencies.insert((*dep).to_string(), serde_json::Value::from(*range));
    }
    let manifest = serde_json::json!({
        "type": "package",
        "name": name,
        "summary": "fixture",
        "license": "BSD-3-Clause",
        "version": version,
        "exposed-modules": exposed,
        "elm-version": "0.19.0 <= v < 0.20.0",
        "dependencies": dependencies,
        "test-dependencies": {}
    });

    let dir = root.join(name).join(version);
    fs::create_dir_all(dir.join(SOURCE_DIR)).unwrap();
    fs::write(
        dir.join(crate::manifest::MANIFEST_FILE),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
}
