//! Fixture helpers shared by this crate's tests.

use std::fs;
use std::path::Path;

/// Writes a package into a store laid out as
/// `<root>/<maintainer>/<name>/<version>/`, with one source file per
/// module name in `modules`.
pub(crate) fn write_store_package(
    store_root: &Path,
    name: &str,
    version: &str,
    exposed: &[&str],
    deps: &[(&str, &str)],
    modules: &[&str],
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

    let dir = store_root.join(name).join(version);
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::write(
        dir.join("elm.json"),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
    for module in modules {
        let relative = format!("src/{}.elm", module.replace('.', "/"));
        write_source(&dir, &relative, &format!("module {module} exposing (..)\n"));
    }
}

/// Writes a package `elm.json` at the root of a checkout, plus an empty
/// `src/` directory.
pub(crate) fn write_package_manifest(
    dir: &Path,
    name: &str,
    version: &str,
    exposed: &[&str],
    deps: &[(&str, &str)],
    test_deps: &[(&str, &str)],
) {
    fn ranges(entries: &[(&str, &str)]) -> serde_json::Map<String, serde_json::Value> {
        entries
            .iter()
            .map(|(name, range)| ((*name).to_string(), serde_json::Value::from(*range)))
            .collect()
    }
    let manifest = serde_json::json!({
        "type": "package",
        "name": name,
        "summary": "fixture",
        "license": "BSD-3-Clause",
        "version": version,
        "exposed-modules": exposed,
        "elm-version": "0.19.0 <= v < 0.20.0",
        "dependencies": ranges(deps),
        "test-dependencies": ranges(test_deps)
    });
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::write(
        dir.join("elm.json"),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
}

/// Writes an application `elm.json` plus an empty `src/` directory.
pub(crate) fn write_application(
    dir: &Path,
    direct: &[(&str, &str)],
    indirect: &[(&str, &str)],
    test_direct: &[(&str, &str)],
) {
    fn pins(entries: &[(&str, &str)]) -> serde_json::Map<String, serde_json::Value> {
        entries
            .iter()
            .map(|(name, version)| ((*name).to_string(), serde_json::Value::from(*version)))
            .collect()
    }
    let manifest = serde_json::json!({
        "type": "application",
        "source-directories": ["src"],
        "elm-version": "0.19.1",
        "dependencies": {
            "direct": pins(direct),
            "indirect": pins(indirect)
        },
        "test-dependencies": {
            "direct": pins(test_direct),
            "indirect": {}
        }
    });
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::write(
        dir.join("elm.json"),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
}

/// Writes one file under `root`, creating parent directories as needed.
pub(crate) fn write_source(root: &Path, relative: &str, text: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, text).unwrap();
}
