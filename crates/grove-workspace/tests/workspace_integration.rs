//! End to end checks over the public API: open a root project against a
//! populated package store and look at the resulting workspace.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use grove_pkg::{PackageStore, Version};
use grove_workspace::{OsHost, SyncState, Workspace};

fn write_store_package(
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
        let path = dir.join("src").join(format!("{}.elm", module.replace('.', "/")));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, format!("module {module} exposing (..)\n")).unwrap();
    }
}

async fn open(store: &Path, root: &Path) -> Workspace {
    Workspace::load(root, Arc::new(OsHost), Arc::new(PackageStore::new(store)))
        .await
        .unwrap()
}

#[tokio::test]
async fn package_root_resolves_greatest_version_and_loads_it_once() {
    let store = tempfile::tempdir().unwrap();
    let checkout = tempfile::tempdir().unwrap();
    write_store_package(store.path(), "author/lib", "1.0.0", &["Lib"], &[], &["Lib"]);
    write_store_package(
        store.path(),
        "author/lib",
        "1.3.0",
        &["Lib"],
        &[],
        &["Lib", "Lib.Hidden"],
    );
    write_store_package(store.path(), "author/lib", "2.0.0", &["Lib"], &[], &["Lib"]);
    write_store_package(
        store.path(),
        "author/extra",
        "1.0.0",
        &["Extra"],
        &[("author/lib", "1.0.0 <= v < 2.0.0")],
        &["Extra"],
    );

    let manifest = serde_json::json!({
        "type": "package",
        "name": "me/pkg",
        "summary": "fixture",
        "license": "BSD-3-Clause",
        "version": "1.0.0",
        "exposed-modules": ["Pkg"],
        "elm-version": "0.19.0 <= v < 0.20.0",
        "dependencies": {
            "author/extra": "1.0.0 <= v < 2.0.0",
            "author/lib": "1.0.0 <= v < 2.0.0"
        },
        "test-dependencies": {}
    });
    fs::create_dir_all(checkout.path().join("src")).unwrap();
    fs::write(
        checkout.path().join("elm.json"),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
    fs::write(
        checkout.path().join("src/Pkg.elm"),
        "module Pkg exposing (..)\n",
    )
    .unwrap();

    let mut ws = open(store.path(), checkout.path()).await;
    assert_eq!(ws.state(), SyncState::Clean);

    // 2.0.0 is outside the constraint, so 1.3.0 wins over 1.0.0
    let graph = ws.graph();
    assert_eq!(
        graph.resolution().get("author/lib"),
        Some(Version::new(1, 3, 0))
    );

    // root, author/extra, and a single shared author/lib entry
    assert_eq!(graph.len(), 3);
    let lib = graph.lookup("author/lib", Version::new(1, 3, 0)).unwrap();
    let root = graph.root_project();
    assert_eq!(root.dependencies["author/lib"], lib);
    let extra = root.dependencies["author/extra"];
    assert_eq!(graph[extra].dependencies["author/lib"], lib);

    assert!(root.modules.contains_key("Pkg"));
    assert!(root.modules.contains_key("Lib"));
    assert!(root.modules.contains_key("Extra"));
    assert!(!root.modules.contains_key("Lib.Hidden"));

    let forest = ws.forest(false);
    assert!(forest.by_module_name("Lib.Hidden").is_some());
    assert!(forest.by_module_name("Pkg").unwrap().writable);
}

#[tokio::test]
async fn application_pins_are_used_verbatim() {
    let store = tempfile::tempdir().unwrap();
    let app = tempfile::tempdir().unwrap();
    write_store_package(
        store.path(),
        "a/one",
        "1.0.0",
        &["One"],
        &[("shared/base", "1.0.0 <= v < 2.0.0")],
        &["One"],
    );
    write_store_package(
        store.path(),
        "b/two",
        "1.0.0",
        &["Two"],
        &[("shared/base", "1.0.0 <= v < 2.0.0")],
        &["Two"],
    );
    // 1.9.0 also exists, but the application pins 1.2.0
    write_store_package(store.path(), "shared/base", "1.2.0", &["Base"], &[], &["Base"]);
    write_store_package(store.path(), "shared/base", "1.9.0", &["Base"], &[], &["Base"]);

    let manifest = serde_json::json!({
        "type": "application",
        "source-directories": ["src"],
        "elm-version": "0.19.1",
        "dependencies": {
            "direct": { "a/one": "1.0.0", "b/two": "1.0.0" },
            "indirect": { "shared/base": "1.2.0" }
        },
        "test-dependencies": { "direct": {}, "indirect": {} }
    });
    fs::create_dir_all(app.path().join("src")).unwrap();
    fs::write(
        app.path().join("elm.json"),
        serde_json::to_string_pretty(&manifest).unwrap(),
    )
    .unwrap();
    fs::write(
        app.path().join("src/Main.elm"),
        "module Main exposing (main)\nmain = 0\n",
    )
    .unwrap();

    let ws = open(store.path(), app.path()).await;
    let graph = ws.graph();
    assert_eq!(
        graph.resolution().get("shared/base"),
        Some(Version::new(1, 2, 0))
    );
    assert_eq!(graph.len(), 4);
    let base = graph.lookup("shared/base", Version::new(1, 2, 0)).unwrap();
    let root = graph.root_project();
    let one = root.dependencies["a/one"];
    let two = root.dependencies["b/two"];
    assert_eq!(graph[one].dependencies["shared/base"], base);
    assert_eq!(graph[two].dependencies["shared/base"], base);

    // direct deps are visible to the application, the indirect pin is not
    assert!(root.modules.contains_key("One"));
    assert!(root.modules.contains_key("Two"));
    assert!(!root.modules.contains_key("Base"));
}
