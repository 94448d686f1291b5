//! End-to-end coverage of a full index -> query pass against a small
//! synthetic project, plus the cross-module scenarios from the
//! element/parser/store contracts.

use context_index::config::IndexConfig;
use context_index::coordinator::{CancellationToken, Coordinator};
use context_index::embed::{Embedder, HashEmbedder};
use context_index::query::QueryLayer;
use context_index::store::structured::StructuredIndex;
use context_index::store::vector::VectorIndex;

fn build_coordinator(root: &std::path::Path) -> Coordinator {
    let config = IndexConfig::default();
    Coordinator::new(root.to_path_buf(), config, StructuredIndex::in_memory(), VectorIndex::in_memory(), Box::new(HashEmbedder::new(32)))
}

fn query_layer(coordinator: &Coordinator) -> QueryLayer<'_> {
    QueryLayer {
        structured: &coordinator.structured,
        vectors: &coordinator.vectors,
        embedder: coordinator.embedder.as_ref(),
        config: &coordinator.config,
        root: &coordinator.root,
    }
}

#[test]
fn full_pass_over_mixed_project_produces_searchable_index() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("users.py"),
        "def get_user(id):\n    return db.fetch(id)\n\ndef get_users():\n    return db.fetch_all()\n\ndef set_user(id, data):\n    db.write(id, data)\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("README.md"), "# Intro\n\nWelcome.\n\n## Usage\n\nRun it.\n\n# API\n\nDetails.\n").unwrap();
    std::fs::write(dir.path().join("app.js"), "function handleRequest(req) {\n  return req.body;\n}\n").unwrap();
    std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
    std::fs::write(dir.path().join("node_modules/pkg/index.js"), "module.exports = {};\n").unwrap();

    let coordinator = build_coordinator(dir.path());
    let report = coordinator.run_full_pass(&CancellationToken::new()).unwrap();

    assert_eq!(report.files_indexed, 3, "node_modules file must be excluded");
    assert!(report.elements_produced > 0);
    assert!(report.chunks_embedded > 0);

    let query = query_layer(&coordinator);

    let structural = query.search_structural("get_*", None, None, None, 10);
    let names: Vec<_> = structural.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["get_user", "get_users"]);

    let semantic = query.search_semantic("fetch a user from the database", 5, None, None, None).unwrap();
    assert!(!semantic.is_empty());

    let structure = query.get_project_structure();
    assert!(structure.by_language.contains_key("python"));
    assert!(structure.by_language.contains_key("markdown"));
    assert!(structure.by_language.contains_key("javascript"));

    let users_file = structure.tree.files.iter().find(|f| f.file_path == "users.py").unwrap();
    assert_eq!(users_file.by_type.get("function").copied().unwrap_or(0), 3);

    let manifest_path = dir.path().join(".context-index").join("manifest.json");
    assert!(manifest_path.exists());
}

#[test]
fn incremental_reindex_reflects_edit_then_deletion() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.py"), "def old_name():\n    pass\n").unwrap();
    let coordinator = build_coordinator(dir.path());
    coordinator.run_full_pass(&CancellationToken::new()).unwrap();
    assert_eq!(coordinator.structured.get_by_file("a.py").len(), 1);

    coordinator.reindex_file("a.py", Some("def new_name():\n    pass\n")).unwrap();
    let elements = coordinator.structured.get_by_file("a.py");
    assert_eq!(elements.len(), 1);
    assert_eq!(elements[0].name, "new_name");

    coordinator.reindex_file("a.py", None).unwrap();
    assert!(coordinator.structured.get_by_file("a.py").is_empty());
}

#[test]
fn dependency_manifests_are_found_even_inside_excluded_dirs() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
    std::fs::write(dir.path().join("node_modules/pkg/package.json"), "{}").unwrap();
    std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"x\"\n").unwrap();

    let coordinator = build_coordinator(dir.path());
    let query = query_layer(&coordinator);
    let deps = query.get_dependencies();
    let kinds: Vec<_> = deps.iter().map(|d| d.kind.as_str()).collect();
    assert!(kinds.contains(&"package.json"));
    assert!(kinds.contains(&"Cargo.toml"));
}

#[test]
fn dry_run_clean_reports_without_deleting() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.py"), "def f():\n    pass\n").unwrap();
    let coordinator = build_coordinator(dir.path());
    coordinator.run_full_pass(&CancellationToken::new()).unwrap();

    let report = coordinator.clean(true).unwrap();
    assert!(report.dry_run);
    assert!(report.elements_removed > 0);
    assert!(!coordinator.structured.get_by_file("a.py").is_empty());

    let report = coordinator.clean(false).unwrap();
    assert!(!report.dry_run);
    assert!(coordinator.structured.get_by_file("a.py").is_empty());
}

#[test]
fn reparsing_unchanged_project_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.py"), "def f():\n    pass\n").unwrap();
    let coordinator = build_coordinator(dir.path());

    let first = coordinator.run_full_pass(&CancellationToken::new()).unwrap();
    let ids_before: Vec<_> = coordinator.structured.get_by_file("a.py").into_iter().map(|e| e.id).collect();

    let second = coordinator.run_full_pass(&CancellationToken::new()).unwrap();
    let ids_after: Vec<_> = coordinator.structured.get_by_file("a.py").into_iter().map(|e| e.id).collect();

    assert_eq!(ids_before, ids_after);
    assert_eq!(first.elements_produced, second.elements_produced);
}
