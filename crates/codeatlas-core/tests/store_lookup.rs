//! AtlasStore used the way retrieval tooling uses it: write a few versions,
//! then resolve references and search keys against the newest one.

use codeatlas_core::model::{Argument, Atlas, AtlasEntry, Class, Method, Module};
use codeatlas_core::store::AtlasStore;
use tempfile::TempDir;

fn module(key: &str, is_root: bool) -> Module {
    Module {
        name: key.rsplit('.').next().unwrap_or(key).to_string(),
        full_name: key.to_string(),
        file_path: format!("{}.py", key.replace('.', "/")),
        doc_comment: None,
        class_names: vec!["Window".to_string()],
        function_names: vec![],
        equivalent_modules: vec![],
        is_root,
        extension_name: is_root.then(|| "omni.ui".to_string()),
    }
}

fn window_atlas(doc: &str) -> Atlas {
    let mut atlas = Atlas::new();
    atlas
        .modules
        .insert("omni.ui".to_string(), module("omni.ui", true));
    atlas.classes.insert(
        "omni.ui.Window".to_string(),
        Class {
            name: "Window".to_string(),
            full_name: "omni.ui.Window".to_string(),
            doc_comment: Some(doc.to_string()),
            declared_line: 3,
            module_name: "omni.ui".to_string(),
            method_names: vec!["show".to_string()],
            class_variable_names: vec![],
            parent_class_keys: vec![],
            decorator_names: vec![],
            promoted_from: None,
            promoted_as: vec![],
        },
    );
    atlas.methods.insert(
        "omni.ui.Window.show".to_string(),
        Method {
            name: "show".to_string(),
            full_name: "omni.ui.Window.show".to_string(),
            doc_comment: None,
            declared_line: 5,
            module_name: "omni.ui".to_string(),
            parent_class_key: Some("omni.ui.Window".to_string()),
            return_type_text: None,
            arguments: vec![Argument {
                name: "self".to_string(),
                full_name: "omni.ui.Window.show.self".to_string(),
                type_text: None,
                default_text: None,
                is_variadic: false,
            }],
            is_async: false,
            is_static: false,
            is_classmethod: false,
            decorator_names: vec![],
            body_text: None,
            body_line: None,
            usage_edges: vec!["omni.ui.Menu.open".to_string()],
            promoted_from: None,
            promoted_as: vec![],
        },
    );
    atlas.used_classes.insert(
        "omni.ui.Window.show".to_string(),
        vec!["omni.ui.Menu.open".to_string()],
    );
    atlas
}

#[test]
fn newest_version_answers_lookups() {
    let dir = TempDir::new().unwrap();
    let mut store = AtlasStore::new(dir.path());
    store
        .save("omni.ui", Some("2.9.0"), &window_atlas("old"))
        .unwrap();
    store
        .save("omni.ui", Some("2.10.1"), &window_atlas("new"))
        .unwrap();

    match store.get("omni.ui", "omni.ui@Window").unwrap() {
        Some(AtlasEntry::Class(class)) => {
            assert_eq!(class.doc_comment.as_deref(), Some("new"))
        }
        other => panic!("expected class, got {:?}", other),
    }
    let entry = store.get("omni.ui", "omni.ui@Window.show").unwrap().unwrap();
    assert_eq!(entry.kind_str(), "method");
    assert_eq!(
        store.atlas("omni.ui").unwrap().usages_of("omni.ui.Window.show"),
        ["omni.ui.Menu.open".to_string()]
    );
}

#[test]
fn search_over_stored_atlas() {
    let dir = TempDir::new().unwrap();
    let mut store = AtlasStore::new(dir.path());
    store.save("omni.ui", None, &window_atlas("doc")).unwrap();

    let hits = store.search_prefix("omni.ui", "omni.ui.Window", None).unwrap();
    let keys: Vec<&str> = hits.iter().map(|h| h.key.as_str()).collect();
    assert_eq!(keys, ["omni.ui.Window", "omni.ui.Window.show"]);

    let hits = store.search_fuzzy("omni.ui", "SHOW", Some(5)).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].kind, "method");
}

#[test]
fn saved_document_has_sorted_top_level_tables() {
    let dir = TempDir::new().unwrap();
    let mut store = AtlasStore::new(dir.path());
    let path = store.save("omni.ui", None, &window_atlas("doc")).unwrap();
    let text = std::fs::read_to_string(path).unwrap();
    let positions: Vec<usize> = ["\"modules\"", "\"classes\"", "\"methods\"", "\"used_classes\""]
        .iter()
        .map(|k| text.find(k).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(text.ends_with('\n'));
}
