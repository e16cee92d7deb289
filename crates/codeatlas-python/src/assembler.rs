//! Atlas assembly.
//!
//! Turns the per-file records of one package plus the resolver's derived
//! tables into an [`Atlas`]: modules, classes and methods keyed by symbol
//! key, promoted copies under root modules, and the usage index.

use std::collections::btree_map::Entry;

use tracing::debug;

use codeatlas_core::key::{join_key, last_segment};
use codeatlas_core::model::{Argument, Atlas, Class, Method, Module};

use crate::record::{ClassRecord, FileRecord, FunctionRecord};
use crate::resolver::{DefinitionKind, Promotion, SymbolResolver};
use crate::usage::{SymbolTargets, UsageIndexer};

/// Build the atlas of one package.
///
/// `extension_name` tags root modules. Records may come in any order; the
/// first file in path order wins duplicate keys. A file whose module is
/// already provided by an earlier file contributes no entries and no usages.
pub fn assemble(extension_name: &str, records: &[FileRecord], resolver: &SymbolResolver) -> Atlas {
    let mut sorted: Vec<&FileRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let mut atlas = Atlas::new();
    let mut kept: Vec<&FileRecord> = Vec::with_capacity(sorted.len());
    for record in sorted {
        if atlas.modules.contains_key(&record.module) {
            debug!("{} duplicates module {}; not indexed", record.path, record.module);
            continue;
        }
        add_record(&mut atlas, extension_name, record, resolver);
        kept.push(record);
    }

    for promotion in resolver.promotions() {
        promote(&mut atlas, promotion);
    }

    for module in atlas.modules.values_mut() {
        sort_dedup(&mut module.class_names);
        sort_dedup(&mut module.function_names);
    }
    for class in atlas.classes.values_mut() {
        sort_dedup(&mut class.promoted_as);
    }
    for method in atlas.methods.values_mut() {
        sort_dedup(&mut method.promoted_as);
    }

    let targets = symbol_targets(&atlas);
    let used = UsageIndexer::new(resolver, &targets).index(kept);
    for (target, referrers) in &used {
        if let Some(method) = atlas.methods.get_mut(target) {
            method.usage_edges = referrers.clone();
        }
    }
    atlas.used_classes = used;
    atlas
}

fn sort_dedup(items: &mut Vec<String>) {
    items.sort();
    items.dedup();
}

fn add_record(atlas: &mut Atlas, extension_name: &str, record: &FileRecord, resolver: &SymbolResolver) {
    let is_root = resolver.is_root(&record.module);
    atlas.modules.insert(
        record.module.clone(),
        Module {
            name: last_segment(&record.module).to_string(),
            full_name: record.module.clone(),
            file_path: record.path.clone(),
            doc_comment: record.doc_comment.clone(),
            class_names: record.class_names().map(str::to_string).collect(),
            function_names: record.function_names().map(str::to_string).collect(),
            equivalent_modules: resolver.equivalent_modules(&record.module).to_vec(),
            is_root,
            extension_name: is_root.then(|| extension_name.to_string()),
        },
    );

    for class in &record.classes {
        if let Entry::Vacant(slot) = atlas.classes.entry(class.key.clone()) {
            slot.insert(class_entry(record, class, resolver));
        }
    }
    for function in &record.functions {
        if let Entry::Vacant(slot) = atlas.methods.entry(function.key.clone()) {
            slot.insert(method_entry(record, function));
        }
    }
}

fn class_entry(record: &FileRecord, class: &ClassRecord, resolver: &SymbolResolver) -> Class {
    Class {
        name: class.name.clone(),
        full_name: class.key.clone(),
        doc_comment: class.doc_comment.clone(),
        declared_line: class.line,
        module_name: record.module.clone(),
        method_names: class.method_names.clone(),
        class_variable_names: class.class_variables.clone(),
        parent_class_keys: class
            .bases
            .iter()
            .map(|base| resolver.resolve_base(&record.module, base))
            .collect(),
        decorator_names: class.decorators.clone(),
        promoted_from: None,
        promoted_as: Vec::new(),
    }
}

fn method_entry(record: &FileRecord, function: &FunctionRecord) -> Method {
    Method {
        name: function.name.clone(),
        full_name: function.key.clone(),
        doc_comment: function.doc_comment.clone(),
        declared_line: function.line,
        module_name: record.module.clone(),
        parent_class_key: function.class_key.clone(),
        return_type_text: function.return_type.clone(),
        arguments: function
            .arguments
            .iter()
            .map(|arg| Argument {
                name: arg.name.clone(),
                full_name: join_key(&function.key, &arg.name),
                type_text: arg.type_text.clone(),
                default_text: arg.default_text.clone(),
                is_variadic: arg.is_variadic,
            })
            .collect(),
        is_async: function.is_async,
        is_static: function.is_static,
        is_classmethod: function.is_classmethod,
        decorator_names: function.decorators.clone(),
        body_text: function.body.as_ref().map(|b| b.text.clone()),
        body_line: function.body.as_ref().map(|b| b.line),
        usage_edges: Vec::new(),
        promoted_from: None,
        promoted_as: Vec::new(),
    }
}

/// Copy of a method re-keyed under `new_key`.
fn rekey_method(original: &Method, new_key: &str, module: &str, parent: Option<&str>) -> Method {
    let mut copy = original.clone();
    copy.name = last_segment(new_key).to_string();
    copy.full_name = new_key.to_string();
    copy.module_name = module.to_string();
    copy.parent_class_key = parent.map(str::to_string);
    for arg in &mut copy.arguments {
        arg.full_name = join_key(new_key, &arg.name);
    }
    copy.usage_edges = Vec::new();
    copy.promoted_from = Some(original.full_name.clone());
    copy.promoted_as = Vec::new();
    copy
}

fn promote(atlas: &mut Atlas, promotion: &Promotion) {
    let root = promotion.root_module.as_str();
    let promoted = promotion.promoted_key.as_str();
    let original = promotion.original_key.as_str();
    let name = last_segment(promoted).to_string();

    match promotion.kind {
        DefinitionKind::Class => {
            let Some(source) = atlas.classes.get(original).cloned() else {
                return;
            };
            if atlas.classes.contains_key(promoted) {
                debug!("promoted class {} already present", promoted);
                return;
            }
            let mut copy = source.clone();
            copy.name = name.clone();
            copy.full_name = promoted.to_string();
            copy.module_name = root.to_string();
            copy.promoted_from = Some(original.to_string());
            copy.promoted_as = Vec::new();
            atlas.classes.insert(promoted.to_string(), copy);
            if let Some(class) = atlas.classes.get_mut(original) {
                class.promoted_as.push(promoted.to_string());
            }

            for method_name in &source.method_names {
                let method_key = join_key(original, method_name);
                let new_key = join_key(promoted, method_name);
                let Some(method) = atlas.methods.get(&method_key) else {
                    continue;
                };
                if atlas.methods.contains_key(&new_key) {
                    continue;
                }
                let copy = rekey_method(method, &new_key, root, Some(promoted));
                atlas.methods.insert(new_key.clone(), copy);
                if let Some(method) = atlas.methods.get_mut(&method_key) {
                    method.promoted_as.push(new_key);
                }
            }
            if let Some(module) = atlas.modules.get_mut(root) {
                module.class_names.push(name);
            }
        }
        DefinitionKind::Function => {
            let Some(source) = atlas.methods.get(original) else {
                return;
            };
            if atlas.methods.contains_key(promoted) {
                debug!("promoted function {} already present", promoted);
                return;
            }
            let copy = rekey_method(source, promoted, root, None);
            atlas.methods.insert(promoted.to_string(), copy);
            if let Some(function) = atlas.methods.get_mut(original) {
                function.promoted_as.push(promoted.to_string());
            }
            if let Some(module) = atlas.modules.get_mut(root) {
                module.function_names.push(name);
            }
        }
        DefinitionKind::Method => {}
    }
}

/// Class and method keys, mapped to the original key for promoted copies.
fn symbol_targets(atlas: &Atlas) -> SymbolTargets {
    let mut targets = SymbolTargets::new();
    for (key, class) in &atlas.classes {
        targets.insert(key.clone(), class.promoted_from.clone());
    }
    for (key, method) in &atlas.methods {
        targets.insert(key.clone(), method.promoted_from.clone());
    }
    targets
}
