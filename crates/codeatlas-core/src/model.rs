//! Atlas data model.
//!
//! One [`Atlas`] describes one package version:
//! - [`Module`]: one entry per parsed source file
//! - [`Class`]: module-level classes, plus promoted copies
//! - [`Method`]: functions and methods, plus promoted copies
//! - `used_classes`: reverse usage index, target key -> referencing keys
//!
//! All tables are `BTreeMap`s so serialization is key-ordered and stable.
//! Entries never hold references to each other, only symbol keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::key::SymbolRef;

// ============================================================================
// Entities
// ============================================================================

/// A module (one source file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Last dotted segment of the module name.
    pub name: String,
    /// Symbol key (`omni.ui._impl.window`).
    pub full_name: String,
    /// Package-relative file path, forward slashes.
    pub file_path: String,
    pub doc_comment: Option<String>,
    pub class_names: Vec<String>,
    pub function_names: Vec<String>,
    /// Modules this one re-exports through wildcard imports (transitive, sorted).
    pub equivalent_modules: Vec<String>,
    pub is_root: bool,
    /// Package identity tag; only set on root modules.
    pub extension_name: Option<String>,
}

/// A class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub name: String,
    pub full_name: String,
    pub doc_comment: Option<String>,
    /// 1-indexed line of the `class` keyword.
    pub declared_line: u32,
    pub module_name: String,
    pub method_names: Vec<String>,
    pub class_variable_names: Vec<String>,
    /// Keys of base classes. These may point outside the package.
    pub parent_class_keys: Vec<String>,
    pub decorator_names: Vec<String>,
    /// Original key when this entry is a promoted copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted_from: Option<String>,
    /// Promoted copies of this entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub promoted_as: Vec<String>,
}

/// A function argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    /// `<method key>.<name>`.
    pub full_name: String,
    /// Raw annotation text. Never resolved.
    pub type_text: Option<String>,
    pub default_text: Option<String>,
    /// `*args` or `**kwargs`.
    pub is_variadic: bool,
}

/// A function or method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub full_name: String,
    pub doc_comment: Option<String>,
    /// 1-indexed line of the `def` keyword.
    pub declared_line: u32,
    pub module_name: String,
    pub parent_class_key: Option<String>,
    pub return_type_text: Option<String>,
    pub arguments: Vec<Argument>,
    pub is_async: bool,
    pub is_static: bool,
    pub is_classmethod: bool,
    pub decorator_names: Vec<String>,
    /// Source of the body, only when body extraction is enabled.
    pub body_text: Option<String>,
    /// First line of `body_text`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_line: Option<u32>,
    /// Keys of symbols that use this one (sorted, deduplicated).
    pub usage_edges: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted_from: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub promoted_as: Vec<String>,
}

// ============================================================================
// Atlas
// ============================================================================

/// The serialized knowledge graph of one package version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Atlas {
    pub modules: BTreeMap<String, Module>,
    pub classes: BTreeMap<String, Class>,
    pub methods: BTreeMap<String, Method>,
    /// Usage target key -> sorted referencing keys.
    pub used_classes: BTreeMap<String, Vec<String>>,
}

/// A borrowed view of any atlas entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "entry", rename_all = "snake_case")]
pub enum AtlasEntry<'a> {
    Module(&'a Module),
    Class(&'a Class),
    Method(&'a Method),
}

impl AtlasEntry<'_> {
    /// The entry's symbol key.
    pub fn key(&self) -> &str {
        match self {
            AtlasEntry::Module(m) => &m.full_name,
            AtlasEntry::Class(c) => &c.full_name,
            AtlasEntry::Method(m) => &m.full_name,
        }
    }

    /// Entry kind as a lowercase string.
    pub fn kind_str(&self) -> &'static str {
        match self {
            AtlasEntry::Module(_) => "module",
            AtlasEntry::Class(_) => "class",
            AtlasEntry::Method(_) => "method",
        }
    }

    pub fn doc_comment(&self) -> Option<&str> {
        match self {
            AtlasEntry::Module(m) => m.doc_comment.as_deref(),
            AtlasEntry::Class(c) => c.doc_comment.as_deref(),
            AtlasEntry::Method(m) => m.doc_comment.as_deref(),
        }
    }
}

/// Number of keys added per table by [`Atlas::merge_missing`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub modules: usize,
    pub classes: usize,
    pub methods: usize,
    pub used_classes: usize,
}

impl MergeStats {
    pub fn total(&self) -> usize {
        self.modules + self.classes + self.methods + self.used_classes
    }
}

impl Atlas {
    /// Create an empty atlas.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.classes.is_empty() && self.methods.is_empty()
    }

    /// Total number of module, class and method entries.
    pub fn entry_count(&self) -> usize {
        self.modules.len() + self.classes.len() + self.methods.len()
    }

    /// Look up an entry by exact key. Modules win over classes, classes over methods.
    pub fn get(&self, key: &str) -> Option<AtlasEntry<'_>> {
        if let Some(m) = self.modules.get(key) {
            return Some(AtlasEntry::Module(m));
        }
        if let Some(c) = self.classes.get(key) {
            return Some(AtlasEntry::Class(c));
        }
        self.methods.get(key).map(AtlasEntry::Method)
    }

    /// Look up an entry by `package@symbol` reference.
    pub fn resolve_ref(&self, reference: &SymbolRef) -> Option<AtlasEntry<'_>> {
        self.get(&reference.to_key())
    }

    /// Referencing keys recorded for a usage target.
    pub fn usages_of(&self, key: &str) -> &[String] {
        self.used_classes
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All keys (modules, classes, methods) in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .modules
            .keys()
            .chain(self.classes.keys())
            .chain(self.methods.keys())
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys
    }

    /// Add every key of `other` that is absent here. Existing entries are
    /// never overwritten.
    pub fn merge_missing(&mut self, other: Atlas) -> MergeStats {
        let mut stats = MergeStats::default();
        for (key, value) in other.modules {
            if let std::collections::btree_map::Entry::Vacant(slot) = self.modules.entry(key) {
                slot.insert(value);
                stats.modules += 1;
            }
        }
        for (key, value) in other.classes {
            if let std::collections::btree_map::Entry::Vacant(slot) = self.classes.entry(key) {
                slot.insert(value);
                stats.classes += 1;
            }
        }
        for (key, value) in other.methods {
            if let std::collections::btree_map::Entry::Vacant(slot) = self.methods.entry(key) {
                slot.insert(value);
                stats.methods += 1;
            }
        }
        for (key, value) in other.used_classes {
            if let std::collections::btree_map::Entry::Vacant(slot) = self.used_classes.entry(key)
            {
                slot.insert(value);
                stats.used_classes += 1;
            }
        }
        stats
    }

    /// Serialize to the canonical pretty JSON form (trailing newline included).
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
