//! Package-wide symbol resolution.
//!
//! [`SymbolResolver`] is built once per package from the complete set of
//! file records. It owns everything derived from imports:
//! - the namespace of every module (bound name -> qualified target)
//! - `equivalent_modules`: modules re-exported through wildcard imports
//! - root modules (declared entry files)
//! - promotions of classes and functions re-exported by root modules
//! - conflicts met while promoting
//!
//! Star-import expansion follows the language rules: a module's `__all__`
//! when declared, otherwise its public names, transitively through the
//! module's own wildcard imports. Cycles are cut with a visited set.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::{debug, warn};

use codeatlas_core::diagnostics::Diagnostic;
use codeatlas_core::key::{join_key, last_segment, parent_key};

use crate::record::{FileRecord, ImportKind, ImportRecord};

// ============================================================================
// Types
// ============================================================================

/// What a symbol key names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    Class,
    Function,
    Method,
}

/// A class or function re-registered under a root module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    /// `<root module>.<name>`.
    pub promoted_key: String,
    pub original_key: String,
    pub root_module: String,
    pub kind: DefinitionKind,
}

/// One name bound by an import statement, after relative resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Binding {
    /// `bound` refers to `target` (a module or a symbol key).
    Name { bound: String, target: String },
    /// `from source import *`.
    Wildcard { source: String },
}

#[derive(Debug, Clone)]
struct ModuleInfo {
    path: String,
    is_root: bool,
    all_names: Option<Vec<String>>,
    /// Module-level definitions, classes first, in declaration order.
    definitions: Vec<String>,
    bindings: Vec<Binding>,
    local_bindings: Vec<Binding>,
}

/// Resolve the module an import refers to.
///
/// Relative imports resolve against the importing module's package;
/// `__init__` modules are their own package. Returns `None` when the relative
/// level goes above the top-level package.
pub fn resolve_import_module(
    module: &str,
    is_package: bool,
    import: &ImportRecord,
) -> Option<String> {
    if import.level == 0 {
        return import.module.clone().filter(|m| !m.is_empty());
    }
    let mut base = if is_package {
        module.to_string()
    } else {
        parent_key(module)?.to_string()
    };
    for _ in 1..import.level {
        base = parent_key(&base)?.to_string();
    }
    Some(match &import.module {
        Some(rest) => join_key(&base, rest),
        None => base,
    })
}

// ============================================================================
// Resolver
// ============================================================================

/// Package-scoped resolution tables.
#[derive(Debug, Default)]
pub struct SymbolResolver {
    modules: BTreeMap<String, ModuleInfo>,
    definitions: BTreeMap<String, DefinitionKind>,
    namespaces: BTreeMap<String, BTreeMap<String, String>>,
    /// Root bindings pinned to their promotion winner.
    pinned: BTreeMap<String, BTreeMap<String, String>>,
    equivalents: BTreeMap<String, Vec<String>>,
    promotions: Vec<Promotion>,
    conflicts: Vec<Diagnostic>,
}

impl SymbolResolver {
    /// Build the resolver from every file record of one package.
    ///
    /// Records are processed in path order, so the first file in sorted
    /// order wins every duplicate.
    pub fn build(records: &[FileRecord]) -> Self {
        let mut sorted: Vec<&FileRecord> = records.iter().collect();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));

        let mut resolver = SymbolResolver::default();
        for record in &sorted {
            if resolver.modules.contains_key(&record.module) {
                resolver.conflicts.push(Diagnostic::conflict(
                    &record.path,
                    format!("module {} is already provided by another file", record.module),
                ));
                continue;
            }
            resolver.register_definitions(record);
        }
        let known: HashSet<String> = resolver.modules.keys().cloned().collect();
        for record in &sorted {
            let Some(info) = resolver.modules.get_mut(&record.module) else {
                continue;
            };
            if info.path != record.path {
                continue;
            }
            let (bindings, local_bindings) = bindings_for(record, &known);
            info.bindings = bindings;
            info.local_bindings = local_bindings;
        }

        resolver.build_namespaces();
        resolver.build_equivalents();
        resolver.build_promotions();
        resolver.pin_promoted_bindings();
        resolver.conflicts.sort();
        resolver.conflicts.dedup();
        resolver
    }

    fn register_definitions(&mut self, record: &FileRecord) {
        let mut definitions = Vec::new();
        for class in &record.classes {
            self.insert_definition(&class.key, DefinitionKind::Class, &record.path);
            definitions.push(class.name.clone());
        }
        for function in &record.functions {
            let kind = if function.class_key.is_some() {
                DefinitionKind::Method
            } else {
                definitions.push(function.name.clone());
                DefinitionKind::Function
            };
            self.insert_definition(&function.key, kind, &record.path);
        }
        self.modules.insert(
            record.module.clone(),
            ModuleInfo {
                path: record.path.clone(),
                is_root: record.is_entry,
                all_names: record.all_names.clone(),
                definitions,
                bindings: Vec::new(),
                local_bindings: Vec::new(),
            },
        );
    }

    fn insert_definition(&mut self, key: &str, kind: DefinitionKind, path: &str) {
        if self.definitions.contains_key(key) {
            debug!("{}: {} already defined, keeping the first", path, key);
            return;
        }
        self.definitions.insert(key.to_string(), kind);
    }

    // ------------------------------------------------------------------------
    // Namespaces
    // ------------------------------------------------------------------------

    fn build_namespaces(&mut self) {
        let mut memo: HashMap<String, BTreeMap<String, String>> = HashMap::new();
        let keys: Vec<String> = self.modules.keys().cloned().collect();
        for module in &keys {
            let mut stack = Vec::new();
            self.namespace_of(module, &mut memo, &mut stack);
        }
        let mut namespaces: BTreeMap<String, BTreeMap<String, String>> = memo.into_iter().collect();
        namespaces.retain(|module, _| self.modules.contains_key(module));
        self.namespaces = namespaces;
    }

    /// Names bound at module level: local definitions first, then promoted
    /// names, then imports in statement order. The first binding of a name
    /// wins.
    fn namespace_of(
        &self,
        module: &str,
        memo: &mut HashMap<String, BTreeMap<String, String>>,
        stack: &mut Vec<String>,
    ) -> BTreeMap<String, String> {
        if let Some(done) = memo.get(module) {
            return done.clone();
        }
        let Some(info) = self.modules.get(module) else {
            return BTreeMap::new();
        };
        let mut namespace = BTreeMap::new();
        for name in &info.definitions {
            namespace
                .entry(name.clone())
                .or_insert_with(|| join_key(module, name));
        }
        if let Some(pinned) = self.pinned.get(module) {
            for (name, target) in pinned {
                namespace.entry(name.clone()).or_insert_with(|| target.clone());
            }
        }
        if stack.iter().any(|m| m == module) {
            debug!("wildcard import cycle through {}", module);
            return namespace;
        }
        stack.push(module.to_string());
        for binding in &info.bindings {
            match binding {
                Binding::Name { bound, target } => {
                    namespace
                        .entry(bound.clone())
                        .or_insert_with(|| target.clone());
                }
                Binding::Wildcard { source } => {
                    let source_namespace = self.namespace_of(source, memo, stack);
                    for (name, target) in self.filter_exports(source, source_namespace) {
                        namespace.entry(name).or_insert(target);
                    }
                }
            }
        }
        stack.pop();
        memo.insert(module.to_string(), namespace.clone());
        namespace
    }

    /// The names `from module import *` brings in.
    fn filter_exports(
        &self,
        module: &str,
        namespace: BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let all_names = self.modules.get(module).and_then(|m| m.all_names.as_ref());
        match all_names {
            Some(all) => {
                let mut exports = BTreeMap::new();
                for name in all {
                    if let Some(target) = namespace.get(name) {
                        exports.insert(name.clone(), target.clone());
                    } else {
                        let submodule = join_key(module, name);
                        if self.modules.contains_key(&submodule) {
                            exports.insert(name.clone(), submodule);
                        }
                    }
                }
                exports
            }
            None => namespace
                .into_iter()
                .filter(|(name, _)| !name.starts_with('_'))
                .collect(),
        }
    }

    /// Names `from module import *` brings in, with their targets.
    pub fn wildcard_exports(&self, module: &str) -> BTreeMap<String, String> {
        match self.namespaces.get(module) {
            Some(namespace) => self.filter_exports(module, namespace.clone()),
            None => BTreeMap::new(),
        }
    }

    /// Module-level namespace of `module`.
    pub fn namespace(&self, module: &str) -> Option<&BTreeMap<String, String>> {
        self.namespaces.get(module)
    }

    /// Alias table of one file: its module namespace plus names bound by
    /// function-local imports.
    pub fn alias_table(&self, module: &str) -> BTreeMap<String, String> {
        let mut table = self.namespaces.get(module).cloned().unwrap_or_default();
        if let Some(info) = self.modules.get(module) {
            for binding in &info.local_bindings {
                match binding {
                    Binding::Name { bound, target } => {
                        table.entry(bound.clone()).or_insert_with(|| target.clone());
                    }
                    Binding::Wildcard { source } => {
                        for (name, target) in self.wildcard_exports(source) {
                            table.entry(name).or_insert(target);
                        }
                    }
                }
            }
        }
        table
    }

    // ------------------------------------------------------------------------
    // Equivalent modules
    // ------------------------------------------------------------------------

    fn build_equivalents(&mut self) {
        let direct: BTreeMap<&str, Vec<&str>> = self
            .modules
            .iter()
            .map(|(module, info)| {
                let sources = info
                    .bindings
                    .iter()
                    .filter_map(|b| match b {
                        Binding::Wildcard { source } => Some(source.as_str()),
                        Binding::Name { .. } => None,
                    })
                    .collect();
                (module.as_str(), sources)
            })
            .collect();

        let mut equivalents = BTreeMap::new();
        for module in direct.keys() {
            let mut visited: BTreeSet<&str> = BTreeSet::new();
            let mut pending: Vec<&str> = direct.get(module).cloned().unwrap_or_default();
            while let Some(next) = pending.pop() {
                if next == *module || !visited.insert(next) {
                    continue;
                }
                if let Some(more) = direct.get(next) {
                    pending.extend(more.iter().copied());
                }
            }
            if !visited.is_empty() {
                equivalents.insert(
                    module.to_string(),
                    visited.into_iter().map(str::to_string).collect(),
                );
            }
        }
        self.equivalents = equivalents;
    }

    /// Modules re-exported by `module` through wildcard imports, sorted.
    pub fn equivalent_modules(&self, module: &str) -> &[String] {
        self.equivalents
            .get(module)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    pub fn is_root(&self, module: &str) -> bool {
        self.modules.get(module).is_some_and(|m| m.is_root)
    }

    /// Root modules in sorted order.
    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.modules
            .iter()
            .filter(|(_, info)| info.is_root)
            .map(|(module, _)| module.as_str())
    }

    /// Longest known module that is a strict prefix of `key`, and the rest.
    pub fn split_module_prefix<'k>(&self, key: &'k str) -> Option<(&'k str, &'k str)> {
        let mut end = key.len();
        while let Some(idx) = key[..end].rfind('.') {
            let prefix = &key[..idx];
            if self.modules.contains_key(prefix) {
                return Some((prefix, &key[idx + 1..]));
            }
            end = idx;
        }
        None
    }

    /// Follow imports and wildcard re-exports until `key` names a module or
    /// a definition. Returns `None` for keys that lead nowhere in the package.
    pub fn resolve_key(&self, key: &str) -> Option<String> {
        let mut visited = HashSet::new();
        self.resolve_key_inner(key, &mut visited)
    }

    fn resolve_key_inner(&self, key: &str, visited: &mut HashSet<String>) -> Option<String> {
        if !visited.insert(key.to_string()) {
            return None;
        }
        if self.definitions.contains_key(key) || self.modules.contains_key(key) {
            return Some(key.to_string());
        }
        let (module, rest) = self.split_module_prefix(key)?;
        let (head, tail) = match rest.split_once('.') {
            Some((head, tail)) => (head, Some(tail)),
            None => (rest, None),
        };
        let target = self.namespaces.get(module)?.get(head)?;
        let next = match tail {
            Some(tail) => join_key(target, tail),
            None => target.clone(),
        };
        self.resolve_key_inner(&next, visited)
    }

    /// Qualify a dotted expression written in `module` through the module's
    /// alias table. Returns `None` when the head name is not bound there.
    pub fn qualify(&self, module: &str, text: &str) -> Option<String> {
        let (head, tail) = match text.split_once('.') {
            Some((head, tail)) => (head, Some(tail)),
            None => (text, None),
        };
        let table = self.alias_table(module);
        let target = table.get(head)?;
        Some(match tail {
            Some(tail) => join_key(target, tail),
            None => target.clone(),
        })
    }

    /// Key of a base class written as `text` in `module`.
    ///
    /// Bases bound in the module resolve to their definition when it is in
    /// the package and to the imported path otherwise. Unbound bases (such as
    /// builtins) are kept as written.
    pub fn resolve_base(&self, module: &str, text: &str) -> String {
        match self.qualify(module, text) {
            Some(qualified) => self.resolve_key(&qualified).unwrap_or(qualified),
            None => text.to_string(),
        }
    }

    // ------------------------------------------------------------------------
    // Promotion
    // ------------------------------------------------------------------------

    fn is_promotable(&self, original: &str) -> Option<DefinitionKind> {
        let kind = self.definitions.get(original).copied()?;
        if kind == DefinitionKind::Method {
            return None;
        }
        let module = parent_key(original)?;
        (!self.is_root(module)).then_some(kind)
    }

    fn build_promotions(&mut self) {
        let roots: Vec<String> = self.roots().map(str::to_string).collect();
        let mut promotions = Vec::new();
        let mut conflicts = Vec::new();

        for root in &roots {
            let Some(info) = self.modules.get(root) else {
                continue;
            };
            // name -> [(defining file, original key)]
            let mut candidates: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
            let mut offer = |name: &str, target: &str| {
                let Some(original) = self.resolve_key(target) else {
                    return;
                };
                if self.is_promotable(&original).is_none() {
                    return;
                }
                let path = parent_key(&original)
                    .and_then(|m| self.modules.get(m))
                    .map(|m| m.path.clone())
                    .unwrap_or_default();
                candidates
                    .entry(name.to_string())
                    .or_default()
                    .push((path, original));
            };

            for binding in &info.bindings {
                match binding {
                    Binding::Name { bound, target } => offer(bound, target),
                    Binding::Wildcard { source } => {
                        for (name, target) in self.wildcard_exports(source) {
                            if info
                                .all_names
                                .as_ref()
                                .is_some_and(|all| !all.contains(&name))
                            {
                                continue;
                            }
                            offer(&name, &target);
                        }
                    }
                }
            }

            for (name, mut offers) in candidates {
                if info.definitions.contains(&name) {
                    continue;
                }
                offers.sort();
                offers.dedup();
                let promoted_key = join_key(root, &name);
                let (_, original) = &offers[0];
                if offers.len() > 1 {
                    let others: Vec<&str> = offers[1..].iter().map(|(_, o)| o.as_str()).collect();
                    warn!(
                        "{}: {} provided by {} and {}; keeping {}",
                        info.path,
                        promoted_key,
                        original,
                        others.join(", "),
                        original
                    );
                    conflicts.push(Diagnostic::conflict(
                        &info.path,
                        format!(
                            "{} is provided by {} and {}; keeping {}",
                            promoted_key,
                            original,
                            others.join(", "),
                            original
                        ),
                    ));
                }
                if self.modules.contains_key(&promoted_key)
                    || self.definitions.contains_key(&promoted_key)
                {
                    conflicts.push(Diagnostic::conflict(
                        &info.path,
                        format!(
                            "cannot promote {} as {}: key already in use",
                            original, promoted_key
                        ),
                    ));
                    continue;
                }
                let Some(kind) = self.is_promotable(original) else {
                    continue;
                };
                promotions.push(Promotion {
                    promoted_key,
                    original_key: original.clone(),
                    root_module: root.clone(),
                    kind,
                });
            }
        }

        promotions.sort_by(|a, b| a.promoted_key.cmp(&b.promoted_key));
        self.promotions = promotions;
        self.conflicts.extend(conflicts);
    }

    /// Bind every promoted name of a root to the winning original, so that
    /// lookups through the root agree with the promoted entry, then rebuild
    /// the namespaces.
    fn pin_promoted_bindings(&mut self) {
        if self.promotions.is_empty() {
            return;
        }
        let mut pinned: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for promotion in &self.promotions {
            pinned
                .entry(promotion.root_module.clone())
                .or_default()
                .insert(
                    last_segment(&promotion.promoted_key).to_string(),
                    promotion.original_key.clone(),
                );
        }
        self.pinned = pinned;
        self.build_namespaces();
    }

    /// Promotions, sorted by promoted key.
    pub fn promotions(&self) -> &[Promotion] {
        &self.promotions
    }

    /// Resolution conflicts recorded while building.
    pub fn conflicts(&self) -> &[Diagnostic] {
        &self.conflicts
    }
}

/// Resolve the import statements of one file into bindings.
///
/// Returns module-level bindings and function-local bindings. Imports that
/// cannot be resolved degrade to nothing.
fn bindings_for(record: &FileRecord, known: &HashSet<String>) -> (Vec<Binding>, Vec<Binding>) {
    let mut module_level = Vec::new();
    let mut local = Vec::new();
    for import in &record.imports {
        let Some(source) = resolve_import_module(&record.module, record.is_package, import) else {
            debug!(
                "{}:{}: relative import above the top-level package",
                record.path, import.line
            );
            continue;
        };
        let out = if import.is_local {
            &mut local
        } else {
            &mut module_level
        };
        match &import.kind {
            ImportKind::Module { alias: Some(alias) } => out.push(Binding::Name {
                bound: alias.clone(),
                target: source,
            }),
            ImportKind::Module { alias: None } => {
                let head = source.split('.').next().unwrap_or(&source).to_string();
                out.push(Binding::Name {
                    bound: head.clone(),
                    target: head,
                });
            }
            ImportKind::Names { names } => {
                for name in names {
                    let target = join_key(&source, &name.name);
                    out.push(Binding::Name {
                        bound: name.bound_name().to_string(),
                        target,
                    });
                }
            }
            ImportKind::Wildcard => {
                if known.contains(&source) {
                    out.push(Binding::Wildcard { source });
                } else {
                    debug!(
                        "{}:{}: wildcard import of {} is outside the package",
                        record.path, import.line, source
                    );
                }
            }
        }
    }
    (module_level, local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ClassRecord, FunctionRecord, ImportedName};

    fn record(path: &str, module: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            module: module.to_string(),
            is_entry: false,
            is_package: path.ends_with("__init__.py"),
            doc_comment: None,
            all_names: None,
            classes: Vec::new(),
            functions: Vec::new(),
            imports: Vec::new(),
            usages: Vec::new(),
            fallback_count: 0,
        }
    }

    fn with_class(mut rec: FileRecord, name: &str) -> FileRecord {
        rec.classes.push(ClassRecord {
            name: name.to_string(),
            key: join_key(&rec.module, name),
            doc_comment: None,
            line: 1,
            bases: vec![],
            decorators: vec![],
            class_variables: vec![],
            method_names: vec![],
        });
        rec
    }

    fn with_function(mut rec: FileRecord, name: &str) -> FileRecord {
        rec.functions.push(FunctionRecord {
            name: name.to_string(),
            key: join_key(&rec.module, name),
            class_key: None,
            doc_comment: None,
            line: 1,
            return_type: None,
            arguments: vec![],
            is_async: false,
            is_static: false,
            is_classmethod: false,
            decorators: vec![],
            body: None,
        });
        rec
    }

    fn import(module: Option<&str>, level: u32, kind: ImportKind) -> ImportRecord {
        ImportRecord {
            module: module.map(str::to_string),
            level,
            kind,
            line: 1,
            is_local: false,
        }
    }

    fn names(items: &[(&str, Option<&str>)]) -> ImportKind {
        ImportKind::Names {
            names: items
                .iter()
                .map(|(n, a)| ImportedName {
                    name: n.to_string(),
                    alias: a.map(str::to_string),
                })
                .collect(),
        }
    }

    fn root(path: &str, module: &str) -> FileRecord {
        let mut rec = record(path, module);
        rec.is_entry = true;
        rec
    }

    #[test]
    fn relative_import_resolution() {
        let rel = import(Some("core"), 1, ImportKind::Wildcard);
        assert_eq!(
            resolve_import_module("pkg.sub.mod", false, &rel).as_deref(),
            Some("pkg.sub.core")
        );
        assert_eq!(
            resolve_import_module("pkg.sub", true, &rel).as_deref(),
            Some("pkg.sub.core")
        );
        let up = import(None, 2, ImportKind::Wildcard);
        assert_eq!(resolve_import_module("pkg.sub.mod", false, &up).as_deref(), Some("pkg"));
        let too_far = import(None, 3, ImportKind::Wildcard);
        assert_eq!(resolve_import_module("pkg.mod", false, &too_far), None);
        let abs = import(Some("omni.ui"), 0, ImportKind::Wildcard);
        assert_eq!(resolve_import_module("pkg", true, &abs).as_deref(), Some("omni.ui"));
    }

    #[test]
    fn wildcard_promotion_and_equivalence() {
        let mut init = root("pkg/__init__.py", "pkg");
        init.imports
            .push(import(Some("_impl"), 1, ImportKind::Wildcard));
        let imp = with_function(with_class(record("pkg/_impl.py", "pkg._impl"), "Foo"), "_hidden");

        let resolver = SymbolResolver::build(&[init, imp]);
        assert_eq!(resolver.equivalent_modules("pkg"), &["pkg._impl".to_string()]);
        assert!(resolver.is_root("pkg"));
        assert!(!resolver.is_root("pkg._impl"));

        let promoted: Vec<(&str, &str)> = resolver
            .promotions()
            .iter()
            .map(|p| (p.promoted_key.as_str(), p.original_key.as_str()))
            .collect();
        assert_eq!(promoted, vec![("pkg.Foo", "pkg._impl.Foo")]);
        assert!(resolver.conflicts().is_empty());
    }

    #[test]
    fn transitive_equivalence_with_cycle() {
        let mut a = record("pkg/a.py", "pkg.a");
        a.imports.push(import(Some("b"), 1, ImportKind::Wildcard));
        let mut b = record("pkg/b.py", "pkg.b");
        b.imports.push(import(Some("c"), 1, ImportKind::Wildcard));
        let mut c = with_class(record("pkg/c.py", "pkg.c"), "Deep");
        c.imports.push(import(Some("a"), 1, ImportKind::Wildcard));

        let resolver = SymbolResolver::build(&[a, b, c]);
        assert_eq!(
            resolver.equivalent_modules("pkg.a"),
            &["pkg.b".to_string(), "pkg.c".to_string()]
        );
        assert_eq!(
            resolver.resolve_key("pkg.a.Deep").as_deref(),
            Some("pkg.c.Deep")
        );
    }

    #[test]
    fn wildcard_without_all_skips_underscore_names() {
        let a = with_function(
            with_function(with_class(record("pkg/a.py", "pkg.a"), "Shown"), "_hidden"),
            "__getattr__",
        );
        let resolver = SymbolResolver::build(&[a]);
        let exports = resolver.wildcard_exports("pkg.a");
        assert_eq!(exports.keys().map(String::as_str).collect::<Vec<_>>(), ["Shown"]);
    }

    #[test]
    fn all_restricts_wildcard_exports() {
        let mut init = root("pkg/__init__.py", "pkg");
        init.imports.push(import(Some("_impl"), 1, ImportKind::Wildcard));
        let mut imp = with_class(with_class(record("pkg/_impl.py", "pkg._impl"), "Public"), "Other");
        imp.all_names = Some(vec!["Public".to_string()]);

        let resolver = SymbolResolver::build(&[init, imp]);
        let keys: Vec<&str> = resolver
            .promotions()
            .iter()
            .map(|p| p.promoted_key.as_str())
            .collect();
        assert_eq!(keys, vec!["pkg.Public"]);
    }

    #[test]
    fn direct_import_follows_reexport_chain() {
        let mut init = root("pkg/__init__.py", "pkg");
        init.imports
            .push(import(Some("a"), 1, names(&[("Widget", Some("W"))])));
        let mut a = record("pkg/a.py", "pkg.a");
        a.imports.push(import(Some("b"), 1, names(&[("Widget", None)])));
        let b = with_class(record("pkg/b.py", "pkg.b"), "Widget");

        let resolver = SymbolResolver::build(&[init, a, b]);
        let promotion = &resolver.promotions()[0];
        assert_eq!(promotion.promoted_key, "pkg.W");
        assert_eq!(promotion.original_key, "pkg.b.Widget");
        assert_eq!(promotion.kind, DefinitionKind::Class);
    }

    #[test]
    fn root_definition_shadows_promotion() {
        let mut init = with_class(root("pkg/__init__.py", "pkg"), "Foo");
        init.imports.push(import(Some("_impl"), 1, ImportKind::Wildcard));
        let imp = with_class(record("pkg/_impl.py", "pkg._impl"), "Foo");

        let resolver = SymbolResolver::build(&[init, imp]);
        assert!(resolver.promotions().is_empty());
        assert!(resolver.conflicts().is_empty());
    }

    #[test]
    fn duplicate_promotion_keeps_first_file() {
        let mut init = root("pkg/__init__.py", "pkg");
        init.imports.push(import(Some("_b"), 1, ImportKind::Wildcard));
        init.imports.push(import(Some("_a"), 1, ImportKind::Wildcard));
        let a = with_class(record("pkg/_a.py", "pkg._a"), "Foo");
        let b = with_class(record("pkg/_b.py", "pkg._b"), "Foo");

        let resolver = SymbolResolver::build(&[init, a, b]);
        assert_eq!(resolver.promotions().len(), 1);
        assert_eq!(resolver.promotions()[0].original_key, "pkg._a.Foo");
        assert_eq!(resolver.conflicts().len(), 1);
        assert!(resolver.conflicts()[0].message.contains("keeping pkg._a.Foo"));
    }

    #[test]
    fn namespace_follows_promotion_winner() {
        let mut init = root("pkg/__init__.py", "pkg");
        init.imports.push(import(Some("_b"), 1, ImportKind::Wildcard));
        init.imports.push(import(Some("_a"), 1, ImportKind::Wildcard));
        let a = with_class(record("pkg/_a.py", "pkg._a"), "Foo");
        let b = with_class(record("pkg/_b.py", "pkg._b"), "Foo");
        let mut user = record("pkg/user.py", "pkg.user");
        user.imports
            .push(import(Some("pkg"), 0, names(&[("Foo", None)])));

        let resolver = SymbolResolver::build(&[init, a, b, user]);
        assert_eq!(resolver.promotions()[0].original_key, "pkg._a.Foo");
        assert_eq!(
            resolver.namespace("pkg").unwrap().get("Foo").map(String::as_str),
            Some("pkg._a.Foo")
        );
        assert_eq!(resolver.resolve_key("pkg.Foo").as_deref(), Some("pkg._a.Foo"));
        assert_eq!(resolver.resolve_base("pkg.user", "Foo"), "pkg._a.Foo");
    }

    #[test]
    fn unresolvable_imports_degrade() {
        let mut init = root("pkg/__init__.py", "pkg");
        init.imports.push(import(None, 5, ImportKind::Wildcard));
        init.imports.push(import(Some("external.lib"), 0, ImportKind::Wildcard));
        init.imports
            .push(import(Some("external"), 0, names(&[("Thing", None)])));

        let resolver = SymbolResolver::build(&[init]);
        assert!(resolver.equivalent_modules("pkg").is_empty());
        assert!(resolver.promotions().is_empty());
        assert_eq!(resolver.resolve_key("external.Thing"), None);
        assert_eq!(resolver.resolve_base("pkg", "Thing"), "external.Thing");
        assert_eq!(resolver.resolve_base("pkg", "object"), "object");
    }

    #[test]
    fn module_imports_bind_head_or_alias() {
        let mut m = record("pkg/m.py", "pkg.m");
        m.imports.push(import(Some("pkg.sub"), 0, ImportKind::Module { alias: None }));
        m.imports.push(import(
            Some("pkg.sub"),
            0,
            ImportKind::Module {
                alias: Some("s".to_string()),
            },
        ));
        let sub = with_class(record("pkg/sub.py", "pkg.sub"), "Thing");

        let resolver = SymbolResolver::build(&[m, sub]);
        assert_eq!(resolver.qualify("pkg.m", "s.Thing").as_deref(), Some("pkg.sub.Thing"));
        assert_eq!(
            resolver.qualify("pkg.m", "pkg.sub.Thing").as_deref(),
            Some("pkg.sub.Thing")
        );
        assert_eq!(
            resolver.resolve_key("pkg.m.s.Thing").as_deref(),
            Some("pkg.sub.Thing")
        );
    }
}
