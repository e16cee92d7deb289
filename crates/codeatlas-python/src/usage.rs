//! Usage index: which registered symbols use which.
//!
//! Every usage candidate recorded by the extractor is resolved to a symbol
//! key, and the referencing key is added to that target's list. Candidates
//! that do not resolve to a class, function or method of the package are
//! dropped.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use codeatlas_core::key::{join_key, last_segment};

use crate::record::{FileRecord, UsageCandidate};
use crate::resolver::SymbolResolver;

/// Every key a usage may point at, mapped to its original key when the entry
/// is a promoted copy.
pub type SymbolTargets = BTreeMap<String, Option<String>>;

/// Resolves usage candidates against one package.
pub struct UsageIndexer<'a> {
    resolver: &'a SymbolResolver,
    targets: &'a SymbolTargets,
    aliases: HashMap<String, BTreeMap<String, String>>,
}

impl<'a> UsageIndexer<'a> {
    pub fn new(resolver: &'a SymbolResolver, targets: &'a SymbolTargets) -> Self {
        UsageIndexer {
            resolver,
            targets,
            aliases: HashMap::new(),
        }
    }

    /// Build the reverse index: target key -> sorted referencing keys.
    pub fn index<'r>(
        mut self,
        records: impl IntoIterator<Item = &'r FileRecord>,
    ) -> BTreeMap<String, Vec<String>> {
        let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for record in records {
            for candidate in &record.usages {
                let Some(target) = self.resolve(&record.module, candidate) else {
                    continue;
                };
                if target == candidate.referrer {
                    continue;
                }
                if let Some(Some(original)) = self.targets.get(&target) {
                    if *original != candidate.referrer {
                        edges
                            .entry(original.clone())
                            .or_default()
                            .insert(candidate.referrer.clone());
                    }
                }
                edges
                    .entry(target)
                    .or_default()
                    .insert(candidate.referrer.clone());
            }
        }
        edges
            .into_iter()
            .map(|(target, referrers)| (target, referrers.into_iter().collect()))
            .collect()
    }

    fn alias_table(&mut self, module: &str) -> &BTreeMap<String, String> {
        let resolver = self.resolver;
        self.aliases
            .entry(module.to_string())
            .or_insert_with(|| resolver.alias_table(module))
    }

    /// Resolve one candidate to a target key.
    pub fn resolve(&mut self, module: &str, candidate: &UsageCandidate) -> Option<String> {
        let text = candidate.text.as_str();
        let (head, tail) = match text.split_once('.') {
            Some((head, tail)) => (head, Some(tail)),
            None => (text, None),
        };

        // `self.x` / `cls.x` inside a class.
        if head == "self" || head == "cls" {
            let class_key = candidate.class_key.as_deref()?;
            let tail = tail?;
            let qualified = join_key(class_key, tail);
            return self.match_shortening(&qualified, class_key.split('.').count() + 1);
        }

        let qualified = match self.alias_table(module).get(head) {
            Some(target) => match tail {
                Some(tail) => join_key(target, tail),
                None => target.clone(),
            },
            None => join_key(module, text),
        };
        let min_segments = qualified.split('.').count() - tail.map_or(0, |t| t.split('.').count());
        if let Some(found) = self.match_shortening(&qualified, min_segments) {
            return Some(found);
        }
        self.suffix_match(module, text)
    }

    /// Exact match, then resolution through the resolver, dropping trailing
    /// segments (attribute access on a known symbol) down to `min_segments`.
    fn match_shortening(&self, qualified: &str, min_segments: usize) -> Option<String> {
        let mut current = qualified;
        loop {
            if let Some(found) = self.match_key(current) {
                return Some(found);
            }
            if current.split('.').count() <= min_segments.max(1) {
                return None;
            }
            current = match current.rfind('.') {
                Some(idx) => &current[..idx],
                None => return None,
            };
        }
    }

    fn match_key(&self, key: &str) -> Option<String> {
        if self.targets.contains_key(key) {
            return Some(key.to_string());
        }
        self.resolver
            .resolve_key(key)
            .filter(|resolved| self.targets.contains_key(resolved))
    }

    /// A unique alias-table target ending in `.<last segment>`.
    fn suffix_match(&mut self, module: &str, text: &str) -> Option<String> {
        let suffix = format!(".{}", last_segment(text));
        let candidates: Vec<String> = self
            .alias_table(module)
            .values()
            .filter(|target| target.ends_with(&suffix))
            .cloned()
            .collect();
        let mut matches: BTreeSet<String> = BTreeSet::new();
        for target in candidates {
            if let Some(found) = self.match_key(&target) {
                matches.insert(found);
            }
        }
        if matches.len() == 1 {
            matches.into_iter().next()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{ClassRecord, FunctionRecord, ImportKind, ImportRecord, ImportedName};

    fn record(path: &str, module: &str) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            module: module.to_string(),
            is_entry: path.ends_with("__init__.py"),
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

    fn class(rec: &mut FileRecord, name: &str, methods: &[&str]) {
        let key = join_key(&rec.module, name);
        for method in methods {
            rec.functions.push(FunctionRecord {
                name: method.to_string(),
                key: join_key(&key, method),
                class_key: Some(key.clone()),
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
        }
        rec.classes.push(ClassRecord {
            name: name.to_string(),
            key,
            doc_comment: None,
            line: 1,
            bases: vec![],
            decorators: vec![],
            class_variables: vec![],
            method_names: methods.iter().map(|m| m.to_string()).collect(),
        });
    }

    fn uses(rec: &mut FileRecord, referrer: &str, text: &str, class_key: Option<&str>) {
        rec.usages.push(UsageCandidate {
            referrer: referrer.to_string(),
            text: text.to_string(),
            class_key: class_key.map(str::to_string),
        });
    }

    fn targets_for(records: &[FileRecord], promoted: &[(&str, &str)]) -> SymbolTargets {
        let mut targets = SymbolTargets::new();
        for rec in records {
            for c in &rec.classes {
                targets.insert(c.key.clone(), None);
            }
            for f in &rec.functions {
                targets.insert(f.key.clone(), None);
            }
        }
        for (promoted, original) in promoted {
            targets.insert(promoted.to_string(), Some(original.to_string()));
        }
        targets
    }

    #[test]
    fn resolves_imports_self_and_promoted() {
        let mut init = record("pkg/__init__.py", "pkg");
        init.imports.push(ImportRecord {
            module: Some("_impl".to_string()),
            level: 1,
            kind: ImportKind::Wildcard,
            line: 1,
            is_local: false,
        });
        let mut imp = record("pkg/_impl.py", "pkg._impl");
        class(&mut imp, "Widget", &["show", "hide"]);
        uses(&mut imp, "pkg._impl.Widget.show", "self.hide", Some("pkg._impl.Widget"));
        uses(&mut imp, "pkg._impl.Widget.show", "self.show", Some("pkg._impl.Widget"));
        uses(&mut imp, "pkg._impl.Widget.show", "self.missing", Some("pkg._impl.Widget"));

        let mut app = record("pkg/app.py", "pkg.app");
        app.imports.push(ImportRecord {
            module: Some("pkg".to_string()),
            level: 0,
            kind: ImportKind::Module { alias: None },
            line: 1,
            is_local: false,
        });
        app.imports.push(ImportRecord {
            module: Some("_impl".to_string()),
            level: 1,
            kind: ImportKind::Names {
                names: vec![ImportedName {
                    name: "Widget".to_string(),
                    alias: Some("W".to_string()),
                }],
            },
            line: 2,
            is_local: false,
        });
        class(&mut app, "App", &["run"]);
        uses(&mut app, "pkg.app.App.run", "pkg.Widget", Some("pkg.app.App"));
        uses(&mut app, "pkg.app.App.run", "W.hide", Some("pkg.app.App"));
        uses(&mut app, "pkg.app.App.run", "W.title.upper", Some("pkg.app.App"));
        uses(&mut app, "pkg.app.App.run", "print", Some("pkg.app.App"));

        let records = vec![init, imp, app];
        let resolver = SymbolResolver::build(&records);
        let targets = targets_for(&records, &[("pkg.Widget", "pkg._impl.Widget")]);
        let index = UsageIndexer::new(&resolver, &targets).index(&records);

        assert_eq!(
            index.get("pkg._impl.Widget.hide").unwrap(),
            &vec!["pkg._impl.Widget.show".to_string(), "pkg.app.App.run".to_string()]
        );
        assert_eq!(
            index.get("pkg.Widget").unwrap(),
            &vec!["pkg.app.App.run".to_string()]
        );
        // Promoted target is mirrored on the original; `W.title.upper` shortens to Widget.
        assert_eq!(
            index.get("pkg._impl.Widget").unwrap(),
            &vec!["pkg.app.App.run".to_string()]
        );
        // Self-reference dropped.
        assert!(!index.contains_key("pkg._impl.Widget.show"));
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn suffix_match_requires_unique_target() {
        let mut a = record("pkg/a.py", "pkg.a");
        class(&mut a, "Thing", &[]);
        let mut b = record("pkg/b.py", "pkg.b");
        class(&mut b, "Thing", &[]);
        let mut c = record("pkg/c.py", "pkg.c");
        c.imports.push(ImportRecord {
            module: Some("a".to_string()),
            level: 1,
            kind: ImportKind::Names {
                names: vec![ImportedName {
                    name: "Thing".to_string(),
                    alias: Some("AThing".to_string()),
                }],
            },
            line: 1,
            is_local: false,
        });
        class(&mut c, "User", &[]);
        uses(&mut c, "pkg.c.User", "other.Thing", Some("pkg.c.User"));

        let records = vec![a, b, c];
        let resolver = SymbolResolver::build(&records);
        let targets = targets_for(&records, &[]);
        let index = UsageIndexer::new(&resolver, &targets).index(&records);
        assert_eq!(index.get("pkg.a.Thing").unwrap(), &vec!["pkg.c.User".to_string()]);
        assert!(!index.contains_key("pkg.b.Thing"));
    }
}
