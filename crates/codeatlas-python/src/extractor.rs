//! Symbol extraction from one parsed file.
//!
//! Walks the tree-sitter tree of a file and produces a [`FileRecord`]:
//! module docstring and `__all__`, module-level classes and functions (also
//! those nested in module-level `if`/`try`/`with` blocks), methods, imports
//! and the dotted names used inside class and function bodies.
//!
//! Functions and classes nested inside a function body are not registered;
//! names used in them are attributed to the enclosing registered symbol.

use std::collections::HashSet;

use tracing::debug;
use tree_sitter::Node;

use codeatlas_core::key::{is_dotted_identifier, join_key};

use crate::files::SourceFile;
use crate::parser::ParsedFile;
use crate::record::{
    ArgumentRecord, BodyText, ClassRecord, FileRecord, FunctionRecord, ImportKind, ImportRecord,
    ImportedName, UsageCandidate,
};
use crate::text::{
    clean_docstring, collapse_whitespace, dedent, is_format_string, line_start,
    string_literal_value,
};

/// Extract the records of one file.
pub fn extract_file(parsed: &ParsedFile, file: &SourceFile, include_body: bool) -> FileRecord {
    let mut extractor = Extractor {
        source: &parsed.source,
        module: &file.module_name,
        include_body,
        seen: HashSet::new(),
        record: FileRecord {
            path: file.rel_path.clone(),
            module: file.module_name.clone(),
            is_entry: file.is_entry,
            is_package: file.rel_path.ends_with("__init__.py"),
            doc_comment: None,
            all_names: None,
            classes: Vec::new(),
            functions: Vec::new(),
            imports: Vec::new(),
            usages: Vec::new(),
            fallback_count: 0,
        },
    };
    let root = parsed.root();
    extractor.record.doc_comment = extractor.docstring(root);
    extractor.visit_module_block(root);

    let mut record = extractor.record;
    record.usages.sort();
    record.usages.dedup();
    record
}

fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

fn line_of(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

fn is_clause(kind: &str) -> bool {
    matches!(
        kind,
        "elif_clause" | "else_clause" | "except_clause" | "except_group_clause" | "finally_clause"
    )
}

/// Blocks of a compound statement, including those of its clauses.
fn compound_blocks(node: Node<'_>) -> Vec<Node<'_>> {
    let mut blocks = Vec::new();
    for child in named_children(node) {
        if child.kind() == "block" {
            blocks.push(child);
        } else if is_clause(child.kind()) {
            blocks.extend(compound_blocks(child));
        }
    }
    blocks
}

struct Extractor<'a> {
    source: &'a str,
    module: &'a str,
    include_body: bool,
    /// Keys registered so far; later definitions with the same key lose.
    seen: HashSet<String>,
    record: FileRecord,
}

impl<'a> Extractor<'a> {
    fn text(&self, node: Node<'_>) -> &'a str {
        let source: &'a str = self.source;
        node.utf8_text(source.as_bytes()).unwrap_or("")
    }

    // ------------------------------------------------------------------------
    // Module level
    // ------------------------------------------------------------------------

    fn visit_module_block(&mut self, block: Node<'_>) {
        for stmt in named_children(block) {
            match stmt.kind() {
                "class_definition" => self.visit_class(stmt, &[]),
                "function_definition" => self.visit_function(stmt, None, &[]),
                "decorated_definition" => self.visit_decorated(stmt),
                "import_statement" | "import_from_statement" => self.visit_import(stmt, false),
                "expression_statement" => self.visit_module_assignment(stmt),
                "if_statement" | "try_statement" | "with_statement" => {
                    for inner in compound_blocks(stmt) {
                        self.visit_module_block(inner);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_module_assignment(&mut self, stmt: Node<'_>) {
        for expr in named_children(stmt) {
            let (Some(left), Some(right)) = (
                expr.child_by_field_name("left"),
                expr.child_by_field_name("right"),
            ) else {
                continue;
            };
            if self.text(left) != "__all__" {
                continue;
            }
            let Some(names) = self.string_sequence(right) else {
                debug!("{}: __all__ is not a literal sequence", self.record.path);
                continue;
            };
            match expr.kind() {
                "assignment" => self.record.all_names = Some(names),
                "augmented_assignment" => self
                    .record
                    .all_names
                    .get_or_insert_with(Vec::new)
                    .extend(names),
                _ => {}
            }
        }
    }

    /// String items of a list or tuple literal.
    fn string_sequence(&self, node: Node<'_>) -> Option<Vec<String>> {
        if !matches!(node.kind(), "list" | "tuple") {
            return None;
        }
        let mut names = Vec::new();
        for item in named_children(node) {
            if item.kind() == "string" {
                if let Some(value) = string_literal_value(self.text(item)) {
                    names.push(value.to_string());
                }
            }
        }
        Some(names)
    }

    fn docstring(&self, block: Node<'_>) -> Option<String> {
        let first = named_children(block)
            .into_iter()
            .find(|n| n.kind() != "comment")?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let expr = named_children(first).into_iter().next()?;
        if expr.kind() != "string" {
            return None;
        }
        let literal = self.text(expr);
        if is_format_string(literal) {
            return None;
        }
        clean_docstring(string_literal_value(literal)?)
    }

    // ------------------------------------------------------------------------
    // Imports
    // ------------------------------------------------------------------------

    fn visit_import(&mut self, stmt: Node<'_>, is_local: bool) {
        let line = line_of(stmt);
        match stmt.kind() {
            "import_statement" => {
                for name in field_children(stmt, "name") {
                    let (module, alias) = self.import_target(name);
                    if module.is_empty() {
                        continue;
                    }
                    self.record.imports.push(ImportRecord {
                        module: Some(module),
                        level: 0,
                        kind: ImportKind::Module { alias },
                        line,
                        is_local,
                    });
                }
            }
            "import_from_statement" => {
                let Some(source) = stmt.child_by_field_name("module_name") else {
                    return;
                };
                let (module, level) = self.import_source(source);
                let kind = if children(stmt).iter().any(|c| c.kind() == "wildcard_import") {
                    ImportKind::Wildcard
                } else {
                    let names = field_children(stmt, "name")
                        .into_iter()
                        .map(|n| {
                            let (name, alias) = self.import_target(n);
                            ImportedName { name, alias }
                        })
                        .filter(|n| !n.name.is_empty())
                        .collect();
                    ImportKind::Names { names }
                };
                self.record.imports.push(ImportRecord {
                    module,
                    level,
                    kind,
                    line,
                    is_local,
                });
            }
            _ => {}
        }
    }

    /// `a.b` or `a.b as c`.
    fn import_target(&self, node: Node<'_>) -> (String, Option<String>) {
        if node.kind() == "aliased_import" {
            let name = node
                .child_by_field_name("name")
                .map(|n| self.text(n).to_string())
                .unwrap_or_default();
            let alias = node
                .child_by_field_name("alias")
                .map(|n| self.text(n).to_string());
            (name, alias)
        } else {
            (self.text(node).to_string(), None)
        }
    }

    /// Module text and relative level of a `from` clause.
    fn import_source(&self, node: Node<'_>) -> (Option<String>, u32) {
        if node.kind() != "relative_import" {
            return (Some(self.text(node).to_string()), 0);
        }
        let mut level = 0;
        let mut module = None;
        for child in named_children(node) {
            match child.kind() {
                "import_prefix" => level = self.text(child).matches('.').count() as u32,
                "dotted_name" => module = Some(self.text(child).to_string()),
                _ => {}
            }
        }
        (module, level)
    }

    // ------------------------------------------------------------------------
    // Definitions
    // ------------------------------------------------------------------------

    fn visit_decorated(&mut self, node: Node<'_>) {
        let decorators = decorator_nodes(node);
        let Some(definition) = node.child_by_field_name("definition") else {
            return;
        };
        match definition.kind() {
            "function_definition" => self.visit_function(definition, None, &decorators),
            "class_definition" => self.visit_class(definition, &decorators),
            _ => {}
        }
    }

    fn decorator_text(&self, decorator: Node<'_>) -> Option<String> {
        let expr = named_children(decorator)
            .into_iter()
            .find(|n| n.kind() != "comment")?;
        Some(collapse_whitespace(self.text(expr)))
    }

    fn register(&mut self, key: &str, line: u32) -> bool {
        if self.seen.insert(key.to_string()) {
            true
        } else {
            debug!(
                "{}:{}: {} already defined in this file, keeping the first",
                self.record.path, line, key
            );
            false
        }
    }

    fn visit_class(&mut self, node: Node<'_>, decorators: &[Node<'_>]) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();
        let key = join_key(self.module, &name);
        let line = line_of(node);
        if !self.register(&key, line) {
            return;
        }

        let mut decorator_names = Vec::new();
        for decorator in decorators {
            if let Some(text) = self.decorator_text(*decorator) {
                decorator_names.push(text);
            }
            self.collect_usages(*decorator, &key, Some(&key));
        }

        let mut bases = Vec::new();
        if let Some(args) = node.child_by_field_name("superclasses") {
            for arg in named_children(args) {
                match arg.kind() {
                    "comment" => {}
                    "keyword_argument" | "list_splat" | "dictionary_splat" => {
                        self.collect_usages(arg, &key, Some(&key))
                    }
                    _ => {
                        bases.push(collapse_whitespace(self.text(arg)));
                        self.collect_usages(arg, &key, Some(&key));
                    }
                }
            }
        }

        let mut doc_comment = None;
        let mut class_variables: Vec<String> = Vec::new();
        let mut method_names: Vec<String> = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            doc_comment = self.docstring(body);
            for stmt in named_children(body) {
                match stmt.kind() {
                    "function_definition" => {
                        if let Some(method) = self.visit_method(stmt, &key, &[]) {
                            method_names.push(method);
                        }
                    }
                    "decorated_definition" => {
                        let decorators = decorator_nodes(stmt);
                        match stmt.child_by_field_name("definition") {
                            Some(def) if def.kind() == "function_definition" => {
                                if let Some(method) = self.visit_method(def, &key, &decorators) {
                                    method_names.push(method);
                                }
                            }
                            _ => self.collect_usages(stmt, &key, Some(&key)),
                        }
                    }
                    "expression_statement" => {
                        for expr in named_children(stmt) {
                            // `a = b = 0` nests the second assignment on the right.
                            let mut current = Some(expr);
                            while let Some(assign) = current.filter(|n| n.kind() == "assignment") {
                                if let Some(left) = assign.child_by_field_name("left") {
                                    self.target_names(left, &mut class_variables);
                                }
                                current = assign.child_by_field_name("right");
                            }
                        }
                        self.collect_usages(stmt, &key, Some(&key));
                    }
                    _ => self.collect_usages(stmt, &key, Some(&key)),
                }
            }
        }
        dedup_in_order(&mut class_variables);
        dedup_in_order(&mut method_names);

        self.record.classes.push(ClassRecord {
            name,
            key,
            doc_comment,
            line,
            bases,
            decorators: decorator_names,
            class_variables,
            method_names,
        });
    }

    /// Plain names bound by an assignment target.
    fn target_names(&self, target: Node<'_>, out: &mut Vec<String>) {
        match target.kind() {
            "identifier" => out.push(self.text(target).to_string()),
            "pattern_list" | "tuple_pattern" | "list_pattern" => {
                for child in named_children(target) {
                    self.target_names(child, out);
                }
            }
            _ => {}
        }
    }

    fn visit_method(
        &mut self,
        node: Node<'_>,
        class_key: &str,
        decorators: &[Node<'_>],
    ) -> Option<String> {
        let count = self.record.functions.len();
        self.visit_function(node, Some(class_key), decorators);
        if self.record.functions.len() > count {
            self.record.functions.last().map(|f| f.name.clone())
        } else {
            None
        }
    }

    fn visit_function(&mut self, node: Node<'_>, class_key: Option<&str>, decorators: &[Node<'_>]) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();
        let key = join_key(class_key.unwrap_or(self.module), &name);
        let line = line_of(node);
        if !self.register(&key, line) {
            // Property setters and overloads: usages still count for the first.
            self.collect_function_usages(node, &key, class_key);
            return;
        }

        let decorator_names: Vec<String> = decorators
            .iter()
            .filter_map(|d| self.decorator_text(*d))
            .collect();
        for decorator in decorators {
            self.collect_usages(*decorator, &key, class_key);
        }
        let is_static = decorator_names.iter().any(|d| d == "staticmethod");
        let is_classmethod = decorator_names.iter().any(|d| d == "classmethod");
        let is_async = children(node).iter().any(|c| c.kind() == "async");

        let arguments = node
            .child_by_field_name("parameters")
            .map(|params| self.arguments(params))
            .unwrap_or_default();
        let return_type = node
            .child_by_field_name("return_type")
            .map(|ret| self.render(ret));

        let body = node.child_by_field_name("body");
        let doc_comment = body.and_then(|b| self.docstring(b));
        let body_text = if self.include_body {
            body.map(|b| self.body_text(b))
        } else {
            None
        };

        self.collect_function_usages(node, &key, class_key);

        self.record.functions.push(FunctionRecord {
            name,
            key,
            class_key: class_key.map(str::to_string),
            doc_comment,
            line,
            return_type,
            arguments,
            is_async,
            is_static,
            is_classmethod,
            decorators: decorator_names,
            body: body_text,
        });
    }

    fn collect_function_usages(&mut self, node: Node<'_>, key: &str, class_key: Option<&str>) {
        if let Some(params) = node.child_by_field_name("parameters") {
            self.collect_usages(params, key, class_key);
        }
        if let Some(ret) = node.child_by_field_name("return_type") {
            self.collect_usages(ret, key, class_key);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.collect_usages(body, key, class_key);
        }
    }

    fn arguments(&mut self, params: Node<'_>) -> Vec<ArgumentRecord> {
        let mut arguments = Vec::new();
        for param in named_children(params) {
            let argument = match param.kind() {
                "identifier" => Some(ArgumentRecord {
                    name: self.text(param).to_string(),
                    type_text: None,
                    default_text: None,
                    is_variadic: false,
                }),
                "list_splat_pattern" | "dictionary_splat_pattern" => {
                    self.splat_name(param).map(|name| ArgumentRecord {
                        name,
                        type_text: None,
                        default_text: None,
                        is_variadic: true,
                    })
                }
                "typed_parameter" => {
                    let inner = named_children(param)
                        .into_iter()
                        .find(|n| n.kind() != "type");
                    let type_text = param.child_by_field_name("type").map(|t| self.render(t));
                    inner.and_then(|inner| {
                        let is_variadic = matches!(
                            inner.kind(),
                            "list_splat_pattern" | "dictionary_splat_pattern"
                        );
                        let name = if is_variadic {
                            self.splat_name(inner)?
                        } else {
                            self.text(inner).to_string()
                        };
                        Some(ArgumentRecord {
                            name,
                            type_text,
                            default_text: None,
                            is_variadic,
                        })
                    })
                }
                "default_parameter" | "typed_default_parameter" => {
                    let name = param
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string());
                    let type_text = param.child_by_field_name("type").map(|t| self.render(t));
                    let default_text = param.child_by_field_name("value").map(|v| self.render(v));
                    name.map(|name| ArgumentRecord {
                        name,
                        type_text,
                        default_text,
                        is_variadic: false,
                    })
                }
                _ => None,
            };
            if let Some(argument) = argument {
                arguments.push(argument);
            }
        }
        arguments
    }

    fn splat_name(&self, splat: Node<'_>) -> Option<String> {
        named_children(splat)
            .into_iter()
            .find(|n| n.kind() == "identifier")
            .map(|n| self.text(n).to_string())
    }

    /// Display text of an annotation or default value.
    ///
    /// Placeholders that are not a clean literal (an ellipsis, text spanning
    /// lines) are rendered through a textual fallback and counted.
    fn render(&mut self, node: Node<'_>) -> String {
        let inner = if node.kind() == "type" {
            named_children(node).into_iter().next().unwrap_or(node)
        } else {
            node
        };
        let text = self.text(inner);
        if inner.kind() == "ellipsis" {
            self.fallback(inner, "ellipsis placeholder");
            return "...".to_string();
        }
        if text.trim().is_empty() {
            self.fallback(inner, "empty expression");
            return inner.kind().to_string();
        }
        if text.contains('\n') {
            self.fallback(inner, "multi-line expression");
            return collapse_whitespace(text);
        }
        text.to_string()
    }

    fn fallback(&mut self, node: Node<'_>, what: &str) {
        self.record.fallback_count += 1;
        debug!(
            "{}:{}: structural fallback for {}",
            self.record.path,
            line_of(node),
            what
        );
    }

    fn body_text(&self, body: Node<'_>) -> BodyText {
        let start = body.start_byte();
        let end = body.end_byte();
        let line_begin = line_start(self.source, start);
        let prefix = &self.source[line_begin..start];
        let text = if prefix.trim().is_empty() {
            dedent(&self.source[line_begin..end])
        } else {
            self.source[start..end].to_string()
        };
        BodyText {
            text,
            line: line_of(body),
        }
    }

    // ------------------------------------------------------------------------
    // Usage candidates
    // ------------------------------------------------------------------------

    fn push_usage(&mut self, referrer: &str, text: &str, class_key: Option<&str>) {
        if text.is_empty() || text == "self" || text == "cls" || !is_dotted_identifier(text) {
            return;
        }
        self.record.usages.push(UsageCandidate {
            referrer: referrer.to_string(),
            text: text.to_string(),
            class_key: class_key.map(str::to_string),
        });
    }

    /// `a.b.c` for an identifier or attribute chain of identifiers.
    fn dotted_name(&self, node: Node<'_>) -> Option<String> {
        match node.kind() {
            "identifier" => Some(self.text(node).to_string()),
            "attribute" => {
                let object = self.dotted_name(node.child_by_field_name("object")?)?;
                let attribute = self.text(node.child_by_field_name("attribute")?);
                Some(format!("{}.{}", object, attribute))
            }
            _ => None,
        }
    }

    fn collect_fields(&mut self, node: Node<'_>, fields: &[&str], referrer: &str, class_key: Option<&str>) {
        for field in fields {
            for child in field_children(node, field) {
                self.collect_usages(child, referrer, class_key);
            }
        }
    }

    fn collect_except_field(&mut self, node: Node<'_>, skip: &str, referrer: &str, class_key: Option<&str>) {
        let skipped = node.child_by_field_name(skip).map(|n| n.id());
        for child in named_children(node) {
            if Some(child.id()) != skipped {
                self.collect_usages(child, referrer, class_key);
            }
        }
    }

    fn collect_usages(&mut self, node: Node<'_>, referrer: &str, class_key: Option<&str>) {
        match node.kind() {
            "identifier" => {
                let text = self.text(node);
                self.push_usage(referrer, text, class_key);
            }
            "attribute" => match self.dotted_name(node) {
                Some(dotted) => self.push_usage(referrer, &dotted, class_key),
                None => {
                    if let Some(object) = node.child_by_field_name("object") {
                        self.collect_usages(object, referrer, class_key);
                    }
                }
            },
            "type" => {
                // Forward references written as strings.
                let inner = named_children(node).into_iter().next();
                match inner {
                    Some(s) if s.kind() == "string" => {
                        if let Some(value) = string_literal_value(self.text(s)) {
                            self.push_usage(referrer, value.trim(), class_key);
                        }
                    }
                    _ => {
                        for child in named_children(node) {
                            self.collect_usages(child, referrer, class_key);
                        }
                    }
                }
            }
            "string" | "concatenated_string" => {
                for child in named_children(node) {
                    if matches!(child.kind(), "interpolation" | "string") {
                        self.collect_usages(child, referrer, class_key);
                    }
                }
            }
            "interpolation" => self.collect_fields(node, &["expression"], referrer, class_key),
            "import_statement" | "import_from_statement" => self.visit_import(node, true),
            "comment" | "future_import_statement" | "global_statement" | "nonlocal_statement"
            | "keyword_separator" | "positional_separator" | "list_splat_pattern"
            | "dictionary_splat_pattern" | "pass_statement" => {}
            "keyword_argument" => self.collect_fields(node, &["value"], referrer, class_key),
            "assignment" => self.collect_fields(node, &["type", "right"], referrer, class_key),
            "augmented_assignment" => self.collect_fields(node, &["right"], referrer, class_key),
            "named_expression" => self.collect_fields(node, &["value"], referrer, class_key),
            "lambda" => self.collect_fields(node, &["body"], referrer, class_key),
            "for_statement" | "for_in_clause" => {
                self.collect_except_field(node, "left", referrer, class_key)
            }
            "as_pattern" => self.collect_except_field(node, "alias", referrer, class_key),
            "function_definition" => self.collect_fields(
                node,
                &["parameters", "return_type", "body"],
                referrer,
                class_key,
            ),
            "class_definition" => {
                self.collect_fields(node, &["superclasses", "body"], referrer, class_key)
            }
            "typed_parameter" => self.collect_fields(node, &["type"], referrer, class_key),
            "default_parameter" => self.collect_fields(node, &["value"], referrer, class_key),
            "typed_default_parameter" => {
                self.collect_fields(node, &["type", "value"], referrer, class_key)
            }
            "except_clause" => {
                let mut skip_next = false;
                for child in children(node) {
                    if child.kind() == "as" {
                        skip_next = true;
                        continue;
                    }
                    if !child.is_named() {
                        continue;
                    }
                    if skip_next {
                        skip_next = false;
                        continue;
                    }
                    self.collect_usages(child, referrer, class_key);
                }
            }
            _ => {
                for child in named_children(node) {
                    self.collect_usages(child, referrer, class_key);
                }
            }
        }
    }
}

fn decorator_nodes(node: Node<'_>) -> Vec<Node<'_>> {
    named_children(node)
        .into_iter()
        .filter(|n| n.kind() == "decorator")
        .collect()
}

fn dedup_in_order(items: &mut Vec<String>) {
    let mut seen = HashSet::new();
    items.retain(|item| seen.insert(item.clone()));
}
