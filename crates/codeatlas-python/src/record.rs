//! Per-file records produced by the extractor.
//!
//! Records are plain immutable values. Everything package-wide (resolution,
//! usage edges, promotion) is derived from them later without mutating them.

/// Everything extracted from one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Package-relative path.
    pub path: String,
    /// Module key.
    pub module: String,
    /// The file is a declared entry point (`__init__.py` of a declared module).
    pub is_entry: bool,
    /// `__init__.py` files are packages; relative imports resolve from them.
    pub is_package: bool,
    pub doc_comment: Option<String>,
    /// Declared `__all__`, if any.
    pub all_names: Option<Vec<String>>,
    pub classes: Vec<ClassRecord>,
    /// Module-level functions and methods.
    pub functions: Vec<FunctionRecord>,
    pub imports: Vec<ImportRecord>,
    pub usages: Vec<UsageCandidate>,
    /// Annotations and defaults rendered through a textual fallback.
    pub fallback_count: usize,
}

impl FileRecord {
    /// Names of module-level classes.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|c| c.name.as_str())
    }

    /// Names of module-level functions.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions
            .iter()
            .filter(|f| f.class_key.is_none())
            .map(|f| f.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassRecord {
    pub name: String,
    pub key: String,
    pub doc_comment: Option<String>,
    pub line: u32,
    /// Base class expressions as written.
    pub bases: Vec<String>,
    pub decorators: Vec<String>,
    pub class_variables: Vec<String>,
    pub method_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentRecord {
    pub name: String,
    pub type_text: Option<String>,
    pub default_text: Option<String>,
    pub is_variadic: bool,
}

/// Source text of a function body and the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyText {
    pub text: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    pub name: String,
    pub key: String,
    /// Key of the enclosing class for methods.
    pub class_key: Option<String>,
    pub doc_comment: Option<String>,
    pub line: u32,
    pub return_type: Option<String>,
    pub arguments: Vec<ArgumentRecord>,
    pub is_async: bool,
    pub is_static: bool,
    pub is_classmethod: bool,
    pub decorators: Vec<String>,
    pub body: Option<BodyText>,
}

/// One name brought in by `from x import a as b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedName {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportedName {
    /// The name bound in the importing module.
    pub fn bound_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportKind {
    /// `import a.b` or `import a.b as c`.
    Module { alias: Option<String> },
    /// `from x import a, b as c`.
    Names { names: Vec<ImportedName> },
    /// `from x import *`.
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    /// Dotted module text; `None` for `from . import x`.
    pub module: Option<String>,
    /// Number of leading dots.
    pub level: u32,
    pub kind: ImportKind,
    pub line: u32,
    /// Import inside a function or class body.
    pub is_local: bool,
}

/// A dotted name used inside a class or function.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UsageCandidate {
    /// Key of the registered symbol the name appears in.
    pub referrer: String,
    /// Dotted name as written (`self.show`, `ui.Window`).
    pub text: String,
    /// Class whose `self`/`cls` the name may start with.
    pub class_key: Option<String>,
}
