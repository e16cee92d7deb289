//! Symbol keys and external symbol references.
//!
//! A symbol key is a dotted path (`pkg.module.Class.method`). Keys are the
//! only way atlas entries point at each other, so every table in the atlas is
//! a flat map keyed by them.
//!
//! External tooling refers to symbols as `package_or_module@symbol_path`
//! (for example `omni.ui@Window.show`); [`SymbolRef`] parses that form.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Join a parent key and a child name into a child key.
///
/// An empty parent yields the bare name.
pub fn join_key(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

/// Return the parent part of a key (`a.b.c` -> `a.b`), or `None` for a
/// single-segment key.
pub fn parent_key(key: &str) -> Option<&str> {
    key.rfind('.').map(|idx| &key[..idx])
}

/// Return the last segment of a key (`a.b.c` -> `c`).
pub fn last_segment(key: &str) -> &str {
    match key.rfind('.') {
        Some(idx) => &key[idx + 1..],
        None => key,
    }
}

/// True if every dotted segment of `text` is a valid identifier.
pub fn is_dotted_identifier(text: &str) -> bool {
    !text.is_empty()
        && text.split('.').all(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(c) if c == '_' || c.is_alphabetic() => {
                    chars.all(|c| c == '_' || c.is_alphanumeric())
                }
                _ => false,
            }
        })
}

/// A parsed `package_or_module@symbol_path` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolRef {
    /// Package or module part (`omni.ui`).
    pub module: String,
    /// Symbol path inside the module (`Window.show`). Empty for the module itself.
    pub symbol_path: String,
}

impl SymbolRef {
    /// Create a reference from its two parts.
    pub fn new(module: impl Into<String>, symbol_path: impl Into<String>) -> Self {
        SymbolRef {
            module: module.into(),
            symbol_path: symbol_path.into(),
        }
    }

    /// Parse a reference.
    ///
    /// Accepts `module@path`, `module@` (the module itself) and a plain
    /// dotted key, which is treated as a module-less reference whose key is
    /// the text itself. Returns `None` for malformed input.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        match text.split_once('@') {
            Some((module, path)) => {
                if !is_dotted_identifier(module) {
                    return None;
                }
                if !path.is_empty() && !is_dotted_identifier(path) {
                    return None;
                }
                Some(SymbolRef::new(module, path))
            }
            None if is_dotted_identifier(text) => Some(SymbolRef::new("", text)),
            None => None,
        }
    }

    /// The symbol key this reference names.
    pub fn to_key(&self) -> String {
        if self.symbol_path.is_empty() {
            self.module.clone()
        } else {
            join_key(&self.module, &self.symbol_path)
        }
    }
}

impl fmt::Display for SymbolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.module.is_empty() {
            write!(f, "{}", self.symbol_path)
        } else {
            write!(f, "{}@{}", self.module, self.symbol_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_split_keys() {
        assert_eq!(join_key("omni.ui", "Window"), "omni.ui.Window");
        assert_eq!(join_key("", "Window"), "Window");
        assert_eq!(parent_key("omni.ui.Window"), Some("omni.ui"));
        assert_eq!(parent_key("omni"), None);
        assert_eq!(last_segment("omni.ui.Window.show"), "show");
        assert_eq!(last_segment("omni"), "omni");
    }

    #[test]
    fn dotted_identifiers() {
        assert!(is_dotted_identifier("omni.ui._impl"));
        assert!(!is_dotted_identifier("omni..ui"));
        assert!(!is_dotted_identifier("1abc"));
        assert!(!is_dotted_identifier(""));
    }

    #[test]
    fn parse_symbol_ref() {
        let r = SymbolRef::parse("omni.ui@Window.show").unwrap();
        assert_eq!(r.module, "omni.ui");
        assert_eq!(r.symbol_path, "Window.show");
        assert_eq!(r.to_key(), "omni.ui.Window.show");
        assert_eq!(r.to_string(), "omni.ui@Window.show");
    }

    #[test]
    fn parse_module_only_ref() {
        let r = SymbolRef::parse("omni.ui@").unwrap();
        assert_eq!(r.to_key(), "omni.ui");
    }

    #[test]
    fn parse_plain_key() {
        let r = SymbolRef::parse("omni.ui.Window").unwrap();
        assert_eq!(r.to_key(), "omni.ui.Window");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(SymbolRef::parse("omni ui@Window").is_none());
        assert!(SymbolRef::parse("@Window").is_none());
        assert!(SymbolRef::parse("omni.ui@Win dow").is_none());
    }
}
