//! Tree-sitter parsing of one Python file.
//!
//! A [`SyntaxParser`] wraps a `tree_sitter::Parser` configured for Python.
//! It is not `Sync`; scan workers each own one.

use std::time::Duration;

use thiserror::Error;
use tree_sitter::{LanguageError, Node, Parser, Tree};

/// Per-file parse failure.
///
/// `line` and `col` are 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}:{line}:{col}: {message}")]
pub struct ParseError {
    pub path: String,
    pub message: String,
    pub line: u32,
    pub col: u32,
}

/// A successfully parsed file.
#[derive(Debug)]
pub struct ParsedFile {
    pub path: String,
    pub source: String,
    pub tree: Tree,
}

impl ParsedFile {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }
}

/// Python parser with an optional per-file timeout.
pub struct SyntaxParser {
    parser: Parser,
    timeout: Option<Duration>,
}

impl SyntaxParser {
    /// Create a parser. A zero `timeout_ms` disables the timeout.
    pub fn new(timeout_ms: u64) -> Result<Self, LanguageError> {
        let mut parser = Parser::new();
        parser.set_language(&tree_sitter_python::LANGUAGE.into())?;
        let timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));
        if let Some(timeout) = timeout {
            parser.set_timeout_micros(timeout.as_micros().try_into().unwrap_or(u64::MAX));
        }
        Ok(SyntaxParser { parser, timeout })
    }

    /// Parse `source`. Trees with syntax errors are rejected.
    pub fn parse(&mut self, path: &str, source: String) -> Result<ParsedFile, ParseError> {
        self.parser.reset();
        let Some(tree) = self.parser.parse(source.as_bytes(), None) else {
            let message = match self.timeout {
                Some(timeout) => format!("parse timed out after {} ms", timeout.as_millis()),
                None => "parser returned no tree".to_string(),
            };
            return Err(ParseError {
                path: path.to_string(),
                message,
                line: 1,
                col: 1,
            });
        };

        let root = tree.root_node();
        if root.has_error() {
            let (message, line, col) = match first_error(root) {
                Some(node) => {
                    let pos = node.start_position();
                    let message = if node.is_missing() {
                        format!("missing `{}`", node.kind())
                    } else {
                        "invalid syntax".to_string()
                    };
                    (message, pos.row as u32 + 1, pos.column as u32 + 1)
                }
                None => ("invalid syntax".to_string(), 1, 1),
            };
            return Err(ParseError {
                path: path.to_string(),
                message,
                line,
                col,
            });
        }

        Ok(ParsedFile {
            path: path.to_string(),
            source,
            tree,
        })
    }
}

/// First `ERROR` or missing node in document order.
fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

/// Decode file bytes, replacing invalid UTF-8.
pub fn decode_source(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> SyntaxParser {
        SyntaxParser::new(5000).unwrap()
    }

    #[test]
    fn parses_valid_source() {
        let parsed = parser()
            .parse("a.py", "def f(x):\n    return x\n".to_string())
            .unwrap();
        assert_eq!(parsed.root().kind(), "module");
        assert_eq!(parsed.path, "a.py");
    }

    #[test]
    fn reports_error_position() {
        let err = parser()
            .parse("bad.py", "x = 1\ndef broken(:\n    pass\n".to_string())
            .unwrap_err();
        assert_eq!(err.path, "bad.py");
        assert_eq!(err.line, 2);
        assert!(err.to_string().starts_with("bad.py:2:"));
    }

    #[test]
    fn parser_is_reusable_after_error() {
        let mut p = parser();
        assert!(p.parse("bad.py", "class :\n".to_string()).is_err());
        assert!(p.parse("ok.py", "class A:\n    pass\n".to_string()).is_ok());
    }

    #[test]
    fn lossy_decoding() {
        let text = decode_source(vec![b'x', b' ', b'=', b' ', 0xff, b'\n']);
        assert!(text.starts_with("x = "));
        assert!(text.contains('\u{fffd}'));
    }
}
