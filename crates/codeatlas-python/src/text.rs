//! Source text helpers: string literals, docstrings, indentation.

/// Strip the prefix letters and quotes of a Python string literal.
///
/// Returns `None` for text that is not a single string literal.
pub fn string_literal_value(literal: &str) -> Option<&str> {
    let body = literal.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if body.len() >= 2 * quote.len() && body.starts_with(quote) && body.ends_with(quote) {
            return Some(&body[quote.len()..body.len() - quote.len()]);
        }
    }
    None
}

/// True if the literal carries an `f` prefix.
pub fn is_format_string(literal: &str) -> bool {
    literal
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .any(|c| c == 'f' || c == 'F')
}

/// Clean a docstring the way `inspect.cleandoc` does.
///
/// Tabs are expanded, the first line is left-stripped, the common indentation
/// of the remaining lines is removed and blank lines at both ends are dropped.
/// Returns `None` when nothing is left.
pub fn clean_docstring(raw: &str) -> Option<String> {
    let expanded = raw.replace('\t', "        ");
    let lines: Vec<&str> = expanded.lines().collect();
    let margin = lines
        .iter()
        .skip(1)
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    let mut cleaned: Vec<&str> = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        if idx == 0 {
            cleaned.push(line.trim_start());
        } else {
            cleaned.push(line.get(margin..).unwrap_or(line.trim_start()).trim_end());
        }
    }
    while cleaned.last().is_some_and(|l| l.trim().is_empty()) {
        cleaned.pop();
    }
    while cleaned.first().is_some_and(|l| l.trim().is_empty()) {
        cleaned.remove(0);
    }
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.join("\n").trim_end().to_string())
    }
}

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove the common leading indentation of all non-blank lines.
pub fn dedent(text: &str) -> String {
    let margin = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    text.lines()
        .map(|line| line.get(margin..).unwrap_or(line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Byte offset of the start of the line containing `offset`.
pub fn line_start(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .rfind('\n')
        .map(|idx| idx + 1)
        .unwrap_or(0)
}
