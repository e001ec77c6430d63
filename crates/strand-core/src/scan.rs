//! Native-format import scanner.
//!
//! Extracts dependency specifiers from transformed module source without
//! full parsing. The syntax of the native format is a collaborator
//! concern, so the scanner sits behind the [`DependencyScanner`] trait;
//! [`ImportScanner`] handles the default format:
//!
//! - `import defaultName from "./x"` / `import { a, b } from "./x"`
//! - `import "./x"` (side effect)
//! - `export { a } from "./x"` / `export * from "./x"`
//! - `require("./x")`
//!
//! Comments and string bodies are skipped.

/// An import found in module source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Specifier exactly as written.
    pub specifier: String,
    /// 1-indexed line number, best effort.
    pub line: u32,
}

/// Capability to extract dependency specifiers from module source.
pub trait DependencyScanner: Send + Sync {
    /// Returns specifiers in first-appearance order, deduplicated.
    fn scan(&self, source: &str) -> Vec<ImportSpec>;
}

/// Default scanner for the native ESM-with-require format.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImportScanner;

impl DependencyScanner for ImportScanner {
    fn scan(&self, source: &str) -> Vec<ImportSpec> {
        scan_imports(source)
    }
}

/// Scan source for import specifiers. See [`ImportScanner`].
#[must_use]
pub fn scan_imports(source: &str) -> Vec<ImportSpec> {
    let chars: Vec<char> = source.chars().collect();
    let len = chars.len();
    let mut results: Vec<ImportSpec> = Vec::new();
    let mut line: u32 = 1;
    let mut i = 0;

    while i < len {
        match chars[i] {
            '\n' => {
                line += 1;
                i += 1;
            }
            '/' if i + 1 < len && chars[i + 1] == '/' => {
                while i < len && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if i + 1 < len && chars[i + 1] == '*' => {
                i += 2;
                while i + 1 < len && !(chars[i] == '*' && chars[i + 1] == '/') {
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    i += 1;
                }
                i = (i + 2).min(len);
            }
            '\'' | '"' | '`' => {
                // A string outside an import clause; skip its body so a
                // quoted "require('x')" is not picked up.
                let quote = chars[i];
                i += 1;
                while i < len && chars[i] != quote {
                    if chars[i] == '\\' {
                        i += 1;
                    } else if chars[i] == '\n' {
                        line += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            _ if matches_keyword(&chars, i, "import") => {
                let after = i + 6;
                if let Some((spec, end)) = scan_import_clause(&chars, after) {
                    push_unique(&mut results, spec, line);
                    line += count_newlines(&chars[i..end]);
                    i = end;
                } else {
                    i += 6;
                }
            }
            _ if matches_keyword(&chars, i, "export") => {
                let after = i + 6;
                if let Some((spec, end)) = scan_from_clause(&chars, after) {
                    push_unique(&mut results, spec, line);
                    line += count_newlines(&chars[i..end]);
                    i = end;
                } else {
                    i += 6;
                }
            }
            _ if matches_keyword(&chars, i, "require") => {
                let after = i + 7;
                if let Some((spec, end)) = scan_call_argument(&chars, after) {
                    push_unique(&mut results, spec, line);
                    line += count_newlines(&chars[i..end]);
                    i = end;
                } else {
                    i += 7;
                }
            }
            _ => i += 1,
        }
    }

    results
}

fn push_unique(results: &mut Vec<ImportSpec>, specifier: String, line: u32) {
    if specifier.is_empty() || results.iter().any(|r| r.specifier == specifier) {
        return;
    }
    results.push(ImportSpec { specifier, line });
}

/// Check that `keyword` starts at `i` on word boundaries.
fn matches_keyword(chars: &[char], i: usize, keyword: &str) -> bool {
    let kw: Vec<char> = keyword.chars().collect();
    if i + kw.len() > chars.len() || chars[i..i + kw.len()] != kw[..] {
        return false;
    }
    let before_ok = i == 0 || !is_ident_char(chars[i - 1]);
    let after_ok = i + kw.len() == chars.len() || !is_ident_char(chars[i + kw.len()]);
    before_ok && after_ok
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Parse the clause after `import`: either a quoted side-effect specifier,
/// a `... from "spec"` clause, or a dynamic `import("spec")` call.
fn scan_import_clause(chars: &[char], start: usize) -> Option<(String, usize)> {
    let i = skip_whitespace(chars, start);

    match chars.get(i)? {
        '\'' | '"' => read_string(chars, i),
        '(' => scan_call_argument(chars, start),
        _ => scan_from_clause(chars, i),
    }
}

/// Find ` from "spec"` before the statement's `;`, skipping string
/// bodies along the way so quoted text cannot fake a clause. Clauses may
/// span lines. Exports without `from` yield nothing.
fn scan_from_clause(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut i = start;
    while i < chars.len() && chars[i] != ';' {
        match chars[i] {
            '\'' | '"' | '`' => {
                let quote = chars[i];
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            _ if matches_keyword(chars, i, "from") => {
                let after = skip_whitespace(chars, i + 4);
                return read_string(chars, after);
            }
            _ => i += 1,
        }
    }
    None
}

fn count_newlines(chars: &[char]) -> u32 {
    chars.iter().filter(|&&c| c == '\n').count() as u32
}

/// Parse `("spec")` after `require` or dynamic `import`.
fn scan_call_argument(chars: &[char], start: usize) -> Option<(String, usize)> {
    let i = skip_whitespace(chars, start);
    if chars.get(i) != Some(&'(') {
        return None;
    }
    let i = skip_whitespace(chars, i + 1);
    read_string(chars, i)
}

fn skip_whitespace(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

/// Read a quoted string starting at `i`; returns the body and the index
/// past the closing quote.
fn read_string(chars: &[char], i: usize) -> Option<(String, usize)> {
    let quote = *chars.get(i)?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let mut out = String::new();
    let mut j = i + 1;
    while j < chars.len() {
        if chars[j] == quote {
            return Some((out, j + 1));
        }
        if chars[j] == '\n' {
            return None;
        }
        out.push(chars[j]);
        j += 1;
    }
    None
}
