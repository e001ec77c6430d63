//! Bundle emission.
//!
//! Serializes a [`ModuleGraph`] into one artifact: each module's source
//! is wrapped in a registry function so its local bindings cannot collide
//! with other modules, imports are rewritten to `require(id)` calls, and
//! a `__require(entry)` trailer kicks off execution. Emission order is
//! the graph's toposort, so the output is byte-identical across builds of
//! an unchanged tree.

use crate::error::BuildError;
use crate::graph::{ModuleGraph, ModuleId, ModuleNode};
use rayon::prelude::*;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Emission options.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Output filename, used for the sourcemap `file` field and the
    /// `sourceMappingURL` trailer.
    pub filename: String,
    /// Emit a V3 sourcemap alongside the bundle.
    pub source_maps: bool,
}

/// One emitted bundle: derived, read-only output of a graph snapshot.
#[derive(Debug, Clone)]
pub struct Bundle {
    /// Bundled code.
    pub code: String,
    /// V3 sourcemap, when enabled.
    pub map: Option<String>,
    /// Module paths in emission order.
    pub modules: Vec<PathBuf>,
    /// BLAKE3 hex digest of `code`; used as the ETag and for change
    /// detection between builds.
    pub hash: String,
}

/// Emit a bundle from the module graph.
pub fn emit(graph: &ModuleGraph, options: &EmitOptions) -> Result<Bundle, BuildError> {
    let order = graph.toposort();

    let mut code = String::new();
    code.push_str("// strand bundle\n");
    code.push_str(&format!("// strand v{}\n\n", crate::VERSION));
    code.push_str("const __modules = {};\n");
    code.push_str("const __exports = {};\n\n");
    code.push_str("function __require(id) {\n");
    code.push_str("  if (__exports[id]) return __exports[id];\n");
    code.push_str("  const module = { exports: {} };\n");
    code.push_str("  __modules[id](module, module.exports, __require);\n");
    code.push_str("  __exports[id] = module.exports;\n");
    code.push_str("  return module.exports;\n");
    code.push_str("}\n\n");

    // Wrap modules in parallel, then concatenate in emission order.
    let wrapped: Vec<WrappedModule> = order
        .par_iter()
        .filter_map(|&id| graph.get(id).map(|module| wrap_module(id, module, graph)))
        .collect();

    let mut map_builder = options.source_maps.then(SourceMapBuilder::new);
    for wrapped in &wrapped {
        let offset = line_count(&code);
        if let (Some(builder), Some(module)) = (map_builder.as_mut(), graph.get(wrapped.id)) {
            let source_idx = builder.add_source(&module.path, &module.source);
            for (body_line, source_line) in &wrapped.line_mappings {
                builder.add_mapping(offset + body_line, source_idx, *source_line);
            }
        }
        code.push_str(&wrapped.text);
    }

    if let Some(entry) = graph.entry() {
        code.push_str(&format!("// Entry point\n__require({entry});\n"));
    }

    let map = map_builder.map(|b| b.generate(&options.filename));
    if map.is_some() {
        code.push_str(&format!("//# sourceMappingURL={}.map\n", options.filename));
    }

    let hash = strand_util::hash::blake3_bytes(code.as_bytes());
    Ok(Bundle {
        code,
        map,
        modules: order
            .iter()
            .filter_map(|&id| graph.get(id).map(|m| m.path.clone()))
            .collect(),
        hash,
    })
}

/// Write the bundle (and `.map` sibling) to `output_dir/filename`.
///
/// Writes are atomic: a filesystem failure leaves any previously emitted
/// artifact untouched. The directory is created if absent.
pub fn write_bundle(
    bundle: &Bundle,
    output_dir: &Path,
    filename: &str,
) -> Result<PathBuf, BuildError> {
    let out_path = output_dir.join(filename);
    strand_util::fs::atomic_write(&out_path, bundle.code.as_bytes()).map_err(|source| {
        BuildError::Write {
            path: out_path.clone(),
            source,
        }
    })?;

    if let Some(map) = &bundle.map {
        let map_path = output_dir.join(format!("{filename}.map"));
        strand_util::fs::atomic_write(&map_path, map.as_bytes()).map_err(|source| {
            BuildError::Write {
                path: map_path,
                source,
            }
        })?;
    }

    Ok(out_path)
}

struct WrappedModule {
    id: ModuleId,
    text: String,
    /// (line within `text`, line within original source), both 0-indexed.
    line_mappings: Vec<(u32, u32)>,
}

fn line_count(s: &str) -> u32 {
    s.bytes().filter(|&b| b == b'\n').count() as u32
}

/// Wrap one module: registry assignment plus per-line import/export
/// rewriting. Body lines stay 1:1 with source lines (removed statements
/// become blank lines) so the sourcemap can be line-level.
fn wrap_module(id: ModuleId, module: &ModuleNode, graph: &ModuleGraph) -> WrappedModule {
    let mut text = String::with_capacity(module.source.len() + 200);
    text.push_str(&format!("// Module {id}: {}\n", module.path.display()));
    text.push_str(&format!(
        "__modules[{id}] = function(module, exports, require) {{\n"
    ));

    let body_start = 2;
    let mut line_mappings = Vec::new();
    let mut pending_exports: Vec<String> = Vec::new();

    let lines: Vec<&str> = module.source.lines().collect();
    let mut i = 0;
    while i < lines.len() {
        let end = statement_end(&lines, i);
        let rewritten = if end > i {
            let statement = lines[i..=end].join(" ");
            rewrite_line(&statement, id, graph, &mut pending_exports)
        } else {
            rewrite_line(lines[i], id, graph, &mut pending_exports)
        };
        if !rewritten.trim().is_empty() {
            line_mappings.push((body_start + i as u32, i as u32));
        }
        text.push_str("  ");
        text.push_str(&rewritten);
        text.push('\n');
        // Continuation lines become blanks, keeping the body 1:1 with
        // the source for the line-level map.
        for _ in i..end {
            text.push('\n');
        }
        i = end + 1;
    }

    for export in pending_exports {
        text.push_str("  ");
        text.push_str(&export);
        text.push('\n');
    }

    text.push_str("};\n\n");

    WrappedModule {
        id,
        text,
        line_mappings,
    }
}

/// Last line of the statement starting at `start`. Import and re-export
/// clauses may span lines; everything else is rewritten per line.
fn statement_end(lines: &[&str], start: usize) -> usize {
    let trimmed = lines[start].trim_start();
    if !(trimmed.starts_with("import ") || trimmed.starts_with("export {")) {
        return start;
    }
    let mut end = start;
    let mut joined = lines[start].to_string();
    while !clause_complete(&joined) && end + 1 < lines.len() {
        end += 1;
        joined.push(' ');
        joined.push_str(lines[end]);
    }
    end
}

/// A clause is complete at a `;`, or once the `from` specifier string is
/// closed (semicolons are optional in source).
fn clause_complete(text: &str) -> bool {
    if text.contains(';') {
        return true;
    }
    if let Some(idx) = text.find(" from ") {
        let rest = text[idx + " from ".len()..].trim_start();
        if let Some(quote @ ('\'' | '"')) = rest.chars().next() {
            return rest[1..].contains(quote);
        }
    }
    false
}

/// Rewrite one source statement for the wrapped format.
fn rewrite_line(
    line: &str,
    id: ModuleId,
    graph: &ModuleGraph,
    pending_exports: &mut Vec<String>,
) -> String {
    let trimmed = line.trim();
    if trimmed.starts_with("import ") || trimmed.starts_with("import\"") || trimmed.starts_with("import'") {
        return rewrite_import(trimmed, id, graph);
    }
    if trimmed.starts_with("export ") {
        return rewrite_export(trimmed, id, graph, pending_exports);
    }
    rewrite_requires(line, id, graph)
}

/// `require('spec')` for a spec in the graph becomes `require(id)`.
/// String literals pass through untouched, mirroring the scanner.
fn rewrite_requires(line: &str, id: ModuleId, graph: &ModuleGraph) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            quote @ ('\'' | '"' | '`') => {
                out.push(quote);
                i += 1;
                while i < chars.len() {
                    let c = chars[i];
                    out.push(c);
                    i += 1;
                    if c == '\\' && i < chars.len() {
                        out.push(chars[i]);
                        i += 1;
                    } else if c == quote {
                        break;
                    }
                }
            }
            _ if require_keyword_at(&chars, i) => {
                if let Some((spec, end)) = require_argument(&chars, i + 7) {
                    if let Some(dep) = graph.resolve_specifier(id, &spec) {
                        out.push_str(&format!("require({dep})"));
                        i = end;
                        continue;
                    }
                }
                out.push(chars[i]);
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

fn require_keyword_at(chars: &[char], i: usize) -> bool {
    const KEYWORD: [char; 7] = ['r', 'e', 'q', 'u', 'i', 'r', 'e'];
    if chars.len() < i + 7 || chars[i..i + 7] != KEYWORD {
        return false;
    }
    let ident = |c: char| c.is_alphanumeric() || c == '_' || c == '$' || c == '.';
    (i == 0 || !ident(chars[i - 1])) && chars.get(i + 7).map_or(true, |&c| !ident(c))
}

/// Parse `('spec')` after the keyword; yields the specifier and the
/// index one past the closing paren.
fn require_argument(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut i = start;
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    if chars.get(i) != Some(&'(') {
        return None;
    }
    i += 1;
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    let quote = *chars.get(i)?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    i += 1;
    let mut spec = String::new();
    while i < chars.len() && chars[i] != quote {
        spec.push(chars[i]);
        i += 1;
    }
    if chars.get(i) != Some(&quote) {
        return None;
    }
    i += 1;
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    if chars.get(i) != Some(&')') {
        return None;
    }
    Some((spec, i + 1))
}

/// Rewrite an import statement to a `require` call.
fn rewrite_import(trimmed: &str, id: ModuleId, graph: &ModuleGraph) -> String {
    let require = |spec: &str| -> String {
        match graph.resolve_specifier(id, spec) {
            Some(dep) => format!("require({dep})"),
            None => format!("require('{spec}')"),
        }
    };

    // Side-effect import: import "./x";
    if let Some(spec) = strip_quoted(trimmed, "import ") {
        return format!("{};", require(&spec));
    }

    if let Some(from_idx) = trimmed.find(" from ") {
        let bindings = trimmed["import ".len()..from_idx].trim();
        let spec = trimmed[from_idx + " from ".len()..]
            .trim()
            .trim_matches(|c| c == '\'' || c == '"' || c == ';');

        // Namespace import: import * as ns from "./x"
        if let Some(ns) = bindings.strip_prefix("* as ") {
            return format!("const {} = {};", ns.trim(), require(spec));
        }

        // Named imports: import { a, b as c } from "./x"
        if bindings.starts_with('{') {
            let destructure = bindings.replace(" as ", ": ");
            return format!("const {destructure} = {};", require(spec));
        }

        // Default (possibly with named tail): import App from "./x"
        if let Some((default_name, rest)) = bindings.split_once(',') {
            let destructure = rest.trim().replace(" as ", ": ");
            let req = require(spec);
            return format!(
                "const {} = {req}.default ?? {req}; const {destructure} = {req};",
                default_name.trim()
            );
        }
        let req = require(spec);
        return format!("const {bindings} = {req}.default ?? {req};");
    }

    // Unrecognized import shape; leave it for the runtime to report.
    trimmed.to_string()
}

/// Rewrite an export statement; declarations stay in place, the exports
/// object assignments collect at the end of the module body.
fn rewrite_export(
    trimmed: &str,
    id: ModuleId,
    graph: &ModuleGraph,
    pending_exports: &mut Vec<String>,
) -> String {
    let require = |spec: &str| -> String {
        match graph.resolve_specifier(id, spec) {
            Some(dep) => format!("require({dep})"),
            None => format!("require('{spec}')"),
        }
    };

    if let Some(value) = trimmed.strip_prefix("export default ") {
        return format!("exports.default = {};", value.trim_end_matches(';'));
    }

    // Re-export: export { a, b as c } from "./x"
    if trimmed.starts_with("export {") {
        if let Some(from_idx) = trimmed.find(" from ") {
            let names = &trimmed["export {".len()..trimmed.find('}').unwrap_or(from_idx)];
            let spec = trimmed[from_idx + " from ".len()..]
                .trim()
                .trim_matches(|c| c == '\'' || c == '"' || c == ';');
            let req = require(spec);
            for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                match name.split_once(" as ") {
                    Some((inner, outer)) => pending_exports
                        .push(format!("exports.{} = {req}.{};", outer.trim(), inner.trim())),
                    None => pending_exports.push(format!("exports.{name} = {req}.{name};")),
                }
            }
            return String::new();
        }

        // Local re-export: export { a, b as c };
        if let Some(end) = trimmed.find('}') {
            for name in trimmed["export {".len()..end]
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
            {
                match name.split_once(" as ") {
                    Some((inner, outer)) => pending_exports
                        .push(format!("exports.{} = {};", outer.trim(), inner.trim())),
                    None => pending_exports.push(format!("exports.{name} = {name};")),
                }
            }
            return String::new();
        }
    }

    // export const/let/var/function/class: drop the keyword, record the name.
    if let Some(decl) = trimmed.strip_prefix("export ") {
        if let Some(name) = declared_name(decl) {
            pending_exports.push(format!("exports.{name} = {name};"));
        }
        return decl.to_string();
    }

    trimmed.to_string()
}

/// Binding name of a `const`/`let`/`var`/`function`/`class` declaration.
fn declared_name(decl: &str) -> Option<String> {
    let rest = decl
        .strip_prefix("const ")
        .or_else(|| decl.strip_prefix("let "))
        .or_else(|| decl.strip_prefix("var "))
        .or_else(|| decl.strip_prefix("async function ").map(str::trim_start))
        .or_else(|| decl.strip_prefix("function "))
        .or_else(|| decl.strip_prefix("class "))?;
    let name: String = rest
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// For `import "spec";` shapes, return the quoted specifier.
fn strip_quoted(trimmed: &str, prefix: &str) -> Option<String> {
    let rest = trimmed.strip_prefix(prefix)?.trim_start();
    let quote = rest.chars().next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let body = &rest[1..];
    let end = body.find(quote)?;
    Some(body[..end].to_string())
}

// ============================================================================
// Source maps
// ============================================================================

const BASE64: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// VLQ-encode a signed integer and append to `out`.
fn vlq_encode(value: i64, out: &mut String) {
    #[allow(clippy::cast_sign_loss)]
    let mut v = (if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    }) as u64;
    loop {
        let mut digit = (v & 0x1f) as u8;
        v >>= 5;
        if v > 0 {
            digit |= 0x20;
        }
        out.push(BASE64[digit as usize] as char);
        if v == 0 {
            break;
        }
    }
}

/// Collects line-level mappings and renders a V3 sourcemap.
struct SourceMapBuilder {
    sources: Vec<String>,
    sources_content: Vec<String>,
    /// (output line, source index, source line), all 0-indexed.
    mappings: Vec<(u32, u32, u32)>,
}

impl SourceMapBuilder {
    fn new() -> Self {
        Self {
            sources: Vec::new(),
            sources_content: Vec::new(),
            mappings: Vec::new(),
        }
    }

    fn add_source(&mut self, path: &Path, content: &str) -> u32 {
        let idx = self.sources.len() as u32;
        self.sources.push(path.display().to_string());
        self.sources_content.push(content.to_string());
        idx
    }

    fn add_mapping(&mut self, output_line: u32, source_idx: u32, source_line: u32) {
        self.mappings.push((output_line, source_idx, source_line));
    }

    fn generate(mut self, file: &str) -> String {
        self.mappings.sort_unstable();

        let last_line = self.mappings.last().map_or(0, |m| m.0);
        let mut lines: Vec<String> = vec![String::new(); last_line as usize + 1];
        let mut prev_source: i64 = 0;
        let mut prev_source_line: i64 = 0;

        for &(output_line, source_idx, source_line) in &self.mappings {
            let segment = &mut lines[output_line as usize];
            if !segment.is_empty() {
                // One segment per output line; keep the first.
                continue;
            }
            vlq_encode(0, segment);
            vlq_encode(i64::from(source_idx) - prev_source, segment);
            vlq_encode(i64::from(source_line) - prev_source_line, segment);
            vlq_encode(0, segment);
            prev_source = i64::from(source_idx);
            prev_source_line = i64::from(source_line);
        }

        json!({
            "version": 3,
            "file": file,
            "sources": self.sources,
            "sourcesContent": self.sources_content,
            "mappings": lines.join(";"),
        })
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ModuleNode;
    use std::collections::HashMap;

    fn graph_main_util() -> ModuleGraph {
        let mut graph = ModuleGraph::new();
        graph.add(ModuleNode {
            path: PathBuf::from("/src/main.js"),
            source: "import { x } from \"./util\";\nconsole.log(x);\n".to_string(),
            imports: crate::scan::scan_imports("import { x } from \"./util\";\n"),
            dependencies: Vec::new(),
        });
        graph.add(ModuleNode {
            path: PathBuf::from("/src/util.js"),
            source: "export const x = 1;\n".to_string(),
            imports: Vec::new(),
            dependencies: Vec::new(),
        });
        let mut dep_info = HashMap::new();
        dep_info.insert(
            PathBuf::from("/src/main.js"),
            vec![("./util".to_string(), PathBuf::from("/src/util.js"))],
        );
        graph.set_dependencies(&dep_info);
        graph
    }

    /// Like [`graph_main_util`] but with a caller-supplied entry source.
    fn graph_with_main(main_source: &str) -> ModuleGraph {
        let mut graph = ModuleGraph::new();
        graph.add(ModuleNode {
            path: PathBuf::from("/src/main.js"),
            source: main_source.to_string(),
            imports: crate::scan::scan_imports(main_source),
            dependencies: Vec::new(),
        });
        graph.add(ModuleNode {
            path: PathBuf::from("/src/util.js"),
            source: "export const x = 1;\nexport const y = 2;\n".to_string(),
            imports: Vec::new(),
            dependencies: Vec::new(),
        });
        let mut dep_info = HashMap::new();
        dep_info.insert(
            PathBuf::from("/src/main.js"),
            vec![("./util".to_string(), PathBuf::from("/src/util.js"))],
        );
        graph.set_dependencies(&dep_info);
        graph
    }

    fn options() -> EmitOptions {
        EmitOptions {
            filename: "bundle.js".to_string(),
            source_maps: false,
        }
    }

    #[test]
    fn dependency_precedes_dependent() {
        let bundle = emit(&graph_main_util(), &options()).unwrap();
        let util_pos = bundle.code.find("/src/util.js").unwrap();
        let main_pos = bundle.code.find("/src/main.js").unwrap();
        assert!(util_pos < main_pos);
        assert_eq!(bundle.modules.len(), 2);
    }

    #[test]
    fn entry_is_invoked_last() {
        let bundle = emit(&graph_main_util(), &options()).unwrap();
        assert!(bundle.code.trim_end().ends_with("__require(0);"));
    }

    #[test]
    fn imports_rewrite_to_module_ids() {
        let bundle = emit(&graph_main_util(), &options()).unwrap();
        assert!(bundle.code.contains("const { x } = require(1);"));
        assert!(!bundle.code.contains("from \"./util\""));
    }

    #[test]
    fn exports_are_wired() {
        let bundle = emit(&graph_main_util(), &options()).unwrap();
        assert!(bundle.code.contains("const x = 1;"));
        assert!(bundle.code.contains("exports.x = x;"));
    }

    #[test]
    fn emission_is_idempotent() {
        let graph = graph_main_util();
        let a = emit(&graph, &options()).unwrap();
        let b = emit(&graph, &options()).unwrap();
        assert_eq!(a.code, b.code);
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn rewrite_named_import() {
        let graph = graph_main_util();
        assert_eq!(
            rewrite_import("import { x } from \"./util\";", 0, &graph),
            "const { x } = require(1);"
        );
    }

    #[test]
    fn rewrite_default_import() {
        let graph = graph_main_util();
        assert_eq!(
            rewrite_import("import util from './util';", 0, &graph),
            "const util = require(1).default ?? require(1);"
        );
    }

    #[test]
    fn rewrite_side_effect_import() {
        let graph = graph_main_util();
        assert_eq!(
            rewrite_import("import \"./util\";", 0, &graph),
            "require(1);"
        );
    }

    #[test]
    fn rewrite_namespace_import() {
        let graph = graph_main_util();
        assert_eq!(
            rewrite_import("import * as util from './util';", 0, &graph),
            "const util = require(1);"
        );
    }

    #[test]
    fn multiline_import_clause_is_rewritten() {
        let graph = graph_with_main(
            "import {\n  x,\n  y,\n} from \"./util\";\nconsole.log(x + y);\n",
        );
        let bundle = emit(&graph, &options()).unwrap();

        assert!(!bundle.code.contains("import {"));
        assert!(!bundle.code.contains("from \"./util\""));
        assert!(bundle.code.contains("require(1)"));
        assert!(bundle.code.contains("console.log(x + y);"));
    }

    #[test]
    fn multiline_import_keeps_line_correspondence() {
        let graph = graph_with_main(
            "import {\n  x,\n  y,\n} from \"./util\";\nconsole.log(x + y);\n",
        );
        let bundle = emit(
            &graph,
            &EmitOptions {
                filename: "bundle.js".to_string(),
                source_maps: true,
            },
        )
        .unwrap();

        // The statement after the four-line clause still maps to source
        // line index 4.
        let map: serde_json::Value = serde_json::from_str(bundle.map.as_deref().unwrap()).unwrap();
        let decoded = decode_mappings(map["mappings"].as_str().unwrap());
        let output_line = bundle
            .code
            .lines()
            .position(|l| l.contains("console.log(x + y);"))
            .unwrap() as u32;
        let mapping = decoded
            .iter()
            .find(|(line, _, _)| *line == output_line)
            .expect("output line is mapped");
        assert_eq!(mapping.2, 4);
    }

    #[test]
    fn multiline_reexport_clause_is_rewritten() {
        let graph = graph_with_main("export {\n  x as shared,\n} from \"./util\";\n");
        let bundle = emit(&graph, &options()).unwrap();

        assert!(!bundle.code.contains("export {"));
        assert!(bundle.code.contains("exports.shared = require(1).x;"));
    }

    #[test]
    fn require_inside_string_literal_is_untouched() {
        let graph = graph_with_main(
            "const u = require(\"./util\");\nconst msg = \"call require('./util') later\";\n",
        );
        let bundle = emit(&graph, &options()).unwrap();

        assert!(bundle.code.contains("const u = require(1);"));
        assert!(bundle.code.contains("\"call require('./util') later\""));
    }

    #[test]
    fn rewrite_export_default() {
        let mut pending = Vec::new();
        let graph = ModuleGraph::new();
        let out = rewrite_export("export default App;", 0, &graph, &mut pending);
        assert_eq!(out, "exports.default = App;");
        assert!(pending.is_empty());
    }

    #[test]
    fn rewrite_export_declaration() {
        let mut pending = Vec::new();
        let graph = ModuleGraph::new();
        let out = rewrite_export("export function add(a, b) { return a + b; }", 0, &graph, &mut pending);
        assert_eq!(out, "function add(a, b) { return a + b; }");
        assert_eq!(pending, vec!["exports.add = add;".to_string()]);
    }

    // ------------------------------------------------------------------
    // Source maps
    // ------------------------------------------------------------------

    /// Decode one VLQ value, returning (value, rest).
    fn vlq_decode(s: &str) -> (i64, &str) {
        let mut value: i64 = 0;
        let mut shift = 0;
        for (i, c) in s.char_indices() {
            let digit = BASE64.iter().position(|&b| b == c as u8).unwrap() as i64;
            value |= (digit & 0x1f) << shift;
            shift += 5;
            if digit & 0x20 == 0 {
                let rest = &s[i + 1..];
                let v = if value & 1 == 1 { -(value >> 1) } else { value >> 1 };
                return (v, rest);
            }
        }
        panic!("truncated VLQ");
    }

    /// Decode a mappings string into (output_line, source_idx, source_line).
    fn decode_mappings(mappings: &str) -> Vec<(u32, u32, u32)> {
        let mut out = Vec::new();
        let mut source: i64 = 0;
        let mut source_line: i64 = 0;
        for (line_idx, line) in mappings.split(';').enumerate() {
            if line.is_empty() {
                continue;
            }
            let (_col, rest) = vlq_decode(line);
            let (ds, rest) = vlq_decode(rest);
            let (dl, _rest) = vlq_decode(rest);
            source += ds;
            source_line += dl;
            out.push((line_idx as u32, source as u32, source_line as u32));
        }
        out
    }

    #[test]
    fn sourcemap_round_trips_to_original_lines() {
        let graph = graph_main_util();
        let bundle = emit(
            &graph,
            &EmitOptions {
                filename: "bundle.js".to_string(),
                source_maps: true,
            },
        )
        .unwrap();

        let map: serde_json::Value = serde_json::from_str(bundle.map.as_deref().unwrap()).unwrap();
        assert_eq!(map["version"], 3);
        assert_eq!(map["file"], "bundle.js");

        let sources: Vec<String> = map["sources"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        let decoded = decode_mappings(map["mappings"].as_str().unwrap());

        // Find the output line holding `console.log(x);` (line 2 of main.js,
        // i.e. source line index 1) and check the map sends it home.
        let output_line = bundle
            .code
            .lines()
            .position(|l| l.contains("console.log(x);"))
            .unwrap() as u32;
        let mapping = decoded
            .iter()
            .find(|(line, _, _)| *line == output_line)
            .expect("output line is mapped");
        assert_eq!(sources[mapping.1 as usize], "/src/main.js");
        assert_eq!(mapping.2, 1);
    }

    #[test]
    fn write_bundle_creates_directory_and_map() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("public");
        let graph = graph_main_util();
        let bundle = emit(
            &graph,
            &EmitOptions {
                filename: "bundle.js".to_string(),
                source_maps: true,
            },
        )
        .unwrap();

        let path = write_bundle(&bundle, &out_dir, "bundle.js").unwrap();
        assert_eq!(path, out_dir.join("bundle.js"));
        assert!(out_dir.join("bundle.js.map").is_file());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), bundle.code);
    }

    #[test]
    fn failed_write_keeps_previous_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("public");
        std::fs::create_dir_all(&out_dir).unwrap();

        // A directory squatting on the target path makes the rename fail.
        let blocked = out_dir.join("bundle.js");
        std::fs::create_dir(&blocked).unwrap();

        let graph = graph_main_util();
        let bundle = emit(&graph, &options()).unwrap();
        let err = write_bundle(&bundle, &out_dir, "bundle.js").unwrap_err();
        assert_eq!(err.code(), "WRITE_ERROR");
        assert!(blocked.is_dir());
    }
}
