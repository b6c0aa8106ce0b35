//! CSS/SCSS/LESS handler backed by the tree-sitter CSS grammar.
//!
//! Dependencies, structure and diagnostics ride on the syntax tree;
//! `@mixin`/`@function` analysis stays on the pattern layer because the
//! plain CSS grammar knows nothing about preprocessor constructs.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;
use tree_sitter::{Language, Node};

use crate::patterns::{LanguagePatterns, CSS};

use super::ast::{self, AnalysisError};
use super::text;
use super::{FunctionInfo, LanguageHandler, NodeKind, StructureNode, SyntaxDiagnostic};

const IMPORT_QUERY: &str = r#"
; @import 'file.css' / @import url("file.css")
(import_statement (string_value) @source) @import
(import_statement (call_expression (arguments (string_value) @source))) @import_url
(import_statement (call_expression (arguments (plain_value) @source))) @import_bare

; @use 'sass:math' (parsed as a generic at-rule)
(at_rule (at_keyword) @kw (#eq? @kw "@use") (string_value) @source) @use
"#;

lazy_static! {
    static ref BLOCK_COMMENT_RE: Regex = Regex::new(r"(?s)/\*.*?\*/").unwrap();
}

pub struct CssHandler {
    language: Language,
}

impl CssHandler {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_css::LANGUAGE.into(),
        }
    }

    fn dependencies_tree(&self, text: &str) -> Result<BTreeSet<String>, AnalysisError> {
        let tree = ast::parse(&self.language, text)?;
        let source = text.as_bytes();
        let mut dependencies = BTreeSet::new();

        ast::for_each_match(
            &self.language,
            IMPORT_QUERY,
            tree.root_node(),
            source,
            |query, m| {
                if let Some(raw) = ast::capture_text(query, m, "source", source) {
                    let specifier = raw.trim_matches(|c| c == '"' || c == '\'').trim();
                    if !specifier.is_empty() {
                        dependencies.insert(specifier.to_string());
                    }
                }
            },
        )?;

        Ok(dependencies)
    }

    fn structure_tree(&self, text: &str) -> Result<Vec<StructureNode>, AnalysisError> {
        let tree = ast::parse(&self.language, text)?;
        let source = text.as_bytes();

        let mut nodes = Vec::new();
        collect_rules(tree.root_node(), source, &mut nodes);
        Ok(nodes)
    }

    fn nesting_free(&self, text: &str) -> Result<bool, AnalysisError> {
        let tree = ast::parse(&self.language, text)?;
        Ok(!has_nested_rule(tree.root_node(), false))
    }
}

impl Default for CssHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// One structure node per rule set or at-rule, named by selector text.
/// Preprocessor function headers are reported separately by
/// `analyze_functions`, so their at-rules are skipped here.
fn collect_rules(node: Node, source: &[u8], out: &mut Vec<StructureNode>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "rule_set" => {
                let name = child
                    .child_by_field_name("selectors")
                    .or_else(|| child.named_child(0))
                    .and_then(|n| n.utf8_text(source).ok())
                    .unwrap_or("")
                    .trim()
                    .to_string();
                out.push(StructureNode {
                    kind: NodeKind::Other,
                    name,
                    start_line: child.start_position().row,
                    end_line: child.end_position().row,
                });
            }
            "media_statement" | "keyframes_statement" | "supports_statement" | "at_rule" => {
                let header = child
                    .utf8_text(source)
                    .unwrap_or("")
                    .split('{')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_string();
                if header.starts_with("@mixin") || header.starts_with("@function") {
                    continue;
                }
                out.push(StructureNode {
                    kind: NodeKind::Other,
                    name: header,
                    start_line: child.start_position().row,
                    end_line: child.end_position().row,
                });
            }
            _ => {}
        }
        collect_rules(child, source, out);
    }
}

fn has_nested_rule(node: Node, inside_rule: bool) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let is_rule = child.kind() == "rule_set";
        if is_rule && inside_rule {
            return true;
        }
        if has_nested_rule(child, inside_rule || is_rule) {
            return true;
        }
    }
    false
}

/// Byte index of the `}` matching the `{` at `open`.
fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in text.char_indices().skip_while(|&(i, _)| i < open) {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn line_of_offset(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count()
}

impl LanguageHandler for CssHandler {
    fn language_id(&self) -> &'static str {
        "css"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["css", "scss", "less"]
    }

    fn patterns(&self) -> &'static LanguagePatterns {
        &CSS
    }

    fn analyze_dependencies(&self, text: &str) -> BTreeSet<String> {
        self.dependencies_tree(text).unwrap_or_else(|err| {
            tracing::warn!(language = "css", error = %err, "dependency analysis degraded");
            BTreeSet::new()
        })
    }

    /// `@mixin` and `@function` definitions. Complexity is 1 plus one per
    /// nested rule opened inside the body.
    fn analyze_functions(&self, text: &str) -> Vec<FunctionInfo> {
        let mut functions = Vec::new();
        for pattern in &self.patterns().functions {
            for caps in pattern.captures_iter(text) {
                let whole = caps.get(0).unwrap();
                let name = caps.get(1).map(|m| m.as_str()).unwrap_or("").to_string();
                let params: Vec<String> = caps
                    .get(2)
                    .map(|m| {
                        m.as_str()
                            .split(',')
                            .map(|p| p.trim().to_string())
                            .filter(|p| !p.is_empty())
                            .collect()
                    })
                    .unwrap_or_default();

                let mut complexity = 1;
                if let Some(open) = text[whole.end()..].find('{').map(|i| whole.end() + i) {
                    if let Some(close) = matching_brace(text, open) {
                        complexity += text[open + 1..close].matches('{').count() as u32;
                    }
                }

                functions.push(FunctionInfo {
                    name,
                    params,
                    return_type: None,
                    complexity,
                });
            }
        }
        functions
    }

    fn analyze_structure(&self, text: &str) -> Vec<StructureNode> {
        let mut nodes = self.structure_tree(text).unwrap_or_else(|err| {
            tracing::warn!(language = "css", error = %err, "structure analysis degraded");
            Vec::new()
        });

        for pattern in &self.patterns().functions {
            for caps in pattern.captures_iter(text) {
                let whole = caps.get(0).unwrap();
                let start_line = line_of_offset(text, whole.start());
                let end_line = text[whole.end()..]
                    .find('{')
                    .map(|i| whole.end() + i)
                    .and_then(|open| matching_brace(text, open))
                    .map(|close| line_of_offset(text, close))
                    .unwrap_or(start_line);
                nodes.push(StructureNode {
                    kind: NodeKind::Function,
                    name: caps.get(1).map(|m| m.as_str()).unwrap_or("").to_string(),
                    start_line,
                    end_line,
                });
            }
        }

        nodes.sort_by_key(|n| (n.start_line, n.name.clone()));
        nodes
    }

    fn detect_syntax_errors(&self, text: &str) -> Vec<SyntaxDiagnostic> {
        match ast::parse(&self.language, text) {
            Ok(tree) => ast::syntax_diagnostics(tree.root_node(), text.as_bytes()),
            Err(err) => {
                tracing::warn!(language = "css", error = %err, "syntax check degraded");
                Vec::new()
            }
        }
    }

    fn generate_imports(&self, deps: &[String]) -> String {
        deps.iter()
            .map(|dep| format!("@import '{dep}';\n"))
            .collect::<String>()
    }

    fn generate_function(
        &self,
        name: &str,
        params: &[String],
        _return_type: Option<&str>,
        body: &str,
    ) -> String {
        let param_list = if params.is_empty() {
            String::new()
        } else {
            format!("({})", params.join(", "))
        };
        let indented = text::indent_lines(body, "  ");
        let body_block = if indented.is_empty() || indented.ends_with('\n') {
            indented
        } else {
            format!("{indented}\n")
        };
        format!("@mixin {name}{param_list} {{\n{body_block}}}\n")
    }

    /// Classes map to a class-selector rule; CSS has no methods, so only
    /// the property declarations are rendered.
    fn generate_class(&self, name: &str, properties: &[String], _methods: &[String]) -> String {
        let mut out = format!(".{name} {{\n");
        for property in properties {
            let declaration = property.trim().trim_end_matches(';');
            out.push_str(&format!("  {declaration};\n"));
        }
        out.push_str("}\n");
        out
    }

    fn validate_syntax(&self, text: &str) -> bool {
        match ast::parse(&self.language, text) {
            Ok(tree) => !tree.root_node().has_error(),
            Err(_) => false,
        }
    }

    /// All `@import`/`@use` statements must precede any other statement.
    fn validate_imports(&self, text: &str) -> bool {
        let stripped = BLOCK_COMMENT_RE.replace_all(text, "");
        let mut seen_other = false;
        for line in stripped.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with("@import") || trimmed.starts_with("@use") {
                if seen_other {
                    return false;
                }
            } else {
                seen_other = true;
            }
        }
        true
    }

    /// Flat CSS only: no rule may nest another rule.
    fn validate_structure(&self, text: &str) -> bool {
        self.nesting_free(text).unwrap_or_else(|err| {
            tracing::warn!(language = "css", error = %err, "structure validation degraded");
            false
        })
    }

    fn format_code(&self, text: &str) -> String {
        text::reindent_braces(text, "  ")
    }

    fn wrap_in_function(&self, text: &str, name: &str) -> String {
        let indented = text::indent_lines(text, "  ");
        let body = if indented.is_empty() || indented.ends_with('\n') {
            indented
        } else {
            format!("{indented}\n")
        };
        format!("@mixin {name} {{\n{body}}}\n")
    }
}
