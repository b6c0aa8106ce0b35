//! HTML handler backed by the tree-sitter HTML grammar.
//!
//! Dependencies come from `<link rel="stylesheet">`, `<script src>` and
//! `<img src>` elements; functions are scanned out of `<script>` blocks with
//! the pattern layer since the HTML grammar treats script bodies as raw
//! text.

use std::collections::{BTreeSet, HashSet};

use lazy_static::lazy_static;
use regex::Regex;
use tree_sitter::{Language, Node};

use crate::patterns::{LanguagePatterns, HTML};

use super::ast::{self, AnalysisError};
use super::text;
use super::{FunctionInfo, LanguageHandler, NodeKind, StructureNode, SyntaxDiagnostic};

const ELEMENT_KINDS: [&str; 3] = ["element", "script_element", "style_element"];

const VOID_TAGS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

lazy_static! {
    /// Branch markers counted inside `<script>` blocks.
    static ref SCRIPT_BRANCH_RES: Vec<Regex> = vec![
        Regex::new(r"\bif\s*\(").unwrap(),
        Regex::new(r"\belse\s+if\s*\(").unwrap(),
        Regex::new(r"\bfor\s*\(").unwrap(),
        Regex::new(r"\bwhile\s*\(").unwrap(),
        Regex::new(r"\bswitch\s*\(").unwrap(),
    ];
    static ref IMAGE_EXT_RE: Regex =
        Regex::new(r"(?i)\.(png|jpe?g|gif|svg|webp|ico)$").unwrap();
}

pub struct HtmlHandler {
    language: Language,
}

impl HtmlHandler {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_html::LANGUAGE.into(),
        }
    }

    fn dependencies_tree(&self, text: &str) -> Result<BTreeSet<String>, AnalysisError> {
        let tree = ast::parse(&self.language, text)?;
        let source = text.as_bytes();
        let mut dependencies = BTreeSet::new();
        collect_dependencies(tree.root_node(), source, &mut dependencies);
        Ok(dependencies)
    }

    fn functions_tree(&self, text: &str) -> Result<Vec<FunctionInfo>, AnalysisError> {
        let tree = ast::parse(&self.language, text)?;
        let source = text.as_bytes();
        let mut scripts = Vec::new();
        collect_script_bodies(tree.root_node(), source, &mut scripts);

        let mut functions = Vec::new();
        for script in scripts {
            // Every function in a block shares the block's branch count.
            let branches = script_branch_count(&script);
            for pattern in &self.patterns().functions {
                for caps in pattern.captures_iter(&script) {
                    functions.push(FunctionInfo {
                        name: caps.get(1).map(|m| m.as_str()).unwrap_or("").to_string(),
                        params: caps
                            .get(2)
                            .map(|m| {
                                m.as_str()
                                    .split(',')
                                    .map(|p| p.trim().to_string())
                                    .filter(|p| !p.is_empty())
                                    .collect()
                            })
                            .unwrap_or_default(),
                        return_type: None,
                        complexity: 1 + branches,
                    });
                }
            }
        }
        Ok(functions)
    }

    fn structure_tree(&self, text: &str) -> Result<Vec<StructureNode>, AnalysisError> {
        let tree = ast::parse(&self.language, text)?;
        let source = text.as_bytes();
        let mut nodes = Vec::new();
        collect_structure(tree.root_node(), source, &mut nodes);
        Ok(nodes)
    }

    fn stylesheets_in_head(&self, text: &str) -> Result<bool, AnalysisError> {
        let tree = ast::parse(&self.language, text)?;
        let source = text.as_bytes();

        let mut head_range = None;
        let mut links = Vec::new();
        collect_links_and_head(tree.root_node(), source, &mut head_range, &mut links);

        if links.is_empty() {
            return Ok(true);
        }
        let Some((head_start, head_end)) = head_range else {
            return Ok(false);
        };
        Ok(links
            .iter()
            .all(|&(start, end)| start >= head_start && end <= head_end))
    }

    fn required_tags_present(&self, text: &str) -> Result<bool, AnalysisError> {
        let tree = ast::parse(&self.language, text)?;
        let source = text.as_bytes();
        let mut tags = HashSet::new();
        collect_tag_names(tree.root_node(), source, &mut tags);
        Ok(["html", "head", "body", "title"]
            .iter()
            .all(|t| tags.contains(*t)))
    }

    fn render_import(&self, dep: &str) -> String {
        if dep.to_lowercase().ends_with(".css") {
            format!(r#"<link rel="stylesheet" href="{dep}">"#)
        } else if IMAGE_EXT_RE.is_match(dep) {
            format!(r#"<img src="{dep}" alt="">"#)
        } else {
            format!(r#"<script src="{dep}"></script>"#)
        }
    }
}

impl Default for HtmlHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn start_tag_of(node: Node) -> Option<Node> {
    let mut cursor = node.walk();
    let result = node
        .children(&mut cursor)
        .find(|c| matches!(c.kind(), "start_tag" | "self_closing_tag"));
    result
}

fn tag_name_of(start_tag: Node, source: &[u8]) -> String {
    let mut cursor = start_tag.walk();
    let result = start_tag
        .children(&mut cursor)
        .find(|c| c.kind() == "tag_name")
        .and_then(|n| n.utf8_text(source).ok())
        .unwrap_or("")
        .to_lowercase();
    result
}

fn attributes_of(start_tag: Node, source: &[u8]) -> Vec<(String, String)> {
    let mut attributes = Vec::new();
    let mut cursor = start_tag.walk();
    for child in start_tag.children(&mut cursor) {
        if child.kind() != "attribute" {
            continue;
        }
        let mut name = String::new();
        let mut value = String::new();
        let mut attr_cursor = child.walk();
        for part in child.children(&mut attr_cursor) {
            match part.kind() {
                "attribute_name" => {
                    name = part.utf8_text(source).unwrap_or("").to_lowercase();
                }
                "attribute_value" => {
                    value = part.utf8_text(source).unwrap_or("").to_string();
                }
                "quoted_attribute_value" => {
                    value = part
                        .utf8_text(source)
                        .unwrap_or("")
                        .trim_matches(|c| c == '"' || c == '\'')
                        .to_string();
                }
                _ => {}
            }
        }
        if !name.is_empty() {
            attributes.push((name, value));
        }
    }
    attributes
}

fn attribute<'a>(attributes: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

fn collect_dependencies(node: Node, source: &[u8], out: &mut BTreeSet<String>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if ELEMENT_KINDS.contains(&child.kind()) {
            if let Some(start_tag) = start_tag_of(child) {
                let tag = tag_name_of(start_tag, source);
                let attributes = attributes_of(start_tag, source);
                let specifier = match tag.as_str() {
                    "link" => {
                        if attribute(&attributes, "rel") == Some("stylesheet") {
                            attribute(&attributes, "href")
                        } else {
                            None
                        }
                    }
                    "script" | "img" => attribute(&attributes, "src"),
                    _ => None,
                };
                if let Some(specifier) = specifier {
                    if !specifier.is_empty() {
                        out.insert(specifier.to_string());
                    }
                }
            }
        }
        collect_dependencies(child, source, out);
    }
}

fn collect_script_bodies(node: Node, source: &[u8], out: &mut Vec<String>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "script_element" {
            let mut script_cursor = child.walk();
            let raw_text = child
                .children(&mut script_cursor)
                .find(|c| c.kind() == "raw_text");
            if let Some(raw) = raw_text {
                if let Ok(body) = raw.utf8_text(source) {
                    out.push(body.to_string());
                }
            }
        }
        collect_script_bodies(child, source, out);
    }
}

fn collect_structure(node: Node, source: &[u8], out: &mut Vec<StructureNode>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "script_element" | "style_element" => {
                let name = if child.kind() == "script_element" {
                    "script"
                } else {
                    "style"
                };
                out.push(StructureNode {
                    kind: NodeKind::Other,
                    name: name.to_string(),
                    start_line: child.start_position().row,
                    end_line: child.end_position().row,
                });
            }
            "element" => {
                if let Some(start_tag) = start_tag_of(child) {
                    let tag = tag_name_of(start_tag, source);
                    let attributes = attributes_of(start_tag, source);
                    let name = match attribute(&attributes, "id") {
                        Some(id) if !id.is_empty() => format!("{tag}#{id}"),
                        _ => tag,
                    };
                    out.push(StructureNode {
                        kind: NodeKind::Other,
                        name,
                        start_line: child.start_position().row,
                        end_line: child.end_position().row,
                    });
                }
            }
            _ => {}
        }
        collect_structure(child, source, out);
    }
}

fn collect_links_and_head(
    node: Node,
    source: &[u8],
    head_range: &mut Option<(usize, usize)>,
    links: &mut Vec<(usize, usize)>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if ELEMENT_KINDS.contains(&child.kind()) {
            if let Some(start_tag) = start_tag_of(child) {
                let tag = tag_name_of(start_tag, source);
                if tag == "head" && head_range.is_none() {
                    *head_range = Some((child.start_byte(), child.end_byte()));
                } else if tag == "link" {
                    let attributes = attributes_of(start_tag, source);
                    if attribute(&attributes, "rel") == Some("stylesheet") {
                        links.push((child.start_byte(), child.end_byte()));
                    }
                }
            }
        }
        collect_links_and_head(child, source, head_range, links);
    }
}

fn collect_tag_names(node: Node, source: &[u8], out: &mut HashSet<String>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if ELEMENT_KINDS.contains(&child.kind()) {
            if let Some(start_tag) = start_tag_of(child) {
                out.insert(tag_name_of(start_tag, source));
            }
        }
        collect_tag_names(child, source, out);
    }
}

/// Diagnostics for mismatched closing tags, which the grammar tolerates
/// without marking the tree erroneous.
fn erroneous_end_tags(node: Node, out: &mut Vec<SyntaxDiagnostic>) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "erroneous_end_tag" {
            let position = child.start_position();
            out.push(SyntaxDiagnostic {
                line: position.row,
                column: position.column,
                message: "mismatched closing tag".to_string(),
            });
        }
        erroneous_end_tags(child, out);
    }
}

fn script_branch_count(script: &str) -> u32 {
    let mut count: u32 = SCRIPT_BRANCH_RES
        .iter()
        .map(|re| re.find_iter(script).count() as u32)
        .sum();
    count += ternary_count(script);
    count
}

/// Occurrences of `?` that are not optional chaining or nullish coalescing.
fn ternary_count(script: &str) -> u32 {
    let chars: Vec<char> = script.chars().collect();
    let mut count = 0;
    for (i, &c) in chars.iter().enumerate() {
        if c != '?' {
            continue;
        }
        let prev = i.checked_sub(1).and_then(|j| chars.get(j));
        let next = chars.get(i + 1);
        if prev == Some(&'?') || next == Some(&'?') || next == Some(&'.') {
            continue;
        }
        count += 1;
    }
    count
}

impl LanguageHandler for HtmlHandler {
    fn language_id(&self) -> &'static str {
        "html"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["html", "htm"]
    }

    fn patterns(&self) -> &'static LanguagePatterns {
        &HTML
    }

    fn analyze_dependencies(&self, text: &str) -> BTreeSet<String> {
        self.dependencies_tree(text).unwrap_or_else(|err| {
            tracing::warn!(language = "html", error = %err, "dependency analysis degraded");
            BTreeSet::new()
        })
    }

    fn analyze_functions(&self, text: &str) -> Vec<FunctionInfo> {
        self.functions_tree(text).unwrap_or_else(|err| {
            tracing::warn!(language = "html", error = %err, "function analysis degraded");
            Vec::new()
        })
    }

    fn analyze_structure(&self, text: &str) -> Vec<StructureNode> {
        self.structure_tree(text).unwrap_or_else(|err| {
            tracing::warn!(language = "html", error = %err, "structure analysis degraded");
            Vec::new()
        })
    }

    fn detect_syntax_errors(&self, text: &str) -> Vec<SyntaxDiagnostic> {
        match ast::parse(&self.language, text) {
            Ok(tree) => {
                let mut diagnostics = ast::syntax_diagnostics(tree.root_node(), text.as_bytes());
                erroneous_end_tags(tree.root_node(), &mut diagnostics);
                diagnostics.sort_by_key(|d| (d.line, d.column));
                diagnostics
            }
            Err(err) => {
                tracing::warn!(language = "html", error = %err, "syntax check degraded");
                Vec::new()
            }
        }
    }

    fn generate_imports(&self, deps: &[String]) -> String {
        deps.iter()
            .map(|dep| format!("{}\n", self.render_import(dep)))
            .collect::<String>()
    }

    fn generate_function(
        &self,
        name: &str,
        params: &[String],
        _return_type: Option<&str>,
        body: &str,
    ) -> String {
        let indented = text::indent_lines(body, "  ");
        let body_block = if indented.is_empty() || indented.ends_with('\n') {
            indented
        } else {
            format!("{indented}\n")
        };
        format!(
            "<script>\nfunction {name}({}) {{\n{body_block}}}\n</script>\n",
            params.join(", ")
        )
    }

    /// Classes become a `<div>` with that class: one `<span>` per property
    /// and a script block with one function stub per method.
    fn generate_class(&self, name: &str, properties: &[String], methods: &[String]) -> String {
        let mut out = format!(r#"<div class="{name}">"#);
        out.push('\n');
        for property in properties {
            out.push_str(&format!(r#"  <span class="{property}"></span>"#));
            out.push('\n');
        }
        if !methods.is_empty() {
            out.push_str("  <script>\n");
            for method in methods {
                out.push_str(&format!("    function {method}() {{\n    }}\n"));
            }
            out.push_str("  </script>\n");
        }
        out.push_str("</div>\n");
        out
    }

    fn validate_syntax(&self, text: &str) -> bool {
        self.detect_syntax_errors(text).is_empty()
    }

    /// Stylesheet links belong in `<head>`.
    fn validate_imports(&self, text: &str) -> bool {
        self.stylesheets_in_head(text).unwrap_or_else(|err| {
            tracing::warn!(language = "html", error = %err, "import validation degraded");
            false
        })
    }

    /// A complete document carries `html`, `head`, `body` and `title`.
    fn validate_structure(&self, text: &str) -> bool {
        self.required_tags_present(text).unwrap_or_else(|err| {
            tracing::warn!(language = "html", error = %err, "structure validation degraded");
            false
        })
    }

    fn format_code(&self, text: &str) -> String {
        let open_re = &self.patterns().blocks[0];
        let close_re = &self.patterns().blocks[1];
        let mut depth: usize = 0;
        let mut lines = Vec::new();

        for raw in text.lines() {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                lines.push(String::new());
                continue;
            }

            let opens = open_re
                .captures_iter(trimmed)
                .filter(|caps| {
                    let tag = caps.get(1).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
                    let whole = caps.get(0).map(|m| m.as_str()).unwrap_or("");
                    !VOID_TAGS.contains(&tag.as_str()) && !whole.ends_with("/>")
                })
                .count();
            let closes = close_re.find_iter(trimmed).count();

            let own_depth = if trimmed.starts_with("</") {
                depth.saturating_sub(1)
            } else {
                depth
            };
            lines.push(format!("{}{}", "  ".repeat(own_depth), trimmed));
            depth = (depth + opens).saturating_sub(closes);
        }

        text::join_preserving_final_newline(text, lines)
    }

    /// Link elements go to the end of `<head>`, everything else to the end
    /// of `<body>`; files without those sections degrade to top/bottom
    /// placement.
    fn inject_imports(&self, text: &str, deps: &[String]) -> String {
        let existing: HashSet<String> = self.analyze_imports(text).into_iter().collect();
        let mut head_inserts = Vec::new();
        let mut body_inserts = Vec::new();
        let mut requested = HashSet::new();
        for dep in deps {
            if existing.contains(dep) || !requested.insert(dep.clone()) {
                continue;
            }
            if dep.to_lowercase().ends_with(".css") {
                head_inserts.push(self.render_import(dep));
            } else {
                body_inserts.push(self.render_import(dep));
            }
        }
        if head_inserts.is_empty() && body_inserts.is_empty() {
            return text.to_string();
        }

        let lines: Vec<&str> = text.lines().collect();
        let head_close = lines
            .iter()
            .position(|l| l.to_lowercase().contains("</head>"));
        let body_close = lines
            .iter()
            .rposition(|l| l.to_lowercase().contains("</body>"));

        let mut out: Vec<String> = Vec::with_capacity(lines.len() + deps.len());
        for (i, line) in lines.iter().enumerate() {
            if Some(i) == head_close {
                let indent = leading_whitespace(line);
                for insert in head_inserts.drain(..) {
                    out.push(format!("{indent}  {insert}"));
                }
            }
            if Some(i) == body_close {
                let indent = leading_whitespace(line);
                for insert in body_inserts.drain(..) {
                    out.push(format!("{indent}  {insert}"));
                }
            }
            out.push(line.to_string());
        }
        // No matching section: links lead the file, scripts trail it.
        for insert in head_inserts.drain(..).rev() {
            out.insert(0, insert);
        }
        out.extend(body_inserts.drain(..));

        if text.is_empty() {
            return out.join("\n") + "\n";
        }
        text::join_preserving_final_newline(text, out)
    }

    fn wrap_in_function(&self, text: &str, name: &str) -> String {
        let indented = text::indent_lines(text, "  ");
        let body = if indented.is_empty() || indented.ends_with('\n') {
            indented
        } else {
            format!("{indented}\n")
        };
        format!("<script>\nfunction {name}() {{\n{body}}}\n</script>\n")
    }
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> HtmlHandler {
        HtmlHandler::new()
    }

    const DOC: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Demo</title>
  <link rel="stylesheet" href="main.css">
</head>
<body>
  <div id="app"></div>
  <img src="logo.png" alt="logo">
  <script src="app.js"></script>
  <script>
    function greet(name) {
      if (name) {
        return "hi " + name;
      }
      return name ? name : "anonymous";
    }
  </script>
</body>
</html>
"#;

    #[test]
    fn test_analyze_dependencies() {
        let deps = handler().analyze_dependencies(DOC);
        assert_eq!(
            deps.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["app.js", "logo.png", "main.css"]
        );
    }

    #[test]
    fn test_analyze_functions_in_script_blocks() {
        let functions = handler().analyze_functions(DOC);
        let greet = functions.iter().find(|f| f.name == "greet").unwrap();
        assert_eq!(greet.params, vec!["name"]);
        // 1 base + if( + ternary
        assert_eq!(greet.complexity, 3);
    }

    #[test]
    fn test_ternary_count_skips_chaining() {
        assert_eq!(ternary_count("a ? b : c"), 1);
        assert_eq!(ternary_count("a?.b ?? c"), 0);
    }

    #[test]
    fn test_analyze_structure_tags_and_ids() {
        let structure = handler().analyze_structure(DOC);
        assert!(structure.iter().any(|n| n.name == "html"));
        assert!(structure.iter().any(|n| n.name == "div#app"));
        assert!(structure.iter().any(|n| n.name == "script"));
        assert!(structure.iter().all(|n| n.kind == NodeKind::Other));
        assert!(structure.iter().all(|n| n.start_line <= n.end_line));
    }

    #[test]
    fn test_validate_structure_requires_title() {
        let handler = handler();
        assert!(handler.validate_structure(DOC));

        let missing_title =
            "<html><head></head><body><p>hi</p></body></html>";
        assert!(!handler.validate_structure(missing_title));

        let with_title =
            "<html><head><title>X</title></head><body><p>hi</p></body></html>";
        assert!(handler.validate_structure(with_title));
    }

    #[test]
    fn test_validate_imports_link_placement() {
        let handler = handler();
        assert!(handler.validate_imports(DOC));

        let link_in_body = "<html><head><title>X</title></head><body><link rel=\"stylesheet\" href=\"a.css\"></body></html>";
        assert!(!handler.validate_imports(link_in_body));
    }

    #[test]
    fn test_inject_imports_placement() {
        let handler = handler();
        let deps = vec!["extra.css".to_string(), "extra.js".to_string()];
        let injected = handler.inject_imports(DOC, &deps);

        let head_end = injected.find("</head>").unwrap();
        let body_end = injected.find("</body>").unwrap();
        let link_at = injected
            .find(r#"<link rel="stylesheet" href="extra.css">"#)
            .unwrap();
        let script_at = injected.find(r#"<script src="extra.js"></script>"#).unwrap();
        assert!(link_at < head_end);
        assert!(head_end < script_at && script_at < body_end);

        assert_eq!(handler.inject_imports(&injected, &deps), injected);
    }

    #[test]
    fn test_generate_imports_by_extension() {
        let rendered = handler().generate_imports(&[
            "a.css".to_string(),
            "b.js".to_string(),
            "c.png".to_string(),
        ]);
        assert_eq!(
            rendered,
            "<link rel=\"stylesheet\" href=\"a.css\">\n<script src=\"b.js\"></script>\n<img src=\"c.png\" alt=\"\">\n"
        );
    }

    #[test]
    fn test_detect_mismatched_closing_tag() {
        let diagnostics = handler().detect_syntax_errors("<div></span></div>");
        assert!(!diagnostics.is_empty());
    }

    #[test]
    fn test_format_reindents_by_tag_depth() {
        let messy = "<html>\n<body>\n<p>hi</p>\n</body>\n</html>\n";
        let formatted = handler().format_code(messy);
        assert_eq!(formatted, "<html>\n  <body>\n    <p>hi</p>\n  </body>\n</html>\n");
    }

    #[test]
    fn test_wrap_in_function() {
        let wrapped = handler().wrap_in_function("console.log(1);", "boot");
        assert_eq!(
            wrapped,
            "<script>\nfunction boot() {\n  console.log(1);\n}\n</script>\n"
        );
    }
}
