//! Python handler. No syntax tree here: imports, functions and structure
//! come from line scanning, and syntax checking is a set of heuristics
//! (indentation stack, `def`/`class` headers, bracket balance). Weaker than
//! a parser by design; it can miss and over-report.

use std::collections::BTreeSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::patterns::{LanguagePatterns, PYTHON};

use super::text;
use super::{FunctionInfo, LanguageHandler, NodeKind, StructureNode, SyntaxDiagnostic};

lazy_static! {
    static ref DEF_RE: Regex = Regex::new(r"^(\s*)def\s+([A-Za-z_]\w*)\s*\(").unwrap();
    static ref CLASS_RE: Regex = Regex::new(r"^(\s*)class\s+([A-Za-z_]\w*)").unwrap();
    static ref INIT_RE: Regex = Regex::new(r"^\s*def\s+__init__\s*\(").unwrap();
    static ref ASSIGN_RE: Regex = Regex::new(r"^([A-Za-z_]\w*)\s*(?::[^=]+)?=[^=]").unwrap();
    static ref HEADER_RE: Regex = Regex::new(r"^\s*(?:async\s+)?(?:def|class)\b").unwrap();
    /// One regex per counted branch keyword; every occurrence adds one.
    static ref BRANCH_RES: Vec<Regex> = ["if", "elif", "for", "while", "and", "or"]
        .iter()
        .map(|kw| Regex::new(&format!(r"\b{kw}\b")).unwrap())
        .collect();
}

pub struct PythonHandler;

impl PythonHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PythonHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks triple-quoted string state across a line scan.
#[derive(Default)]
struct DocstringTracker {
    inside: bool,
    delimiter: &'static str,
}

impl DocstringTracker {
    /// Feed one line; returns true when the line is part of (or opens or
    /// closes) a triple-quoted string and should be skipped.
    fn consume(&mut self, trimmed: &str) -> bool {
        if self.inside {
            if trimmed.contains(self.delimiter) {
                self.inside = false;
            }
            return true;
        }
        for delimiter in [r#"""""#, "'''"] {
            if let Some(start) = trimmed.find(delimiter) {
                // Only treat it as a docstring opener when the line starts
                // with it; an inline literal is left to the line itself.
                if start == 0 {
                    let rest = &trimmed[delimiter.len()..];
                    if !rest.contains(delimiter) {
                        self.inside = true;
                        self.delimiter = delimiter;
                    }
                    return true;
                }
            }
        }
        false
    }
}

/// Index of the last line of the block opened at `start`: the block runs
/// until the first subsequent non-blank line indented at or left of the
/// header.
fn block_end(lines: &[&str], start: usize) -> usize {
    let header_indent = text::indent_width(lines[start]);
    let mut end = start;
    for (offset, line) in lines.iter().enumerate().skip(start + 1) {
        if line.trim().is_empty() {
            continue;
        }
        if text::indent_width(line) <= header_indent {
            break;
        }
        end = offset;
    }
    end
}

/// Byte index of the `)` matching the `(` at `open`.
fn matching_paren(header: &str, open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in header.char_indices().skip_while(|&(i, _)| i < open) {
        match c {
            '(' => depth += 1,
            ')' => {
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

/// Split a raw parameter list on top-level commas and strip annotations and
/// defaults, keeping `*`/`**` prefixes.
fn split_params(raw: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in raw.chars() {
        match c {
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                params.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    params.push(current);

    params
        .iter()
        .map(|p| {
            p.split([':', '='])
                .next()
                .unwrap_or("")
                .trim()
                .to_string()
        })
        .filter(|p| !p.is_empty())
        .collect()
}

/// Cut a trailing `#` comment, respecting string literals.
fn strip_comment(line: &str) -> &str {
    for (i, c) in line.char_indices() {
        if c == '#' && !text::is_inside_string_literal(line, i) {
            return &line[..i];
        }
    }
    line
}

impl LanguageHandler for PythonHandler {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn patterns(&self) -> &'static LanguagePatterns {
        &PYTHON
    }

    fn analyze_dependencies(&self, text: &str) -> BTreeSet<String> {
        let mut dependencies = BTreeSet::new();
        let mut docstrings = DocstringTracker::default();

        for line in text.lines() {
            let trimmed = line.trim();
            if docstrings.consume(trimmed) {
                continue;
            }
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            for pattern in &self.patterns().imports {
                if let Some(caps) = pattern.captures(line) {
                    let module = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                    let top_level = module.split('.').next().unwrap_or(module);
                    if !top_level.is_empty() {
                        dependencies.insert(top_level.to_string());
                    }
                }
            }
        }

        dependencies
    }

    fn analyze_functions(&self, text: &str) -> Vec<FunctionInfo> {
        let lines: Vec<&str> = text.lines().collect();
        let mut functions = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            let Some(caps) = DEF_RE.captures(line) else {
                continue;
            };
            let name = caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string();

            // Collect the header, which may span lines until its brackets
            // close.
            let mut header = String::new();
            let mut depth = 0i32;
            let mut header_end = i;
            for (j, header_line) in lines.iter().enumerate().skip(i) {
                header.push_str(header_line);
                header.push('\n');
                depth += text::bracket_delta(header_line);
                if depth <= 0 {
                    header_end = j;
                    break;
                }
            }

            let params = header
                .find('(')
                .and_then(|open| {
                    matching_paren(&header, open).map(|close| split_params(&header[open + 1..close]))
                })
                .unwrap_or_default();

            let return_type = header
                .find("->")
                .map(|arrow| header[arrow + 2..].trim())
                .map(|t| t.trim_end_matches(':').trim().to_string())
                .filter(|t| !t.is_empty());

            let end = block_end(&lines, i);
            let mut complexity = 1u32;
            for body_line in lines.iter().take(end + 1).skip(header_end + 1) {
                let code = strip_comment(body_line);
                for branch in BRANCH_RES.iter() {
                    complexity += branch.find_iter(code).count() as u32;
                }
            }

            functions.push(FunctionInfo {
                name,
                params,
                return_type,
                complexity,
            });
        }

        functions
    }

    fn analyze_structure(&self, text: &str) -> Vec<StructureNode> {
        let lines: Vec<&str> = text.lines().collect();
        let mut nodes = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            if let Some(caps) = DEF_RE.captures(line) {
                nodes.push(StructureNode {
                    kind: NodeKind::Function,
                    name: caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string(),
                    start_line: i,
                    end_line: block_end(&lines, i),
                });
            } else if let Some(caps) = CLASS_RE.captures(line) {
                nodes.push(StructureNode {
                    kind: NodeKind::Class,
                    name: caps.get(2).map(|m| m.as_str()).unwrap_or("").to_string(),
                    start_line: i,
                    end_line: block_end(&lines, i),
                });
            } else if let Some(caps) = ASSIGN_RE.captures(line) {
                nodes.push(StructureNode {
                    kind: NodeKind::Variable,
                    name: caps.get(1).map(|m| m.as_str()).unwrap_or("").to_string(),
                    start_line: i,
                    end_line: i,
                });
            }
        }

        nodes
    }

    fn detect_syntax_errors(&self, text: &str) -> Vec<SyntaxDiagnostic> {
        let mut diagnostics = Vec::new();
        let mut docstrings = DocstringTracker::default();
        let mut indent_stack: Vec<usize> = vec![0];
        let mut depth = 0i32;
        let mut pending_header: Option<usize> = None;
        let mut last_line = 0;

        for (i, line) in text.lines().enumerate() {
            last_line = i;
            let trimmed = line.trim();
            if docstrings.consume(trimmed) {
                continue;
            }
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let code = strip_comment(line);
            let at_statement_start = depth == 0;

            if at_statement_start {
                let indent = text::indent_width(line);
                let top = *indent_stack.last().unwrap_or(&0);
                if indent > top {
                    indent_stack.push(indent);
                } else if indent < top {
                    while indent_stack.len() > 1 && *indent_stack.last().unwrap() > indent {
                        indent_stack.pop();
                    }
                    if *indent_stack.last().unwrap() != indent {
                        diagnostics.push(SyntaxDiagnostic {
                            line: i,
                            column: 0,
                            message: "unindent does not match any outer indentation level"
                                .to_string(),
                        });
                        indent_stack.push(indent);
                    }
                }

                if HEADER_RE.is_match(code) {
                    pending_header = Some(i);
                }
            }

            depth += text::bracket_delta(code);
            if depth < 0 {
                diagnostics.push(SyntaxDiagnostic {
                    line: i,
                    column: 0,
                    message: "unmatched closing bracket".to_string(),
                });
                depth = 0;
            }

            if depth == 0 {
                if let Some(header_line) = pending_header.take() {
                    let end = strip_comment(line).trim_end();
                    if !end.ends_with(':') {
                        diagnostics.push(SyntaxDiagnostic {
                            line: header_line,
                            column: 0,
                            message: "expected ':' at end of definition".to_string(),
                        });
                    }
                }
            }
        }

        if depth > 0 {
            diagnostics.push(SyntaxDiagnostic {
                line: last_line,
                column: 0,
                message: "unclosed bracket at end of file".to_string(),
            });
        }

        diagnostics
    }

    fn generate_imports(&self, deps: &[String]) -> String {
        deps.iter()
            .map(|dep| format!("import {dep}\n"))
            .collect::<String>()
    }

    fn generate_function(
        &self,
        name: &str,
        params: &[String],
        return_type: Option<&str>,
        body: &str,
    ) -> String {
        let annotation = return_type.map(|t| format!(" -> {t}")).unwrap_or_default();
        let rendered_body = if body.trim().is_empty() {
            "    pass\n".to_string()
        } else {
            let indented = text::indent_lines(body, "    ");
            if indented.ends_with('\n') {
                indented
            } else {
                format!("{indented}\n")
            }
        };
        format!(
            "def {name}({}){annotation}:\n{rendered_body}",
            params.join(", ")
        )
    }

    fn generate_class(&self, name: &str, properties: &[String], methods: &[String]) -> String {
        let mut out = format!("class {name}:\n    def __init__(self):\n");
        if properties.is_empty() {
            out.push_str("        pass\n");
        } else {
            for property in properties {
                let bare = property.split([':', '=']).next().unwrap_or("").trim();
                out.push_str(&format!("        self.{bare} = None\n"));
            }
        }
        for method in methods {
            out.push('\n');
            if method.contains('(') {
                let indented = text::indent_lines(method, "    ");
                out.push_str(&indented);
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            } else {
                out.push_str(&format!("    def {method}(self):\n        pass\n"));
            }
        }
        out
    }

    fn validate_syntax(&self, text: &str) -> bool {
        self.detect_syntax_errors(text).is_empty()
    }

    fn validate_imports(&self, text: &str) -> bool {
        let mut docstrings = DocstringTracker::default();
        let mut seen_statement = false;

        for line in text.lines() {
            let trimmed = line.trim();
            if docstrings.consume(trimmed) {
                continue;
            }
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let is_import = self.patterns().imports.iter().any(|p| p.is_match(line));
            if is_import {
                if seen_statement {
                    return false;
                }
            } else {
                seen_statement = true;
            }
        }

        true
    }

    fn validate_structure(&self, text: &str) -> bool {
        let lines: Vec<&str> = text.lines().collect();
        let mut classes: Vec<(usize, usize)> = Vec::new();

        for (i, line) in lines.iter().enumerate() {
            if CLASS_RE.is_match(line) {
                classes.push((i, block_end(&lines, i)));
            }
        }

        for &(start, end) in &classes {
            // A class header inside another class block is a nesting
            // violation.
            if classes
                .iter()
                .any(|&(other, _)| other > start && other <= end)
            {
                return false;
            }
            let has_init = lines
                .iter()
                .take(end + 1)
                .skip(start + 1)
                .any(|line| INIT_RE.is_match(line));
            if !has_init {
                return false;
            }
        }

        true
    }

    fn format_code(&self, text: &str) -> String {
        let lines: Vec<String> = text
            .lines()
            .map(|line| {
                let indent = line.len() - line.trim_start_matches(['\t', ' ']).len();
                let (head, tail) = line.split_at(indent);
                let expanded: String = head
                    .chars()
                    .map(|c| if c == '\t' { "    " } else { " " })
                    .collect();
                format!("{expanded}{tail}").trim_end().to_string()
            })
            .collect();
        text::join_preserving_final_newline(text, lines)
    }

    fn wrap_in_function(&self, text: &str, name: &str) -> String {
        if text.trim().is_empty() {
            return format!("def {name}():\n    pass\n");
        }
        let indented = text::indent_lines(text, "    ");
        let body = if indented.ends_with('\n') {
            indented
        } else {
            format!("{indented}\n")
        };
        format!("def {name}():\n{body}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> PythonHandler {
        PythonHandler::new()
    }

    #[test]
    fn test_analyze_dependencies_top_level_names() {
        let deps = handler().analyze_dependencies("import os.path\nfrom sys import argv\n");
        assert_eq!(
            deps.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["os", "sys"]
        );
    }

    #[test]
    fn test_dependencies_skip_docstrings_and_comments() {
        let source = r#""""
import fake
"""
# import commented
import real
"#;
        let deps = handler().analyze_dependencies(source);
        assert_eq!(deps.iter().map(String::as_str).collect::<Vec<_>>(), vec!["real"]);
    }

    #[test]
    fn test_analyze_functions_keyword_complexity() {
        let source = r#"
def check(a, b):
    if a and b:
        return True
    for i in range(a):
        while i or b:
            i -= 1
    return False
"#;
        let functions = handler().analyze_functions(source);
        let check = functions.iter().find(|f| f.name == "check").unwrap();
        assert_eq!(check.params, vec!["a", "b"]);
        // 1 base + if + and + for + while + or
        assert_eq!(check.complexity, 6);
    }

    #[test]
    fn test_function_signature_parsing() {
        let source = "def fetch(url: str, timeout=30, *args, **kwargs) -> dict:\n    return {}\n";
        let functions = handler().analyze_functions(source);
        assert_eq!(functions[0].params, vec!["url", "timeout", "*args", "**kwargs"]);
        assert_eq!(functions[0].return_type.as_deref(), Some("dict"));
        assert_eq!(functions[0].complexity, 1);
    }

    #[test]
    fn test_structure_block_ranges() {
        let source = "class A:\n    def __init__(self):\n        self.x = 1\n\n    def go(self):\n        pass\n\nTOP = 3\n";
        let structure = handler().analyze_structure(source);

        let class_a = structure.iter().find(|n| n.name == "A").unwrap();
        assert_eq!(class_a.kind, NodeKind::Class);
        assert_eq!((class_a.start_line, class_a.end_line), (0, 5));

        let init = structure.iter().find(|n| n.name == "__init__").unwrap();
        assert_eq!((init.start_line, init.end_line), (1, 2));

        let top = structure.iter().find(|n| n.name == "TOP").unwrap();
        assert_eq!(top.kind, NodeKind::Variable);
        assert_eq!((top.start_line, top.end_line), (7, 7));
    }

    #[test]
    fn test_detect_syntax_errors_heuristics() {
        let handler = handler();

        assert!(handler.detect_syntax_errors("def ok():\n    return 1\n").is_empty());

        let missing_colon = handler.detect_syntax_errors("def broken()\n    return 1\n");
        assert!(missing_colon
            .iter()
            .any(|d| d.message.contains("expected ':'")));

        let bad_indent = "def f():\n        a = 1\n    b = 2\n";
        let unindent = handler.detect_syntax_errors(bad_indent);
        assert!(unindent.iter().any(|d| d.message.contains("unindent")));

        let unclosed = handler.detect_syntax_errors("x = foo(1, 2\n");
        assert!(unclosed.iter().any(|d| d.message.contains("unclosed")));
    }

    #[test]
    fn test_multiline_signature_not_flagged() {
        let source = "def f(\n    a,\n    b,\n):\n    return a + b\n";
        assert!(handler().detect_syntax_errors(source).is_empty());
    }

    #[test]
    fn test_validate_imports_placement() {
        let handler = handler();
        assert!(handler.validate_imports("import os\nfrom sys import argv\n\nx = 1\n"));
        assert!(!handler.validate_imports("x = 1\nimport os\n"));
        assert!(handler.validate_imports("# comment\n\nimport os\nx = 1\n"));
    }

    #[test]
    fn test_validate_structure_init_and_nesting() {
        let handler = handler();
        assert!(handler.validate_structure(
            "class A:\n    def __init__(self):\n        pass\n"
        ));
        assert!(!handler.validate_structure("class A:\n    def go(self):\n        pass\n"));
        assert!(!handler.validate_structure(
            "class A:\n    def __init__(self):\n        pass\n    class B:\n        def __init__(self):\n            pass\n"
        ));
    }

    #[test]
    fn test_generate_function_and_class() {
        let handler = handler();
        let function = handler.generate_function(
            "fetch",
            &["url".to_string()],
            Some("dict"),
            "return {}",
        );
        assert_eq!(function, "def fetch(url) -> dict:\n    return {}\n");

        let class = handler.generate_class("Point", &["x".to_string(), "y".to_string()], &[]);
        assert!(class.contains("def __init__(self):"));
        assert!(class.contains("self.x = None"));
        assert!(handler.validate_structure(&class));
    }

    #[test]
    fn test_inject_imports_after_existing() {
        let handler = handler();
        let text = "import os\n\nprint(os.name)\n";
        let injected = handler.inject_imports(text, &["sys".to_string(), "os".to_string()]);
        assert_eq!(injected, "import os\nimport sys\n\nprint(os.name)\n");
        assert_eq!(
            handler.inject_imports(&injected, &["sys".to_string()]),
            injected
        );
    }

    #[test]
    fn test_format_expands_tabs_and_trims() {
        let formatted = handler().format_code("def f():\n\treturn 1  \n");
        assert_eq!(formatted, "def f():\n    return 1\n");
    }

    #[test]
    fn test_wrap_in_function() {
        let wrapped = handler().wrap_in_function("x = 1\nprint(x)\n", "main");
        assert_eq!(wrapped, "def main():\n    x = 1\n    print(x)\n");
    }
}
