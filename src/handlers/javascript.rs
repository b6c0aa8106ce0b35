//! JavaScript handler backed by the tree-sitter JavaScript grammar.
//!
//! Close cousin of the TypeScript handler, but the grammars disagree on
//! node names (class names are plain identifiers here) and the conventions
//! differ: complexity counts logical operators, and structural validity
//! requires at least one export instead of class constructors.

use std::collections::{BTreeSet, HashSet};

use tree_sitter::{Language, Node};

use crate::patterns::{LanguagePatterns, JAVASCRIPT};

use super::ast::{self, AnalysisError};
use super::facts::import_identifier;
use super::text;
use super::{FunctionInfo, LanguageHandler, NodeKind, StructureNode, SyntaxDiagnostic};

const IMPORT_QUERY: &str = r#"
(import_statement
  source: (string) @source
) @import

(export_statement
  source: (string) @source
) @reexport

(call_expression
  function: (identifier) @require_fn (#eq? @require_fn "require")
  arguments: (arguments (string) @source)
) @require
"#;

const FUNCTION_QUERY: &str = r#"
(function_declaration name: (identifier) @name) @func
(method_definition name: (property_identifier) @name) @func
(variable_declarator
  name: (identifier) @name
  value: (arrow_function)
) @func
(variable_declarator
  name: (identifier) @name
  value: (function_expression)
) @func
"#;

/// JavaScript counts the TypeScript branch set plus logical `&&`/`||`.
const COMPLEXITY_QUERY: &str = r#"
(if_statement) @branch
(for_statement) @branch
(for_in_statement) @branch
(while_statement) @branch
(do_statement) @branch
(switch_case) @branch
(ternary_expression) @branch
(binary_expression operator: "&&") @branch
(binary_expression operator: "||") @branch
"#;

const STRUCTURE_QUERY: &str = r#"
(class_declaration name: (identifier) @name) @class
(function_declaration name: (identifier) @name) @function
(program (lexical_declaration (variable_declarator name: (identifier) @name)) @variable)
(program (variable_declaration (variable_declarator name: (identifier) @name)) @variable)
"#;

const IDENTIFIER_QUERY: &str = r#"
(identifier) @id
(property_identifier) @id
(shorthand_property_identifier) @id
"#;

const EXPORT_QUERY: &str = "(export_statement) @export";

pub struct JavaScriptHandler {
    language: Language,
}

impl JavaScriptHandler {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_javascript::LANGUAGE.into(),
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
                    let specifier = raw.trim_matches(|c| c == '"' || c == '\'' || c == '`');
                    if !specifier.is_empty() {
                        dependencies.insert(specifier.to_string());
                    }
                }
            },
        )?;

        Ok(dependencies)
    }

    fn functions_tree(&self, text: &str) -> Result<Vec<FunctionInfo>, AnalysisError> {
        let tree = ast::parse(&self.language, text)?;
        let source = text.as_bytes();

        let mut found: Vec<(String, Node)> = Vec::new();
        ast::for_each_match(
            &self.language,
            FUNCTION_QUERY,
            tree.root_node(),
            source,
            |query, m| {
                if let (Some(name), Some(node)) = (
                    ast::capture_text(query, m, "name", source),
                    ast::capture_node(query, m, "func"),
                ) {
                    found.push((name.to_string(), node));
                }
            },
        )?;

        let mut functions = Vec::new();
        let mut seen = HashSet::new();
        for (name, node) in found {
            if !seen.insert((node.start_byte(), name.clone())) {
                continue;
            }
            let fn_node = if node.kind() == "variable_declarator" {
                node.child_by_field_name("value").unwrap_or(node)
            } else {
                node
            };
            let complexity =
                1 + ast::count_matches(&self.language, COMPLEXITY_QUERY, fn_node, source)?;
            functions.push(FunctionInfo {
                name,
                params: parameter_names(fn_node, source),
                return_type: None,
                complexity,
            });
        }

        Ok(functions)
    }

    fn structure_tree(&self, text: &str) -> Result<Vec<StructureNode>, AnalysisError> {
        let tree = ast::parse(&self.language, text)?;
        let source = text.as_bytes();

        let mut nodes = Vec::new();
        let mut seen = HashSet::new();
        ast::for_each_match(
            &self.language,
            STRUCTURE_QUERY,
            tree.root_node(),
            source,
            |query, m| {
                let mut name = String::new();
                let mut kind = NodeKind::Other;
                let mut decl = None;

                for capture in m.captures {
                    let capture_name = query.capture_names()[capture.index as usize];
                    match capture_name {
                        "name" => {
                            name = capture.node.utf8_text(source).unwrap_or("").to_string();
                        }
                        "class" => {
                            kind = NodeKind::Class;
                            decl = Some(capture.node);
                        }
                        "function" => {
                            kind = NodeKind::Function;
                            decl = Some(capture.node);
                        }
                        "variable" => {
                            kind = NodeKind::Variable;
                            decl = Some(capture.node);
                        }
                        _ => {}
                    }
                }

                if let Some(node) = decl {
                    if !name.is_empty() && seen.insert((node.start_byte(), name.clone())) {
                        nodes.push(StructureNode {
                            kind,
                            name,
                            start_line: node.start_position().row,
                            end_line: node.end_position().row,
                        });
                    }
                }
            },
        )?;

        nodes.sort_by_key(|n| (n.start_line, n.name.clone()));
        Ok(nodes)
    }

    fn imports_used(&self, text: &str) -> Result<bool, AnalysisError> {
        let dependencies = self.dependencies_tree(text)?;
        if dependencies.is_empty() {
            return Ok(true);
        }

        let tree = ast::parse(&self.language, text)?;
        let source = text.as_bytes();
        let mut identifiers = HashSet::new();
        ast::for_each_match(
            &self.language,
            IDENTIFIER_QUERY,
            tree.root_node(),
            source,
            |query, m| {
                if let Some(id) = ast::capture_text(query, m, "id", source) {
                    identifiers.insert(id.to_string());
                }
            },
        )?;

        Ok(dependencies.iter().all(|dep| {
            let ident = import_identifier(dep);
            ident.is_empty() || identifiers.contains(&ident)
        }))
    }

    fn has_export(&self, text: &str) -> Result<bool, AnalysisError> {
        let tree = ast::parse(&self.language, text)?;
        let count = ast::count_matches(
            &self.language,
            EXPORT_QUERY,
            tree.root_node(),
            text.as_bytes(),
        )?;
        Ok(count > 0)
    }
}

impl Default for JavaScriptHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageHandler for JavaScriptHandler {
    fn language_id(&self) -> &'static str {
        "javascript"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["js", "jsx", "mjs"]
    }

    fn patterns(&self) -> &'static LanguagePatterns {
        &JAVASCRIPT
    }

    fn analyze_dependencies(&self, text: &str) -> BTreeSet<String> {
        self.dependencies_tree(text).unwrap_or_else(|err| {
            tracing::warn!(language = "javascript", error = %err, "dependency analysis degraded");
            BTreeSet::new()
        })
    }

    fn analyze_functions(&self, text: &str) -> Vec<FunctionInfo> {
        self.functions_tree(text).unwrap_or_else(|err| {
            tracing::warn!(language = "javascript", error = %err, "function analysis degraded");
            Vec::new()
        })
    }

    fn analyze_structure(&self, text: &str) -> Vec<StructureNode> {
        self.structure_tree(text).unwrap_or_else(|err| {
            tracing::warn!(language = "javascript", error = %err, "structure analysis degraded");
            Vec::new()
        })
    }

    fn detect_syntax_errors(&self, text: &str) -> Vec<SyntaxDiagnostic> {
        match ast::parse(&self.language, text) {
            Ok(tree) => ast::syntax_diagnostics(tree.root_node(), text.as_bytes()),
            Err(err) => {
                tracing::warn!(language = "javascript", error = %err, "syntax check degraded");
                Vec::new()
            }
        }
    }

    fn generate_imports(&self, deps: &[String]) -> String {
        let mut out = String::new();
        for dep in deps {
            let ident = import_identifier(dep);
            if ident.is_empty() {
                out.push_str(&format!("import '{dep}';\n"));
            } else {
                out.push_str(&format!("import {ident} from '{dep}';\n"));
            }
        }
        out
    }

    fn generate_function(
        &self,
        name: &str,
        params: &[String],
        _return_type: Option<&str>,
        body: &str,
    ) -> String {
        format!(
            "function {name}({}) {{\n{}}}\n",
            params.join(", "),
            terminated(&text::indent_lines(body, "  ")),
        )
    }

    fn generate_class(&self, name: &str, properties: &[String], methods: &[String]) -> String {
        let mut out = format!("class {name} {{\n  constructor() {{\n");
        for property in properties {
            // Plain identifiers become instance fields; anything richer is
            // written into the constructor as given.
            if property.contains('=') || property.contains(';') {
                out.push_str(&terminated(&text::indent_lines(property, "    ")));
            } else {
                out.push_str(&format!("    this.{property} = null;\n"));
            }
        }
        out.push_str("  }\n");
        for method in methods {
            out.push('\n');
            if method.contains('(') {
                out.push_str(&terminated(&text::indent_lines(method, "  ")));
            } else {
                out.push_str(&format!("  {method}() {{\n  }}\n"));
            }
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

    fn validate_imports(&self, text: &str) -> bool {
        self.imports_used(text).unwrap_or_else(|err| {
            tracing::warn!(language = "javascript", error = %err, "import validation degraded");
            false
        })
    }

    fn validate_structure(&self, text: &str) -> bool {
        self.has_export(text).unwrap_or_else(|err| {
            tracing::warn!(language = "javascript", error = %err, "structure validation degraded");
            false
        })
    }

    fn format_code(&self, text: &str) -> String {
        text::reindent_braces(text, "  ")
    }

    fn wrap_in_function(&self, text: &str, name: &str) -> String {
        format!(
            "function {name}() {{\n{}}}\n",
            terminated(&text::indent_lines(text, "  "))
        )
    }
}

fn parameter_names(fn_node: Node, source: &[u8]) -> Vec<String> {
    let Some(params) = fn_node.child_by_field_name("parameters") else {
        return fn_node
            .child_by_field_name("parameter")
            .and_then(|p| p.utf8_text(source).ok())
            .map(|p| vec![p.to_string()])
            .unwrap_or_default();
    };

    let mut cursor = params.walk();
    params
        .named_children(&mut cursor)
        .filter(|p| p.kind() != "comment")
        .map(|p| {
            let name_node = p.child_by_field_name("left").unwrap_or(p);
            name_node.utf8_text(source).unwrap_or("").to_string()
        })
        .filter(|p| !p.is_empty())
        .collect()
}

fn terminated(fragment: &str) -> String {
    if fragment.is_empty() || fragment.ends_with('\n') {
        fragment.to_string()
    } else {
        format!("{fragment}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> JavaScriptHandler {
        JavaScriptHandler::new()
    }

    #[test]
    fn test_analyze_dependencies() {
        let source = "import fs from 'fs';\nconst lodash = require('lodash');\n";
        let deps = handler().analyze_dependencies(source);
        assert_eq!(
            deps.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["fs", "lodash"]
        );
    }

    #[test]
    fn test_logical_operators_count_toward_complexity() {
        let source = r#"
function guard(a, b, c) {
    if (a && b || c) {
        return 1;
    }
    return 0;
}
"#;
        let functions = handler().analyze_functions(source);
        let guard = functions.iter().find(|f| f.name == "guard").unwrap();
        // 1 base + if + && + ||
        assert_eq!(guard.complexity, 4);
        assert_eq!(guard.params, vec!["a", "b", "c"]);
        assert_eq!(guard.return_type, None);
    }

    #[test]
    fn test_default_parameter_names() {
        let source = "function f(a, b = 2, ...rest) {}\n";
        let functions = handler().analyze_functions(source);
        assert_eq!(functions[0].params, vec!["a", "b", "...rest"]);
    }

    #[test]
    fn test_validate_structure_requires_export() {
        let handler = handler();
        assert!(!handler.validate_structure("function add(a,b){return a+b;}"));
        assert!(handler.validate_structure("export function add(a,b){return a+b;}"));
        assert!(handler.validate_structure("const a = 1;\nexport default a;\n"));
    }

    #[test]
    fn test_structure_class_name_is_identifier() {
        let source = "class Store {}\nexport default Store;\n";
        let structure = handler().analyze_structure(source);
        assert!(structure
            .iter()
            .any(|n| n.name == "Store" && n.kind == NodeKind::Class));
    }

    #[test]
    fn test_inject_into_file_without_imports() {
        let handler = handler();
        let injected = handler.inject_imports("const x = 1;\n", &["./a".to_string()]);
        assert_eq!(injected, "import a from './a';\nconst x = 1;\n");
        assert_eq!(
            handler.inject_imports(&injected, &["./a".to_string()]),
            injected
        );
    }

    #[test]
    fn test_generate_class_constructor_fields() {
        let rendered = handler().generate_class("Store", &["items".to_string()], &[]);
        assert!(rendered.contains("this.items = null;"));
        assert!(handler().validate_syntax(&rendered));
    }
}
