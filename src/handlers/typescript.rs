//! TypeScript handler backed by the tree-sitter TypeScript grammar.

use std::collections::{BTreeSet, HashSet};

use tree_sitter::{Language, Node};

use crate::patterns::{LanguagePatterns, TYPESCRIPT};

use super::ast::{self, AnalysisError};
use super::facts::import_identifier;
use super::text;
use super::{FunctionInfo, LanguageHandler, NodeKind, StructureNode, SyntaxDiagnostic};

const IMPORT_QUERY: &str = r#"
; import x from 'module' / import { x } from 'module' / import 'module'
(import_statement
  source: (string) @source
) @import

; export * from 'module' / export { x } from 'module'
(export_statement
  source: (string) @source
) @reexport

; require('module')
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

/// Branch constructs counted for complexity: if, all for forms, while,
/// do-while, switch cases and ternaries.
const COMPLEXITY_QUERY: &str = r#"
(if_statement) @branch
(for_statement) @branch
(for_in_statement) @branch
(while_statement) @branch
(do_statement) @branch
(switch_case) @branch
(ternary_expression) @branch
"#;

const STRUCTURE_QUERY: &str = r#"
(class_declaration name: (type_identifier) @name) @class
(function_declaration name: (identifier) @name) @function
(interface_declaration name: (type_identifier) @name) @interface
(enum_declaration name: (identifier) @name) @other
(type_alias_declaration name: (type_identifier) @name) @other
(program (lexical_declaration (variable_declarator name: (identifier) @name)) @variable)
(program (variable_declaration (variable_declarator name: (identifier) @name)) @variable)
"#;

const IDENTIFIER_QUERY: &str = r#"
(identifier) @id
(property_identifier) @id
(type_identifier) @id
(shorthand_property_identifier) @id
"#;

pub struct TypeScriptHandler {
    language: Language,
}

impl TypeScriptHandler {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
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
            // For `const f = () => ...` the declarator was captured; the
            // parameters and branches live on its value.
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
                return_type: return_type_of(fn_node, source),
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
                        "interface" => {
                            kind = NodeKind::Interface;
                            decl = Some(capture.node);
                        }
                        "variable" => {
                            kind = NodeKind::Variable;
                            decl = Some(capture.node);
                        }
                        "other" => {
                            kind = NodeKind::Other;
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

    fn classes_have_constructors(&self, text: &str) -> Result<bool, AnalysisError> {
        let tree = ast::parse(&self.language, text)?;
        let source = text.as_bytes();

        let mut all_have = true;
        ast::for_each_match(
            &self.language,
            "(class_declaration) @class",
            tree.root_node(),
            source,
            |query, m| {
                if let Some(class) = ast::capture_node(query, m, "class") {
                    if !class_declares_constructor(class, source) {
                        all_have = false;
                    }
                }
            },
        )?;

        Ok(all_have)
    }
}

impl Default for TypeScriptHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageHandler for TypeScriptHandler {
    fn language_id(&self) -> &'static str {
        "typescript"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx"]
    }

    fn patterns(&self) -> &'static LanguagePatterns {
        &TYPESCRIPT
    }

    fn analyze_dependencies(&self, text: &str) -> BTreeSet<String> {
        self.dependencies_tree(text).unwrap_or_else(|err| {
            tracing::warn!(language = "typescript", error = %err, "dependency analysis degraded");
            BTreeSet::new()
        })
    }

    fn analyze_functions(&self, text: &str) -> Vec<FunctionInfo> {
        self.functions_tree(text).unwrap_or_else(|err| {
            tracing::warn!(language = "typescript", error = %err, "function analysis degraded");
            Vec::new()
        })
    }

    fn analyze_structure(&self, text: &str) -> Vec<StructureNode> {
        self.structure_tree(text).unwrap_or_else(|err| {
            tracing::warn!(language = "typescript", error = %err, "structure analysis degraded");
            Vec::new()
        })
    }

    fn detect_syntax_errors(&self, text: &str) -> Vec<SyntaxDiagnostic> {
        match ast::parse(&self.language, text) {
            Ok(tree) => ast::syntax_diagnostics(tree.root_node(), text.as_bytes()),
            Err(err) => {
                tracing::warn!(language = "typescript", error = %err, "syntax check degraded");
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
        return_type: Option<&str>,
        body: &str,
    ) -> String {
        let annotation = return_type.map(|t| format!(": {t}")).unwrap_or_default();
        format!(
            "function {name}({}){annotation} {{\n{}}}\n",
            params.join(", "),
            terminated(&text::indent_lines(body, "  ")),
        )
    }

    fn generate_class(&self, name: &str, properties: &[String], methods: &[String]) -> String {
        let mut out = format!("class {name} {{\n");
        for property in properties {
            if property.contains(';') {
                out.push_str(&terminated(&text::indent_lines(property, "  ")));
            } else {
                out.push_str(&format!("  {property};\n"));
            }
        }
        out.push_str("\n  constructor() {\n  }\n");
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
            tracing::warn!(language = "typescript", error = %err, "import validation degraded");
            false
        })
    }

    fn validate_structure(&self, text: &str) -> bool {
        self.classes_have_constructors(text).unwrap_or_else(|err| {
            tracing::warn!(language = "typescript", error = %err, "structure validation degraded");
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

/// Bare parameter names of a function-like node. For TypeScript parameters
/// the type annotation is dropped; for destructuring the raw pattern text is
/// kept.
fn parameter_names(fn_node: Node, source: &[u8]) -> Vec<String> {
    let Some(params) = fn_node.child_by_field_name("parameters") else {
        // `x => ...` arrow shorthand keeps its single parameter in a field.
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
            let name_node = p
                .child_by_field_name("pattern")
                .or_else(|| p.child_by_field_name("left"))
                .unwrap_or(p);
            name_node.utf8_text(source).unwrap_or("").to_string()
        })
        .filter(|p| !p.is_empty())
        .collect()
}

fn return_type_of(fn_node: Node, source: &[u8]) -> Option<String> {
    fn_node
        .child_by_field_name("return_type")
        .and_then(|n| n.utf8_text(source).ok())
        .map(|t| t.trim_start_matches(':').trim().to_string())
        .filter(|t| !t.is_empty())
}

fn class_declares_constructor(class: Node, source: &[u8]) -> bool {
    let Some(body) = class.child_by_field_name("body") else {
        return false;
    };
    let mut cursor = body.walk();
    let result = body.named_children(&mut cursor).any(|member| {
        member.kind() == "method_definition"
            && member
                .child_by_field_name("name")
                .and_then(|n| n.utf8_text(source).ok())
                == Some("constructor")
    });
    result
}

/// Ensure the fragment ends with a newline so a closing brace lands on its
/// own line.
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

    fn handler() -> TypeScriptHandler {
        TypeScriptHandler::new()
    }

    #[test]
    fn test_analyze_imports_order_and_duplicates() {
        let source = "import a from './a';\nimport a2 from './a';\nconst b = require('b');\n";
        let imports = handler().analyze_imports(source);
        assert_eq!(imports, vec!["./a", "./a", "b"]);
    }

    #[test]
    fn test_analyze_dependencies_dedupes() {
        let source = r#"
import { x } from './util';
import { y } from './util';
export * from './reexported';
const z = require('zlib-sync');
"#;
        let deps = handler().analyze_dependencies(source);
        let expected: Vec<&str> = vec!["./reexported", "./util", "zlib-sync"];
        assert_eq!(deps.iter().map(String::as_str).collect::<Vec<_>>(), expected);
    }

    #[test]
    fn test_analyze_functions() {
        let source = r#"
function branchy(x: number, label: string): number {
    if (x > 0) {
        return 1;
    }
    for (const c of label) {
        while (x < 10) {
            x += 1;
        }
    }
    return x > 5 ? x : 0;
}

const pick = (flag: boolean) => flag;
"#;
        let functions = handler().analyze_functions(source);

        let branchy = functions.iter().find(|f| f.name == "branchy").unwrap();
        assert_eq!(branchy.params, vec!["x", "label"]);
        assert_eq!(branchy.return_type.as_deref(), Some("number"));
        // 1 base + if + for-of + while + ternary
        assert_eq!(branchy.complexity, 5);

        let pick = functions.iter().find(|f| f.name == "pick").unwrap();
        assert_eq!(pick.complexity, 1);
        assert_eq!(pick.params, vec!["flag"]);
    }

    #[test]
    fn test_analyze_structure() {
        let source = "class Foo {\n  constructor() {}\n}\ninterface Bar {\n  x: string;\n}\nconst top = 1;\nfunction baz() {}\n";
        let structure = handler().analyze_structure(source);

        let foo = structure.iter().find(|n| n.name == "Foo").unwrap();
        assert_eq!(foo.kind, NodeKind::Class);
        assert_eq!((foo.start_line, foo.end_line), (0, 2));

        assert!(structure
            .iter()
            .any(|n| n.name == "Bar" && n.kind == NodeKind::Interface));
        assert!(structure
            .iter()
            .any(|n| n.name == "top" && n.kind == NodeKind::Variable));
        assert!(structure
            .iter()
            .any(|n| n.name == "baz" && n.kind == NodeKind::Function));
    }

    #[test]
    fn test_validate_structure_requires_constructor() {
        let handler = handler();
        assert!(!handler.validate_structure("class Foo { bar() {} }"));
        assert!(handler.validate_structure("class Foo { constructor() {} bar() {} }"));
        assert!(handler.validate_structure("function noClasses() {}"));
    }

    #[test]
    fn test_validate_imports_checks_usage() {
        let handler = handler();
        let used = "import util from './util';\nutil.call();\n";
        assert!(handler.validate_imports(used));

        let unused = "import './styles.css';\nconst x = 1;\n";
        assert!(!handler.validate_imports(unused));

        assert!(handler.validate_imports("const local = 1;\n"));
    }

    #[test]
    fn test_detect_syntax_errors_on_malformed() {
        let diagnostics = handler().detect_syntax_errors("function broken( {");
        assert!(!diagnostics.is_empty());
        assert!(diagnostics.iter().all(|d| d.line == 0));
    }

    #[test]
    fn test_generate_and_inject_imports() {
        let handler = handler();
        let rendered = handler.generate_imports(&["./util".to_string()]);
        assert_eq!(rendered, "import util from './util';\n");

        let text = "import a from './a';\nconst x = a;\n";
        let deps = vec!["./a".to_string(), "./b".to_string()];
        let injected = handler.inject_imports(text, &deps);
        assert_eq!(
            injected,
            "import a from './a';\nimport b from './b';\nconst x = a;\n"
        );
        assert_eq!(handler.inject_imports(&injected, &deps), injected);
    }

    #[test]
    fn test_generate_class_has_constructor() {
        let rendered = handler().generate_class(
            "Widget",
            &["name: string".to_string()],
            &["render".to_string()],
        );
        assert!(rendered.contains("class Widget {"));
        assert!(rendered.contains("name: string;"));
        assert!(rendered.contains("constructor()"));
        assert!(rendered.contains("render() {"));
        assert!(handler().validate_structure(&rendered));
    }

    #[test]
    fn test_wrap_in_function() {
        let wrapped = handler().wrap_in_function("const a = 1;\nreturn a;\n", "setup");
        assert_eq!(wrapped, "function setup() {\n  const a = 1;\n  return a;\n}\n");
        assert!(handler().validate_syntax(&wrapped));
    }
}
