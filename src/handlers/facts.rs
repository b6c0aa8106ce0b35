//! Value types produced by handler analysis.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of outline entry a handler can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Class,
    Function,
    Interface,
    Variable,
    Other,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Class => "class",
            NodeKind::Function => "function",
            NodeKind::Interface => "interface",
            NodeKind::Variable => "variable",
            NodeKind::Other => "other",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A function found in source text, with a cyclomatic-like score.
///
/// `complexity` starts at 1 and gains one per branching construct in the
/// function body; the construct set is language-specific.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub params: Vec<String>,
    pub return_type: Option<String>,
    pub complexity: u32,
}

/// A labeled, line-ranged outline entry. Lines are zero-based and
/// `start_line <= end_line` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureNode {
    pub kind: NodeKind,
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// A detected syntax problem. Zero-based line and column; column is 0 when
/// the underlying check cannot narrow it down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxDiagnostic {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for SyntaxDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.column, self.message)
    }
}

/// Aggregate result of analyzing one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Raw import specifiers from the regex scan (duplicates kept).
    pub imports: Vec<String>,
    /// Deduplicated, sorted dependency set.
    pub dependencies: Vec<String>,
    pub structure: Vec<StructureNode>,
    pub syntax_valid: bool,
    pub imports_valid: bool,
    pub structure_valid: bool,
}

/// Derive the local identifier a dependency specifier binds to.
///
/// Takes the last path segment, strips non-alphanumeric characters, and
/// prefixes `_` when the result starts with a digit.
pub fn import_identifier(specifier: &str) -> String {
    let segment = specifier
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(specifier);
    let cleaned: String = segment.chars().filter(|c| c.is_alphanumeric()).collect();
    match cleaned.chars().next() {
        Some(c) if c.is_ascii_digit() => format!("_{cleaned}"),
        _ => cleaned,
    }
}
