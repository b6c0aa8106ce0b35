//! Document adapter and the convenience surface over handler primitives.
//!
//! A `Document` is a text buffer plus optional filename and language-id
//! metadata, the shape an editor integration hands over. The
//! `DocumentAnalyzer` resolves the handler (extension first, language id
//! second) and maps results into caller-facing shapes.

use serde::{Deserialize, Serialize};

use crate::handlers::{AnalysisReport, LanguageHandler, NodeKind};
use crate::registry::HandlerRegistry;

#[derive(Debug, Clone)]
pub struct Document {
    pub text: String,
    pub file_name: Option<String>,
    pub language_id: Option<String>,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            file_name: None,
            language_id: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_language_id(mut self, language_id: impl Into<String>) -> Self {
        self.language_id = Some(language_id.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

/// Caller-facing outline entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineNode {
    pub kind: NodeKind,
    pub name: String,
    pub range: Range,
}

/// Stateless adapter from documents to handler operations. Borrows the
/// registry; construct one wherever convenient.
pub struct DocumentAnalyzer<'a> {
    registry: &'a HandlerRegistry,
}

impl<'a> DocumentAnalyzer<'a> {
    pub fn new(registry: &'a HandlerRegistry) -> Self {
        Self { registry }
    }

    fn handler_for(&self, document: &Document) -> Option<&dyn LanguageHandler> {
        if let Some(file_name) = &document.file_name {
            if let Some(handler) = self.registry.handler_for_file(file_name) {
                return Some(handler);
            }
        }
        document
            .language_id
            .as_deref()
            .and_then(|id| self.registry.handler_for_language_id(id))
    }

    /// Raw import specifiers. Empty when no handler claims the document.
    pub fn imports(&self, document: &Document) -> Vec<String> {
        self.handler_for(document)
            .map(|handler| handler.analyze_imports(&document.text))
            .unwrap_or_default()
    }

    /// Sorted, deduplicated dependency set.
    pub fn dependencies(&self, document: &Document) -> Vec<String> {
        self.handler_for(document)
            .map(|handler| handler.analyze_dependencies(&document.text).into_iter().collect())
            .unwrap_or_default()
    }

    /// Outline mapped into the caller-facing node shape.
    pub fn file_structure(&self, document: &Document) -> Vec<OutlineNode> {
        self.handler_for(document)
            .map(|handler| {
                handler
                    .analyze_structure(&document.text)
                    .into_iter()
                    .map(|node| OutlineNode {
                        kind: node.kind,
                        name: node.name,
                        range: Range {
                            start: Position {
                                line: node.start_line,
                            },
                            end: Position { line: node.end_line },
                        },
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Aggregate analysis. `None` when no handler claims the document.
    pub fn analyze(&self, document: &Document) -> Option<AnalysisReport> {
        let handler = self.handler_for(document)?;
        let text = &document.text;
        Some(AnalysisReport {
            imports: handler.analyze_imports(text),
            dependencies: handler.analyze_dependencies(text).into_iter().collect(),
            structure: handler.analyze_structure(text),
            syntax_valid: handler.validate_syntax(text),
            imports_valid: handler.validate_imports(text),
            structure_valid: handler.validate_structure(text),
        })
    }

    /// Reformatted text; unchanged when no handler claims the document.
    pub fn format(&self, document: &Document) -> String {
        self.handler_for(document)
            .map(|handler| handler.format_code(&document.text))
            .unwrap_or_else(|| document.text.clone())
    }
}
