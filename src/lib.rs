//! Codescope - per-file source analysis for five languages.
//!
//! Codescope analyzes raw source text for TypeScript, JavaScript, Python,
//! CSS and HTML behind one uniform contract: import/dependency extraction,
//! function enumeration with complexity scores, structure outlines, syntax
//! diagnostics, fragment generation, convention validation and lightweight
//! rewriting (format, import injection, function wrapping).
//!
//! # Architecture
//!
//! - `patterns`: per-language regex tables (pure data)
//! - `handlers`: one `LanguageHandler` implementation per language;
//!   TypeScript/JavaScript/CSS/HTML are tree-sitter backed, Python runs on
//!   line scanning and heuristics
//! - `registry`: extension and language-id lookup over the handler set
//! - `document`: text-buffer adapter and the aggregate `analyze` surface
//!
//! Nothing here touches the filesystem or network; every operation is a
//! synchronous function over the text it is given. Parse failures never
//! propagate: analysis degrades to empty results, validation to `false`,
//! rewriting to unchanged text, with a `tracing` warning as the only trace.
//!
//! # Adding a New Language
//!
//! Implement `LanguageHandler` (see `src/handlers/` for examples), add a
//! pattern table in `src/patterns.rs`, and register the handler in
//! `HandlerRegistry::new`.
//!
//! # Example
//!
//! ```
//! use codescope::{Document, DocumentAnalyzer, HandlerRegistry};
//!
//! let registry = HandlerRegistry::new();
//! let analyzer = DocumentAnalyzer::new(&registry);
//! let document = Document::new("import os\n").with_file_name("tool.py");
//!
//! let report = analyzer.analyze(&document).expect("python is registered");
//! assert_eq!(report.dependencies, vec!["os"]);
//! ```

pub mod document;
pub mod handlers;
pub mod patterns;
pub mod registry;

pub use document::{Document, DocumentAnalyzer, OutlineNode, Position, Range};
pub use handlers::{
    import_identifier, AnalysisReport, CssHandler, FunctionInfo, HtmlHandler, JavaScriptHandler,
    LanguageHandler, NodeKind, PythonHandler, StructureNode, SyntaxDiagnostic, TypeScriptHandler,
};
pub use registry::HandlerRegistry;
