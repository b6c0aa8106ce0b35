//! Per-language analysis handlers.
//!
//! Each language gets one concrete type behind the `LanguageHandler` trait.
//! Two independent phases live side by side in every handler: a pattern
//! phase over the tables in `crate::patterns` (always available, used for
//! lightweight import scanning) and a tree phase (dependencies, functions,
//! structure, diagnostics) that degrades to empty results when parsing
//! fails. Python is the exception: it has no grammar here and runs entirely
//! on line scanning and heuristics.

mod ast;
mod css;
mod facts;
mod html;
mod javascript;
mod python;
mod text;
mod traits;
mod typescript;

pub use css::CssHandler;
pub use facts::{
    import_identifier, AnalysisReport, FunctionInfo, NodeKind, StructureNode, SyntaxDiagnostic,
};
pub use html::HtmlHandler;
pub use javascript::JavaScriptHandler;
pub use python::PythonHandler;
pub use traits::LanguageHandler;
pub use typescript::TypeScriptHandler;
