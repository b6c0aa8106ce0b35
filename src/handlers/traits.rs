//! The per-language handler contract.

use std::collections::BTreeSet;

use crate::patterns::LanguagePatterns;

use super::{FunctionInfo, StructureNode, SyntaxDiagnostic};

/// One implementation per language: analysis, generation, validation and
/// rewriting over raw source text.
///
/// Every method is a synchronous pure function of its arguments plus the
/// read-only pattern tables. None of them panic or fail for malformed input;
/// when an underlying parse goes wrong the method degrades to an empty,
/// `false` or unchanged result and emits a `tracing` warning.
///
/// # Thread Safety
///
/// Handlers hold only a `tree_sitter::Language` value and `'static`
/// references, so they are freely shareable. `tree_sitter::Parser` is not
/// `Sync`; implementations create one per call.
pub trait LanguageHandler: Send + Sync {
    /// Language identifier (e.g. "typescript"). Shared by all extensions of
    /// the handler.
    fn language_id(&self) -> &'static str;

    /// File extensions this handler claims, without the dot. Never empty.
    fn file_extensions(&self) -> &'static [&'static str];

    /// The regex tables backing the pattern phase.
    fn patterns(&self) -> &'static LanguagePatterns;

    /// Apply each import pattern in declaration order and collect every
    /// match. Result order follows pattern order then text order; duplicates
    /// are kept — this layer is additive.
    fn analyze_imports(&self, text: &str) -> Vec<String> {
        let mut specifiers = Vec::new();
        for pattern in &self.patterns().imports {
            for caps in pattern.captures_iter(text) {
                if let Some(m) = caps.get(1) {
                    specifiers.push(m.as_str().to_string());
                }
            }
        }
        specifiers
    }

    /// The canonical deduplicated dependency set, computed from the syntax
    /// tree where a grammar exists. Empty on parse failure.
    fn analyze_dependencies(&self, text: &str) -> BTreeSet<String>;

    /// Enumerate functions with parameters, optional return type and a
    /// cyclomatic-like complexity score (always >= 1).
    fn analyze_functions(&self, text: &str) -> Vec<FunctionInfo>;

    /// Outline declarations with zero-based line ranges.
    fn analyze_structure(&self, text: &str) -> Vec<StructureNode>;

    /// Best-effort syntax diagnostics. Never fails; an unparseable input
    /// yields a (possibly empty) sequence, not an error.
    fn detect_syntax_errors(&self, text: &str) -> Vec<SyntaxDiagnostic>;

    /// Render import statements for the given specifiers, one per line.
    fn generate_imports(&self, deps: &[String]) -> String;

    /// Render a function fragment. Inputs are written out verbatim; the
    /// caller is responsible for supplying valid identifiers and bodies.
    fn generate_function(
        &self,
        name: &str,
        params: &[String],
        return_type: Option<&str>,
        body: &str,
    ) -> String;

    /// Render a class (or the language's nearest equivalent) fragment.
    fn generate_class(&self, name: &str, properties: &[String], methods: &[String]) -> String;

    /// Whether the text parses without syntax errors.
    fn validate_syntax(&self, text: &str) -> bool;

    /// Language-specific import convention check (placement or usage).
    fn validate_imports(&self, text: &str) -> bool;

    /// Language-specific structural completeness check.
    fn validate_structure(&self, text: &str) -> bool;

    /// Lightweight reformat: indentation and whitespace only.
    fn format_code(&self, text: &str) -> String;

    /// Insert imports for any of `deps` not already present. Idempotent:
    /// when nothing is missing the text comes back unchanged.
    ///
    /// The default inserts after the last line the import patterns match, or
    /// at the top of the file. HTML overrides this with head/body placement.
    fn inject_imports(&self, text: &str, deps: &[String]) -> String {
        let existing: std::collections::HashSet<String> =
            self.analyze_imports(text).into_iter().collect();
        let mut missing: Vec<String> = Vec::new();
        for dep in deps {
            // A specifier counts as present when the scan found it or its
            // rendered statement already appears verbatim.
            let rendered = self.generate_imports(std::slice::from_ref(dep));
            let present = existing.contains(dep)
                || (!rendered.trim().is_empty() && text.contains(rendered.trim()));
            if !present && !missing.contains(dep) {
                missing.push(dep.clone());
            }
        }
        if missing.is_empty() {
            return text.to_string();
        }
        let block = self.generate_imports(&missing);
        super::text::insert_after_last_match(text, &self.patterns().imports, &block)
    }

    /// Wrap the whole text in a function named `name`.
    fn wrap_in_function(&self, text: &str, name: &str) -> String;

    /// Whether this handler claims the given extension (without dot).
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().contains(&ext)
    }
}
