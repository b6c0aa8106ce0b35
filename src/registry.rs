//! Handler lookup by file extension and language identifier.
//!
//! The registry is an explicit value: construct it once at startup and pass
//! it by reference. It owns the handlers, never caches analysis results,
//! and is immutable after construction, so sharing `&HandlerRegistry`
//! across threads needs no locking.

use std::collections::HashMap;
use std::path::Path;

use crate::handlers::{
    CssHandler, HtmlHandler, JavaScriptHandler, LanguageHandler, PythonHandler, TypeScriptHandler,
};

pub struct HandlerRegistry {
    handlers: Vec<Box<dyn LanguageHandler>>,
    by_extension: HashMap<&'static str, usize>,
}

impl HandlerRegistry {
    /// Build the standard registry. Registration order is fixed; when two
    /// handlers claim the same extension the later registration wins.
    pub fn new() -> Self {
        Self::with_handlers(vec![
            Box::new(TypeScriptHandler::new()),
            Box::new(PythonHandler::new()),
            Box::new(JavaScriptHandler::new()),
            Box::new(CssHandler::new()),
            Box::new(HtmlHandler::new()),
        ])
    }

    /// Build a registry from an explicit handler list (registration order).
    pub fn with_handlers(handlers: Vec<Box<dyn LanguageHandler>>) -> Self {
        let mut by_extension = HashMap::new();
        for (index, handler) in handlers.iter().enumerate() {
            for ext in handler.file_extensions() {
                by_extension.insert(*ext, index);
            }
        }
        Self {
            handlers,
            by_extension,
        }
    }

    /// Look a handler up by the path's extension. `None` for unknown
    /// extensions is a normal outcome, not an error.
    pub fn handler_for_file(&self, path: &str) -> Option<&dyn LanguageHandler> {
        let extension = Path::new(path).extension()?.to_str()?.to_lowercase();
        self.by_extension
            .get(extension.as_str())
            .map(|&index| self.handlers[index].as_ref())
    }

    /// First handler registered under the given language id.
    pub fn handler_for_language_id(&self, id: &str) -> Option<&dyn LanguageHandler> {
        self.handlers
            .iter()
            .find(|handler| handler.language_id() == id)
            .map(|handler| handler.as_ref())
    }

    /// All claimed extensions, in registration order.
    pub fn supported_extensions(&self) -> Vec<&'static str> {
        let mut seen = std::collections::HashSet::new();
        self.handlers
            .iter()
            .flat_map(|handler| handler.file_extensions().iter().copied())
            .filter(|ext| seen.insert(*ext))
            .collect()
    }

    /// Deduplicated language ids, in registration order.
    pub fn supported_language_ids(&self) -> Vec<&'static str> {
        let mut seen = std::collections::HashSet::new();
        self.handlers
            .iter()
            .map(|handler| handler.language_id())
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::handlers::{FunctionInfo, StructureNode, SyntaxDiagnostic};
    use crate::patterns::LanguagePatterns;

    struct MockHandler {
        id: &'static str,
        extensions: &'static [&'static str],
    }

    impl LanguageHandler for MockHandler {
        fn language_id(&self) -> &'static str {
            self.id
        }

        fn file_extensions(&self) -> &'static [&'static str] {
            self.extensions
        }

        fn patterns(&self) -> &'static LanguagePatterns {
            &crate::patterns::PYTHON
        }

        fn analyze_dependencies(&self, _text: &str) -> BTreeSet<String> {
            BTreeSet::new()
        }

        fn analyze_functions(&self, _text: &str) -> Vec<FunctionInfo> {
            Vec::new()
        }

        fn analyze_structure(&self, _text: &str) -> Vec<StructureNode> {
            Vec::new()
        }

        fn detect_syntax_errors(&self, _text: &str) -> Vec<SyntaxDiagnostic> {
            Vec::new()
        }

        fn generate_imports(&self, _deps: &[String]) -> String {
            String::new()
        }

        fn generate_function(
            &self,
            _name: &str,
            _params: &[String],
            _return_type: Option<&str>,
            _body: &str,
        ) -> String {
            String::new()
        }

        fn generate_class(
            &self,
            _name: &str,
            _properties: &[String],
            _methods: &[String],
        ) -> String {
            String::new()
        }

        fn validate_syntax(&self, _text: &str) -> bool {
            true
        }

        fn validate_imports(&self, _text: &str) -> bool {
            true
        }

        fn validate_structure(&self, _text: &str) -> bool {
            true
        }

        fn format_code(&self, text: &str) -> String {
            text.to_string()
        }

        fn wrap_in_function(&self, text: &str, _name: &str) -> String {
            text.to_string()
        }
    }

    #[test]
    fn test_extension_round_trip() {
        let registry = HandlerRegistry::new();
        for ext in registry.supported_extensions() {
            let handler = registry
                .handler_for_file(&format!("example.{ext}"))
                .unwrap_or_else(|| panic!("no handler for {ext}"));
            assert!(handler.file_extensions().contains(&ext));
        }
    }

    #[test]
    fn test_unknown_extension_is_not_an_error() {
        let registry = HandlerRegistry::new();
        assert!(registry.handler_for_file("notes.txt").is_none());
        assert!(registry.handler_for_file("Makefile").is_none());
        assert!(registry.handler_for_language_id("cobol").is_none());
    }

    #[test]
    fn test_language_id_lookup() {
        let registry = HandlerRegistry::new();
        assert_eq!(
            registry
                .handler_for_language_id("python")
                .unwrap()
                .language_id(),
            "python"
        );
        assert_eq!(
            registry.handler_for_file("app.tsx").unwrap().language_id(),
            "typescript"
        );
    }

    #[test]
    fn test_extension_is_case_insensitive() {
        let registry = HandlerRegistry::new();
        assert_eq!(
            registry.handler_for_file("INDEX.HTML").unwrap().language_id(),
            "html"
        );
    }

    #[test]
    fn test_last_registration_wins() {
        let registry = HandlerRegistry::with_handlers(vec![
            Box::new(MockHandler {
                id: "first",
                extensions: &["zz"],
            }),
            Box::new(MockHandler {
                id: "second",
                extensions: &["zz"],
            }),
        ]);
        assert_eq!(
            registry.handler_for_file("a.zz").unwrap().language_id(),
            "second"
        );
        assert_eq!(registry.supported_extensions(), vec!["zz"]);
        assert_eq!(registry.supported_language_ids(), vec!["first", "second"]);
    }

    #[test]
    fn test_supported_language_ids_complete() {
        let registry = HandlerRegistry::new();
        assert_eq!(
            registry.supported_language_ids(),
            vec!["typescript", "python", "javascript", "css", "html"]
        );
    }
}
