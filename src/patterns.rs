//! Per-language regular-expression tables.
//!
//! Pure data: each language gets an ordered set of patterns for imports,
//! functions, classes and generic block boundaries. Handlers apply them in
//! declaration order; capture group 1 always holds the specifier or name.

use lazy_static::lazy_static;
use regex::Regex;

/// Ordered pattern sets for one language.
pub struct LanguagePatterns {
    /// Import/require/link patterns. Group 1 captures the module specifier.
    pub imports: Vec<Regex>,
    /// Function header patterns. Group 1 captures the function name,
    /// group 2 (when present) the raw parameter list.
    pub functions: Vec<Regex>,
    /// Class/selector patterns. Group 1 captures the class name.
    pub classes: Vec<Regex>,
    /// Generic block open/close boundaries.
    pub blocks: Vec<Regex>,
}

lazy_static! {
    pub static ref TYPESCRIPT: LanguagePatterns = LanguagePatterns {
        imports: vec![
            Regex::new(r#"(?m)^\s*import\s+(?:type\s+)?(?:[\w$*{},\s]+\s+from\s+)?['"]([^'"]+)['"]"#).unwrap(),
            Regex::new(r#"(?m)^\s*export\s+(?:\*|\{[^}]*\})\s+from\s+['"]([^'"]+)['"]"#).unwrap(),
            Regex::new(r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap(),
        ],
        functions: vec![
            Regex::new(r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*\(([^)]*)\)").unwrap(),
            Regex::new(r"(?m)^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?\(([^)]*)\)\s*(?::[^=]+)?=>").unwrap(),
        ],
        classes: vec![
            Regex::new(r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)").unwrap(),
        ],
        blocks: vec![
            Regex::new(r"\{\s*$").unwrap(),
            Regex::new(r"(?m)^\s*\}").unwrap(),
        ],
    };

    pub static ref JAVASCRIPT: LanguagePatterns = LanguagePatterns {
        imports: vec![
            Regex::new(r#"(?m)^\s*import\s+(?:[\w$*{},\s]+\s+from\s+)?['"]([^'"]+)['"]"#).unwrap(),
            Regex::new(r#"(?m)^\s*export\s+(?:\*|\{[^}]*\})\s+from\s+['"]([^'"]+)['"]"#).unwrap(),
            Regex::new(r#"require\s*\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap(),
        ],
        functions: vec![
            Regex::new(r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*\(([^)]*)\)").unwrap(),
            Regex::new(r"(?m)^\s*(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?\(([^)]*)\)\s*=>").unwrap(),
        ],
        classes: vec![
            Regex::new(r"(?m)^\s*(?:export\s+)?(?:default\s+)?class\s+([A-Za-z_$][\w$]*)").unwrap(),
        ],
        blocks: vec![
            Regex::new(r"\{\s*$").unwrap(),
            Regex::new(r"(?m)^\s*\}").unwrap(),
        ],
    };

    pub static ref PYTHON: LanguagePatterns = LanguagePatterns {
        imports: vec![
            Regex::new(r"(?m)^\s*import\s+([\w.]+)").unwrap(),
            Regex::new(r"(?m)^\s*from\s+([\w.]+)\s+import\b").unwrap(),
        ],
        functions: vec![
            Regex::new(r"(?m)^(\s*)def\s+([A-Za-z_]\w*)\s*\(").unwrap(),
        ],
        classes: vec![
            Regex::new(r"(?m)^\s*class\s+([A-Za-z_]\w*)").unwrap(),
        ],
        blocks: vec![
            Regex::new(r":\s*(?:#.*)?$").unwrap(),
        ],
    };

    pub static ref CSS: LanguagePatterns = LanguagePatterns {
        imports: vec![
            Regex::new(r#"@import\s+['"]([^'"]+)['"]"#).unwrap(),
            Regex::new(r#"@import\s+url\(\s*['"]?([^'")]+)['"]?\s*\)"#).unwrap(),
            Regex::new(r#"@use\s+['"]([^'"]+)['"]"#).unwrap(),
        ],
        functions: vec![
            Regex::new(r"@mixin\s+([\w-]+)\s*(?:\(([^)]*)\))?").unwrap(),
            Regex::new(r"@function\s+([\w-]+)\s*\(([^)]*)\)").unwrap(),
        ],
        classes: vec![
            Regex::new(r"\.([A-Za-z_][\w-]*)\s*[,{]").unwrap(),
        ],
        blocks: vec![
            Regex::new(r"\{\s*$").unwrap(),
            Regex::new(r"(?m)^\s*\}").unwrap(),
        ],
    };

    pub static ref HTML: LanguagePatterns = LanguagePatterns {
        imports: vec![
            Regex::new(r#"<link\b[^>]*\bhref=["']([^"']+)["']"#).unwrap(),
            Regex::new(r#"<script\b[^>]*\bsrc=["']([^"']+)["']"#).unwrap(),
            Regex::new(r#"<img\b[^>]*\bsrc=["']([^"']+)["']"#).unwrap(),
        ],
        functions: vec![
            Regex::new(r"function\s+([A-Za-z_$][\w$]*)\s*\(([^)]*)\)").unwrap(),
        ],
        classes: vec![
            Regex::new(r#"\bclass=["']([^"']+)["']"#).unwrap(),
        ],
        blocks: vec![
            Regex::new(r"<([A-Za-z][\w-]*)(?:\s[^>]*)?>").unwrap(),
            Regex::new(r"</([A-Za-z][\w-]*)\s*>").unwrap(),
        ],
    };
}
