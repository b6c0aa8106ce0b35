//! Shared tree-sitter plumbing for the AST-backed handlers.
//!
//! Handlers parse on every call (parsers are cheap to construct and not
//! `Sync`) and run queries against the fresh tree. Failures surface as
//! `AnalysisError`; the handlers absorb them at the trait boundary.

use streaming_iterator::StreamingIterator;
use thiserror::Error;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, QueryMatch, Tree};

use super::SyntaxDiagnostic;

/// Internal failure of the tree phase. Never escapes a handler.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("incompatible grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),
    #[error("parser produced no tree")]
    Parse,
    #[error("malformed query: {0}")]
    Query(#[from] tree_sitter::QueryError),
}

/// Parse source text with the given grammar.
pub fn parse(language: &Language, text: &str) -> Result<Tree, AnalysisError> {
    let mut parser = Parser::new();
    parser.set_language(language)?;
    parser.parse(text, None).ok_or(AnalysisError::Parse)
}

/// Run a query over `node`, invoking `f` for every match.
pub fn for_each_match<'t, F>(
    language: &Language,
    query_src: &str,
    node: Node<'t>,
    source: &[u8],
    mut f: F,
) -> Result<(), AnalysisError>
where
    F: FnMut(&Query, &QueryMatch<'_, 't>),
{
    let query = Query::new(language, query_src)?;
    let mut cursor = QueryCursor::new();
    let mut matches = cursor.matches(&query, node, source);
    while let Some(m) = matches.next() {
        f(&query, m);
    }
    Ok(())
}

/// Count the matches a query produces under `node`.
pub fn count_matches(
    language: &Language,
    query_src: &str,
    node: Node,
    source: &[u8],
) -> Result<u32, AnalysisError> {
    let mut count = 0;
    for_each_match(language, query_src, node, source, |_, _| count += 1)?;
    Ok(count)
}

/// Text of the first capture named `name` in a match, if present.
pub fn capture_text<'s>(
    query: &Query,
    m: &QueryMatch<'_, 's>,
    name: &str,
    source: &'s [u8],
) -> Option<&'s str> {
    m.captures.iter().find_map(|capture| {
        let capture_name = query.capture_names()[capture.index as usize];
        if capture_name == name {
            capture.node.utf8_text(source).ok()
        } else {
            None
        }
    })
}

/// Node of the first capture named `name` in a match, if present.
pub fn capture_node<'t>(query: &Query, m: &QueryMatch<'_, 't>, name: &str) -> Option<Node<'t>> {
    m.captures.iter().find_map(|capture| {
        let capture_name = query.capture_names()[capture.index as usize];
        if capture_name == name {
            Some(capture.node)
        } else {
            None
        }
    })
}

/// Collect diagnostics for every ERROR and MISSING node under `root`.
///
/// Positions are zero-based, straight from tree-sitter. MISSING nodes carry
/// the kind the parser expected at that point.
pub fn syntax_diagnostics(root: Node, source: &[u8]) -> Vec<SyntaxDiagnostic> {
    let mut diagnostics = Vec::new();
    collect_diagnostics(root, source, &mut diagnostics);
    diagnostics
}

fn collect_diagnostics(node: Node, source: &[u8], out: &mut Vec<SyntaxDiagnostic>) {
    if node.is_error() {
        let snippet: String = node
            .utf8_text(source)
            .unwrap_or("")
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(24)
            .collect();
        let position = node.start_position();
        out.push(SyntaxDiagnostic {
            line: position.row,
            column: position.column,
            message: format!("syntax error near `{}`", snippet.trim()),
        });
    } else if node.is_missing() {
        let position = node.start_position();
        out.push(SyntaxDiagnostic {
            line: position.row,
            column: position.column,
            message: format!("missing {}", node.kind()),
        });
    }

    if node.has_error() {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            collect_diagnostics(child, source, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_diagnostics() {
        let language: Language = tree_sitter_javascript::LANGUAGE.into();
        let tree = parse(&language, "function ok() { return 1; }").unwrap();
        assert!(syntax_diagnostics(tree.root_node(), b"function ok() { return 1; }").is_empty());

        let broken = "function bad( { return";
        let tree = parse(&language, broken).unwrap();
        let diagnostics = syntax_diagnostics(tree.root_node(), broken.as_bytes());
        assert!(!diagnostics.is_empty());
    }

    #[test]
    fn test_count_matches() {
        let language: Language = tree_sitter_javascript::LANGUAGE.into();
        let source = "if (a) {} if (b) {}";
        let tree = parse(&language, source).unwrap();
        let count = count_matches(
            &language,
            "(if_statement) @branch",
            tree.root_node(),
            source.as_bytes(),
        )
        .unwrap();
        assert_eq!(count, 2);
    }
}
