//! Line-oriented text helpers shared by the handlers.

/// Check if a position in a line falls within a string literal.
/// Supports double-quoted, single-quoted, and backtick strings with escape
/// handling.
pub fn is_inside_string_literal(line: &str, pos: usize) -> bool {
    let mut in_string = false;
    let mut string_char = None;
    let mut escaped = false;

    for (i, ch) in line.char_indices() {
        if i >= pos {
            return in_string;
        }

        if escaped {
            escaped = false;
            continue;
        }

        if ch == '\\' && in_string {
            escaped = true;
            continue;
        }

        if ch == '"' || ch == '\'' || ch == '`' {
            if !in_string {
                in_string = true;
                string_char = Some(ch);
            } else if Some(ch) == string_char {
                in_string = false;
                string_char = None;
            }
        }
    }

    in_string
}

/// Count occurrences of `needle` outside string literals.
pub fn count_outside_strings(line: &str, needle: char) -> usize {
    line.char_indices()
        .filter(|&(i, c)| c == needle && !is_inside_string_literal(line, i))
        .count()
}

/// Net change in bracket depth (`(`, `[`, `{` vs their closers) over one
/// line, ignoring brackets inside string literals.
pub fn bracket_delta(line: &str) -> i32 {
    let mut delta = 0;
    for (i, c) in line.char_indices() {
        if is_inside_string_literal(line, i) {
            continue;
        }
        match c {
            '(' | '[' | '{' => delta += 1,
            ')' | ']' | '}' => delta -= 1,
            _ => {}
        }
    }
    delta
}

/// Reindent a brace-delimited language by block depth.
///
/// Each line is trimmed and re-indented with `indent` repeated per depth;
/// lines opening with a closer dedent themselves. Blank lines stay blank.
pub fn reindent_braces(text: &str, indent: &str) -> String {
    let mut depth: usize = 0;
    let mut lines = Vec::new();

    for raw in text.lines() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            lines.push(String::new());
            continue;
        }

        let opens = count_outside_strings(trimmed, '{');
        let closes = count_outside_strings(trimmed, '}');
        let own_depth = if trimmed.starts_with('}') {
            depth.saturating_sub(1)
        } else {
            depth
        };

        lines.push(format!("{}{}", indent.repeat(own_depth), trimmed));
        depth = (depth + opens).saturating_sub(closes);
    }

    join_preserving_final_newline(text, lines)
}

/// Join rewritten lines, keeping the original's trailing-newline shape.
pub fn join_preserving_final_newline(original: &str, lines: Vec<String>) -> String {
    let mut joined = lines.join("\n");
    if original.ends_with('\n') {
        joined.push('\n');
    }
    joined
}

/// Insert `block` (one or more rendered lines) after the last line matching
/// any of `patterns`, or before the first line when none match.
pub fn insert_after_last_match(text: &str, patterns: &[regex::Regex], block: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let insert_at = lines
        .iter()
        .rposition(|line| patterns.iter().any(|p| p.is_match(line)))
        .map(|i| i + 1)
        .unwrap_or(0);

    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 2);
    out.extend(lines[..insert_at].iter().map(|s| s.to_string()));
    out.extend(block.lines().map(|s| s.to_string()));
    out.extend(lines[insert_at..].iter().map(|s| s.to_string()));

    if text.is_empty() {
        return block.to_string();
    }
    join_preserving_final_newline(text, out)
}

/// Leading whitespace width with tabs expanded to 4 columns.
pub fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += 4,
            _ => break,
        }
    }
    width
}

/// Indent every non-blank line of `text` by `indent`.
pub fn indent_lines(text: &str, indent: &str) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect();
    join_preserving_final_newline(text, lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_inside_string_literal() {
        assert!(!is_inside_string_literal("hello world", 0));
        assert!(is_inside_string_literal(r#""hello world""#, 3));
        assert!(!is_inside_string_literal(r#""hello" world"#, 9));
        assert!(is_inside_string_literal(r#""hello \" world""#, 10));
    }

    #[test]
    fn test_bracket_delta_ignores_strings() {
        assert_eq!(bracket_delta("foo(bar[0])"), 0);
        assert_eq!(bracket_delta("foo(\"(\""), 1);
        assert_eq!(bracket_delta("})"), -2);
    }

    #[test]
    fn test_reindent_braces() {
        let text = "function f() {\nreturn {\na: 1\n};\n}\n";
        let formatted = reindent_braces(text, "  ");
        assert_eq!(
            formatted,
            "function f() {\n  return {\n    a: 1\n  };\n}\n"
        );
    }

    #[test]
    fn test_reindent_else_line() {
        let text = "if (a) {\nx();\n} else {\ny();\n}";
        let formatted = reindent_braces(text, "  ");
        assert_eq!(formatted, "if (a) {\n  x();\n} else {\n  y();\n}");
    }

    #[test]
    fn test_indent_lines() {
        assert_eq!(indent_lines("a\n\nb\n", "    "), "    a\n\n    b\n");
    }

    #[test]
    fn test_indent_width() {
        assert_eq!(indent_width("    x"), 4);
        assert_eq!(indent_width("\tx"), 4);
        assert_eq!(indent_width("x"), 0);
    }
}
