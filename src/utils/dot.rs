//! DOT format utilities for graph visualization.
//!
//! Flow graphs of reconstructed subroutines can be dumped as DOT and rendered with
//! Graphviz while debugging a decompilation.

/// Escapes a string for safe use in DOT format labels and identifiers.
///
/// Quotes and backslashes are escaped, newlines become `\n`, carriage returns are
/// dropped and angle brackets are escaped so record-shaped labels stay intact.
///
/// # Examples
///
/// ```rust
/// use sagekit::utils::escape_dot;
///
/// assert_eq!(escape_dot("if (a < b)"), "if (a \\< b)");
/// assert_eq!(escape_dot("say \"hi\""), "say \\\"hi\\\"");
/// ```
#[must_use]
pub fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
        .replace('<', "\\<")
        .replace('>', "\\>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_unchanged() {
        assert_eq!(escape_dot("local_0 = 1;"), "local_0 = 1;");
    }

    #[test]
    fn statement_listing() {
        assert_eq!(
            escape_dot("call_3(\"idle\");\r\nreturn;"),
            "call_3(\\\"idle\\\");\\nreturn;"
        );
    }

    #[test]
    fn comparison_operators() {
        assert_eq!(escape_dot("while (a >= b)"), "while (a \\>= b)");
        assert_eq!(escape_dot("path\\x"), "path\\\\x");
    }
}
