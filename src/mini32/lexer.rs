/*!
Indentation/comment preprocessing, grounded in
`tools/mini32_compiler.py`'s `_preprocess_lines`/`_strip_comment`: a
quote-aware `#`-comment stripper, a four-space indentation counter, and
blank-line skipping, emitted as one flat list that the parser walks by
index rather than re-deriving structure from raw text.
*/

use crate::error::{EduvmError, Result};

#[derive(Debug, Clone)]
pub struct LogicalLine {
    pub indent: usize,
    pub text: String,
    pub line_no: usize,
}

fn strip_comment(line: &str) -> String {
    let mut out = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut prev = '\0';
    for ch in line.chars() {
        if ch == '\'' && !in_double && prev != '\\' {
            in_single = !in_single;
        } else if ch == '"' && !in_single && prev != '\\' {
            in_double = !in_double;
        }
        if ch == '#' && !in_single && !in_double {
            break;
        }
        out.push(ch);
        prev = ch;
    }
    out
}

pub fn preprocess(source_name: &str, text: &str) -> Result<Vec<LogicalLine>> {
    let mut lines = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let stripped = strip_comment(raw);
        if stripped.trim().is_empty() {
            continue;
        }
        if stripped.contains('\t') {
            return Err(EduvmError::assembly(source_name, line_no, "tabs are not allowed in indentation"));
        }
        let indent_spaces = stripped.len() - stripped.trim_start_matches(' ').len();
        if indent_spaces % 4 != 0 {
            return Err(EduvmError::assembly(source_name, line_no, "indentation must be a multiple of four spaces"));
        }
        lines.push(LogicalLine {
            indent: indent_spaces / 4,
            text: stripped.trim().to_string(),
            line_no,
        });
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comments_are_stripped_but_hashes_in_strings_survive() {
        let lines = preprocess("t.mini32", "let x = 1  # comment\ndata s = \"a#b\"\n").unwrap();
        assert_eq!(lines[0].text, "let x = 1");
        assert_eq!(lines[1].text, "data s = \"a#b\"");
    }

    #[test]
    fn blank_lines_are_skipped_and_line_numbers_preserved() {
        let lines = preprocess("t.mini32", "const a = 1\n\nconst b = 2\n").unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].line_no, 3);
    }

    #[test]
    fn four_space_indentation_is_tracked_in_units() {
        let lines = preprocess("t.mini32", "func f:\n    let x = 1\n").unwrap();
        assert_eq!(lines[0].indent, 0);
        assert_eq!(lines[1].indent, 1);
    }

    #[test]
    fn tabs_are_rejected() {
        assert!(preprocess("t.mini32", "func f:\n\tlet x = 1\n").is_err());
    }

    #[test]
    fn non_multiple_of_four_indentation_is_rejected() {
        assert!(preprocess("t.mini32", "func f:\n  let x = 1\n").is_err());
    }
}
