/*!
OS patch-up: three specific textual edits applied in place to the host
OS source, so the *next* assemble of that source picks up the edits.
This is the one place in the crate that intentionally rewrites source
text rather than producing a data artifact — see DESIGN.md for why that
fragility is accepted as-is rather than redesigned.
*/

use std::collections::HashMap;

use crate::error::{EduvmError, Result};
use crate::word::Word;

/// `os_api` table slot order, per spec.md §4.H.
pub const OS_API_HANDLERS: &[&str] = &[
    "dispatch_program",
    "build_argv",
    "parse_number",
    "skip_spaces",
    "write_char",
    "newline",
    "ret_home",
    "cursor_left",
    "enter",
    "print_prompt",
];

fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn is_instruction_line(line: &str) -> bool {
    line.starts_with("  ") && line.as_bytes().get(2).is_some_and(|&b| b != b' ')
}

/// Walks `lines` with the assembler's own address-counting rules
/// (two-leading-space instruction lines consume 1 or 2 words; column-0
/// `LABEL:` binds the running address) to build a label table.
pub fn build_label_table(lines: &[String]) -> HashMap<String, Word> {
    let mut labels = HashMap::new();
    let mut address: Word = 0;

    for raw in lines {
        let line = strip_comment(raw);
        if line.trim().is_empty() {
            continue;
        }
        if is_instruction_line(line) {
            let token_count = line.trim().split(' ').filter(|s| !s.is_empty()).count().min(2);
            address += token_count as Word;
        } else if !line.starts_with(' ') {
            let line = line.trim();
            if let Some(colon) = line.find(':') {
                if !line[..colon].contains('=') {
                    labels.insert(line[..colon].trim().to_string(), address);
                }
            }
        }
    }

    labels
}

fn find_pointer_var(lines: &[String], name: &str) -> Option<Word> {
    for raw in lines {
        let line = strip_comment(raw).trim();
        if line.starts_with(' ') {
            continue;
        }
        let Some(eq) = line.find('=') else { continue };
        let lhs = line[..eq].trim();
        if lhs == name {
            return line[eq + 1..].trim().parse::<Word>().ok();
        }
    }
    None
}

/// Patches the call stub's operand word (`CALL_STUB + 1`) to `shell_base`.
/// The stub is a fixed 3-word `JSR <op>; RET` trampoline whose base is
/// declared as `CALL_STUB = <addr>` in the source; its operand is the
/// second word (the instruction immediately following `CALL_STUB:`).
pub fn patch_call_stub(lines: &mut [String], shell_base: Word) -> Result<()> {
    let base = find_pointer_var(lines, "CALL_STUB")
        .ok_or_else(|| EduvmError::link("OS source has no 'CALL_STUB = <addr>' declaration"))?;

    let mut address: Word = 0;
    for line in lines.iter_mut() {
        let stripped = strip_comment(line);
        if is_instruction_line(stripped) {
            let tokens: Vec<&str> = stripped.trim().split(' ').filter(|s| !s.is_empty()).collect();
            if tokens.len() == 2 && address == base {
                let rest = &line[stripped.len()..];
                *line = format!("  {} {}{}", tokens[0], shell_base, rest);
                return Ok(());
            }
            address += tokens.len() as Word;
        }
    }

    Err(EduvmError::link(format!("no instruction found at CALL_STUB+1 ({})", base + 1)))
}

/// Replaces the operand of the `JSR #<N>` call site whose same-line
/// comment mentions `ECHON` with `echon_base`.
pub fn patch_echon_call(lines: &mut [String], echon_base: Word) -> Result<()> {
    for line in lines.iter_mut() {
        if !line.to_uppercase().contains("ECHON") {
            continue;
        }
        let code = strip_comment(line);
        let trimmed = code.trim();
        if let Some(rest) = trimmed.strip_prefix("JSR ") {
            if rest.trim().starts_with('#') {
                let comment = &line[code.len()..];
                *line = format!("  JSR #{echon_base}{comment}");
                return Ok(());
            }
        }
    }
    Err(EduvmError::link("no 'JSR #<N>' call site commented with ECHON found in OS source"))
}

/// Rewrites every `.os_api+<N> = <value>` memory-write line to the
/// resolved address of `OS_API_HANDLERS[N]`, using `labels` built by
/// [`build_label_table`] over the same (already call-stub/echon patched)
/// source.
pub fn patch_os_api_table(lines: &mut [String], labels: &HashMap<String, Word>) -> Result<()> {
    for line in lines.iter_mut() {
        let code = strip_comment(line);
        if code.starts_with(' ') {
            continue;
        }
        let trimmed = code.trim();
        let Some(eq) = trimmed.find('=') else { continue };
        let lhs = trimmed[..eq].trim();
        let Some(offset_text) = lhs.strip_prefix(".os_api+") else { continue };
        let Ok(index) = offset_text.parse::<usize>() else { continue };
        let Some(&handler) = OS_API_HANDLERS.get(index) else { continue };
        let addr = *labels
            .get(handler)
            .ok_or_else(|| EduvmError::link(format!("OS source has no '{handler}:' label for os_api slot {index}")))?;
        let comment = &line[code.len()..];
        *line = format!("{lhs} = {addr}{comment}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|s| s.to_string()).collect()
    }

    #[test]
    fn call_stub_operand_is_patched_to_shell_base() {
        let mut src = lines("CALL_STUB = 0\nCALL_STUB:\n  JSR 0\n  RET\n");
        patch_call_stub(&mut src, 9000).unwrap();
        assert_eq!(src[2], "  JSR 9000");
    }

    #[test]
    fn echon_call_site_is_patched_by_comment() {
        let mut src = lines("  JSR #0  ; call ECHON\n");
        patch_echon_call(&mut src, 9200).unwrap();
        assert_eq!(src[0], "  JSR #9200  ; call ECHON");
    }

    #[test]
    fn missing_echon_comment_is_a_link_error() {
        let mut src = lines("  JSR #0\n");
        assert!(patch_echon_call(&mut src, 1).is_err());
    }

    #[test]
    fn os_api_table_slots_resolve_to_handler_label_addresses() {
        let src = lines("dispatch_program:\n  NOP\nbuild_argv:\n  NOP\n.os_api+0 = 0\n.os_api+1 = 0\n");
        let labels = build_label_table(&src);
        assert_eq!(*labels.get("dispatch_program").unwrap(), 0);
        assert_eq!(*labels.get("build_argv").unwrap(), 1);

        let mut patched = src.clone();
        patch_os_api_table(&mut patched, &labels).unwrap();
        assert_eq!(patched[4], ".os_api+0 = 0");
        assert_eq!(patched[5], ".os_api+1 = 1");
    }

    #[test]
    fn unknown_handler_label_is_a_link_error() {
        let src = lines(".os_api+0 = 0\n");
        let labels = HashMap::new();
        assert!(patch_os_api_table(&mut src.clone(), &labels).is_err());
    }
}
