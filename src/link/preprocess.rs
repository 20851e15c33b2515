/*!
Per-module preprocessing performed before a module's body is handed to
[`crate::asm::assemble`]: extern-call rewriting, auto-data discovery,
and BSS sizing. Address assignment for the discovered regions is done
by the caller (via [`super::layout::Layout`]) once every module's
requirements are known; this module only *discovers* the requirements
and rewrites the source text.
*/

use std::collections::HashSet;

use crate::word::Word;

use super::header::{BssSize, ModuleHeader};

/// One auto-detected data item: a column-0 `.NAME = VALUE` write whose
/// `NAME` had no prior pointer-variable binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoDataEntry {
    pub name: String,
    /// Words this entry needs reserved, including the implicit null
    /// terminator for strings (the assembler itself only writes the
    /// literal bytes; the following zero-initialized word serves as the
    /// terminator as long as the reservation leaves room for it).
    pub words: Word,
}

#[derive(Debug, Clone, Default)]
pub struct PreprocessResult {
    pub lines: Vec<String>,
    /// Extern callee names, in textual order, one per rewritten
    /// `JSR @name` site — positionally paired with the assembler's
    /// `immediate_jump_sites` once both are produced for the same body.
    pub extern_calls: Vec<String>,
    pub auto_data: Vec<AutoDataEntry>,
    pub bss_words: Word,
}

/// Rewrites `  JSR @name` into `  JSR #0`, recording `name` in order.
fn rewrite_extern_calls(lines: &[String]) -> (Vec<String>, Vec<String>) {
    let mut rewritten = Vec::with_capacity(lines.len());
    let mut extern_calls = Vec::new();

    for line in lines {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("JSR ") {
            if line.starts_with("  ") && !line.starts_with("   ") {
                if let Some(name) = rest.trim().strip_prefix('@') {
                    extern_calls.push(name.to_string());
                    rewritten.push("  JSR #0".to_string());
                    continue;
                }
            }
        }
        rewritten.push(line.clone());
    }

    (rewritten, extern_calls)
}

fn is_column_zero_declaration(line: &str) -> bool {
    !line.is_empty() && !line.starts_with(' ')
}

/// Scans for previously-bound pointer variables (`NAME = EXPR`, no
/// leading dot) so auto-data discovery doesn't mistake an ordinary
/// write through an already-known pointer variable for new data.
fn bound_pointer_vars(lines: &[String]) -> HashSet<String> {
    let mut bound = HashSet::new();
    for line in lines {
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line.as_str(),
        };
        if !is_column_zero_declaration(line) {
            continue;
        }
        let line = line.trim();
        if let Some(eq) = line.find('=') {
            let lhs = line[..eq].trim();
            if matches!(lhs.chars().next(), Some(c) if c != '.' && !c.is_ascii_digit()) {
                bound.insert(lhs.to_string());
            }
        }
    }
    bound
}

fn word_count_for_value(rhs: &str) -> Word {
    let rhs = rhs.trim();
    if let Some(text) = rhs.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        text.bytes().len() as Word + 1
    } else if let Some(text) = rhs.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        text.bytes().len() as Word + 1
    } else {
        1
    }
}

fn scan_auto_data(lines: &[String]) -> Vec<AutoDataEntry> {
    let bound = bound_pointer_vars(lines);
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for line in lines {
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line.as_str(),
        };
        if !is_column_zero_declaration(line) {
            continue;
        }
        let line = line.trim();
        let Some(eq) = line.find('=') else { continue };
        let lhs = line[..eq].trim();
        let rhs = line[eq + 1..].trim();
        let Some(name) = lhs.strip_prefix('.') else { continue };
        if bound.contains(name) || !seen.insert(name.to_string()) {
            continue;
        }
        entries.push(AutoDataEntry {
            name: name.to_string(),
            words: word_count_for_value(rhs),
        });
    }

    entries
}

/// `max(512, the largest ".bss + N" offset seen, or 1 if `.bss` is
/// referenced bare)`, per spec.md's `bss_required` scan.
const DEFAULT_BSS_SIZE: Word = 512;

fn compute_bss_required(lines: &[String]) -> Word {
    let mut required: Word = 0;
    for line in lines {
        let mut rest = line.as_str();
        while let Some(idx) = rest.find(".bss") {
            let after = &rest[idx + 4..];
            let offset = after
                .trim_start()
                .strip_prefix('+')
                .and_then(|s| {
                    let digits: String = s.trim_start().chars().take_while(|c| c.is_ascii_digit()).collect();
                    digits.parse::<Word>().ok()
                })
                .map(|n| n + 1)
                .unwrap_or(1);
            required = required.max(offset);
            rest = after;
        }
    }
    required
}

/// Runs extern rewriting, auto-data discovery, and BSS sizing over a
/// module's body (header already stripped by [`super::header::extract_header`]).
pub fn preprocess(body: &[String], header: &ModuleHeader) -> PreprocessResult {
    let (lines, extern_calls) = rewrite_extern_calls(body);
    let auto_data = scan_auto_data(&lines);
    let bss_words = match header.bss {
        BssSize::None => 0,
        BssSize::Fixed(n) => n,
        BssSize::Auto => DEFAULT_BSS_SIZE.max(compute_bss_required(&lines)),
    };

    PreprocessResult {
        lines,
        extern_calls,
        auto_data,
        bss_words,
    }
}

/// Builds the alias lines to prepend before assembling: OS ABI aliases
/// (if requested), dependency base aliases, the `bss = <base>` alias,
/// and one `NAME = <addr>` alias per discovered auto-data entry.
pub fn build_alias_header(
    header: &ModuleHeader,
    deps_bases: &[(String, Word)],
    bss_base: Option<Word>,
    data_base: Option<Word>,
    auto_data: &[AutoDataEntry],
) -> Vec<String> {
    let mut out = Vec::new();

    if header.abi == super::header::AbiMode::Os {
        for &(name, addr) in super::abi::ABI_SLOTS {
            out.push(format!("{name} = {addr}"));
        }
    }

    for (name, base) in deps_bases {
        out.push(format!("{name} = {base}"));
    }

    if let Some(base) = bss_base {
        out.push(format!("bss = {base}"));
    }

    if let Some(base) = data_base {
        let mut offset: Word = 0;
        for entry in auto_data {
            out.push(format!("{} = {}", entry.name, base + offset));
            offset += entry.words;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extern_call_site_is_rewritten_and_recorded() {
        let src = lines("  JSR @echon\n  HLT\n");
        let (rewritten, externs) = rewrite_extern_calls(&src);
        assert_eq!(rewritten[0], "  JSR #0");
        assert_eq!(externs, vec!["echon".to_string()]);
    }

    #[test]
    fn internal_jsr_is_left_untouched() {
        let src = lines("  JSR loop\n");
        let (rewritten, externs) = rewrite_extern_calls(&src);
        assert_eq!(rewritten, src);
        assert!(externs.is_empty());
    }

    #[test]
    fn auto_data_discovers_new_dotted_names_with_string_length() {
        let src = lines(".greeting = \"hi\"\n  NOP\n");
        let entries = scan_auto_data(&src);
        assert_eq!(entries, vec![AutoDataEntry { name: "greeting".to_string(), words: 3 }]);
    }

    #[test]
    fn auto_data_skips_names_already_bound_as_pointer_vars() {
        let src = lines("greeting = 5000\n.greeting = \"hi\"\n");
        let entries = scan_auto_data(&src);
        assert!(entries.is_empty());
    }

    #[test]
    fn bss_required_reads_largest_offset_plus_one() {
        let src = lines("  LDA .bss+10\n  STA .bss+3\n");
        assert_eq!(compute_bss_required(&src), 11);
    }

    #[test]
    fn bare_bss_reference_requires_one_word() {
        let src = lines("  LDA .bss\n");
        assert_eq!(compute_bss_required(&src), 1);
    }

    #[test]
    fn auto_bss_policy_takes_the_larger_of_default_and_required() {
        let header = ModuleHeader::default();
        let src = lines("  LDA .bss+1000\n");
        let result = preprocess(&src, &header);
        assert_eq!(result.bss_words, 1001);
    }
}
