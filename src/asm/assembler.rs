/*!
The two-pass EASM assembler: label/pointer-variable collection, then
opcode/operand encoding.
*/

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{EduvmError, Result, Warning};
use crate::memory::Memory;
use crate::microcode;
use crate::word::Word;

use super::expr::{self, JumpOperand};

/// One instruction line's tokens plus its UI-highlighting correction
/// (`code_address - program_line_index`, per the reference assembler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramLine {
    pub tokens: Vec<String>,
    pub correction: i64,
    pub source_line: usize,
}

/// Everything an assembled module produces: the populated memory, its
/// label/pointer-variable tables, the highlight-friendly program list,
/// and any non-fatal diagnostics.
#[derive(Debug)]
pub struct AssembleReport {
    pub memory: Memory,
    pub labels: HashMap<String, Word>,
    pub pointer_vars: HashMap<String, Word>,
    pub program: Vec<ProgramLine>,
    pub warnings: Vec<Warning>,
    /// Number of words occupied by the assembled instruction stream,
    /// starting at address 0 (the assembler never relocates).
    pub code_length: Word,
    /// Addresses of control-flow operand words written as a literal
    /// `#N` rather than resolved from a label, in source order. The
    /// linker's extern-call rewriting (`JSR @name` -> `JSR #0`) is the
    /// only producer of `#N` jump operands in practice, so this list
    /// lines up positionally with its `extern_calls` list.
    pub immediate_jump_sites: Vec<Word>,
}

struct PendingLine {
    tokens: Vec<String>,
    address: Word,
    progline: usize,
    source_line: usize,
}

fn strip_comment(line: &str) -> &str {
    match line.find(';') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn is_instruction_line(line: &str) -> bool {
    line.starts_with("  ") && line.as_bytes().get(2).is_some_and(|&b| b != b' ')
}

/// `true` if an address-expression LHS denotes a memory write (starts
/// with `.` or a digit) rather than a pointer-variable binding.
fn is_memory_write_lhs(lhs: &str) -> bool {
    matches!(lhs.chars().next(), Some(c) if c == '.' || c.is_ascii_digit())
}

fn write_string_literal(memory: &mut Memory, base: Word, text: &str) {
    for (i, byte) in text.bytes().enumerate() {
        memory.write(base + i as Word, byte as Word);
    }
}

/// Assembles `lines` (the body of one `.easm` module, header already
/// stripped) into a fresh `Memory` of the given word width. `source_name`
/// tags diagnostics.
pub fn assemble(source_name: impl AsRef<Path>, lines: &[String], bits: u32) -> Result<AssembleReport> {
    let source_name = source_name.as_ref().to_path_buf();
    let mut memory = Memory::new(bits);
    let mut labels: HashMap<String, Word> = HashMap::new();
    let mut pointer_vars: HashMap<String, Word> = HashMap::new();
    let mut pending: Vec<PendingLine> = Vec::new();
    let mut warnings = Vec::new();

    let mut address: Word = 0;
    let mut progline: usize = 0;

    for (line_no, raw) in lines.iter().enumerate() {
        let line = strip_comment(raw);
        if line.trim().is_empty() {
            continue;
        }

        if is_instruction_line(line) {
            let mut tokens: Vec<String> = line.trim().split(' ').map(|s| s.to_string()).collect();
            if tokens.len() > 2 {
                let operand: String = tokens[1..].concat();
                tokens = vec![tokens[0].clone(), operand];
            }
            let info = microcode::lookup_mnemonic(&tokens[0]).ok_or_else(|| {
                EduvmError::assembly(source_name.clone(), line_no + 1, format!("unknown mnemonic '{}'", tokens[0]))
            })?;
            let operand_count = (tokens.len() - 1) as u8;
            if operand_count != info.operands {
                return Err(EduvmError::assembly(
                    source_name.clone(),
                    line_no + 1,
                    format!(
                        "'{}' expects {} operand(s), got {operand_count}",
                        info.mnemonic, info.operands
                    ),
                ));
            }
            let word_count = tokens.len() as Word;
            pending.push(PendingLine {
                tokens,
                address,
                progline,
                source_line: line_no + 1,
            });
            address += word_count;
            progline += 1;
        } else if !line.starts_with(' ') {
            let line = line.trim();
            if let Some(eq) = line.find('=') {
                let lhs = line[..eq].trim();
                let rhs = line[eq + 1..].trim();
                if is_memory_write_lhs(lhs) {
                    let lhs_compact: String = lhs.chars().filter(|c| !c.is_whitespace()).collect();
                    let (addr, _) = expr::evaluate(&lhs_compact, &pointer_vars, bits);
                    if let Some(text) = rhs.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
                        write_string_literal(&mut memory, addr, text);
                    } else if let Some(text) = rhs.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
                        write_string_literal(&mut memory, addr, text);
                    } else {
                        let value: i64 = rhs.parse().map_err(|_| {
                            EduvmError::assembly(source_name.clone(), line_no + 1, format!("invalid literal '{rhs}'"))
                        })?;
                        memory.write(addr, (value.rem_euclid(1i64 << bits)) as Word);
                    }
                } else {
                    let rhs_compact: String = rhs.chars().filter(|c| !c.is_whitespace()).collect();
                    let (value, _) = expr::evaluate(&rhs_compact, &pointer_vars, bits);
                    pointer_vars.insert(lhs.to_string(), value);
                }
            } else if let Some(colon) = line.find(':') {
                let name = line[..colon].trim().to_string();
                labels.insert(name, address);
            }
        }
    }

    let code_length = address;
    let mut program = Vec::with_capacity(pending.len());
    let mut immediate_jump_sites = Vec::new();
    let mut memaddress: Word = 0;

    for line in pending {
        let PendingLine {
            mut tokens,
            address: line_address,
            progline,
            source_line,
        } = line;
        let correction = line_address as i64 - progline as i64;
        let info = microcode::lookup_mnemonic(&tokens[0]).expect("validated in pass 1");
        memory.write(memaddress, info.opcode as Word);
        memaddress += 1;

        if tokens.len() == 2 {
            let operand_addr = memaddress;
            let value = if info.is_jump {
                match expr::parse_jump_operand(&tokens[1]) {
                    JumpOperand::Immediate(n) => {
                        immediate_jump_sites.push(operand_addr);
                        n
                    }
                    JumpOperand::Label(name) => labels.get(&name).copied().ok_or_else(|| {
                        EduvmError::assembly(source_name.clone(), source_line, format!("undefined label '{name}'"))
                    })?,
                }
            } else {
                let (value, resolved) = expr::evaluate(&tokens[1], &pointer_vars, bits);
                if !resolved {
                    warnings.push(Warning {
                        file: Some(source_name.clone()),
                        line: Some(source_line),
                        message: format!("undefined pointer variable referenced in '{}'", tokens[1]),
                    });
                }
                value
            };
            memory.write(operand_addr, value);
            tokens[1] = value.to_string();
            memaddress += 1;
        }

        program.push(ProgramLine {
            tokens,
            correction,
            source_line,
        });
    }

    Ok(AssembleReport {
        memory,
        labels,
        pointer_vars,
        program,
        warnings,
        code_length,
        immediate_jump_sites,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|s| s.to_string()).collect()
    }

    #[test]
    fn simple_add_program_assembles_expected_bytes() {
        let src = lines("  LDA 10\n  ADD 11\n  STA 12\n  HLT\n10 = 3\n11 = 4\n");
        let report = assemble("t.easm", &src, 16).unwrap();
        assert_eq!(report.memory.read(0), 1); // LDA opcode
        assert_eq!(report.memory.read(1), 10);
        assert_eq!(report.memory.read(2), 2); // ADD opcode
        assert_eq!(report.memory.read(10), 3);
        assert_eq!(report.memory.read(11), 4);
    }

    #[test]
    fn label_resolves_to_absolute_address_for_jump() {
        let src = lines("loop:\n  LDI 1\n  JMP loop\n");
        let report = assemble("t.easm", &src, 16).unwrap();
        assert_eq!(*report.labels.get("loop").unwrap(), 0);
        assert_eq!(report.memory.read(3), 0); // JMP operand -> address of `loop`
    }

    #[test]
    fn pointer_variable_binds_and_resolves_in_later_expression() {
        let src = lines("base = 100\n  LDA base+2\n");
        let report = assemble("t.easm", &src, 16).unwrap();
        assert_eq!(*report.pointer_vars.get("base").unwrap(), 100);
        assert_eq!(report.memory.read(1), 102);
    }

    #[test]
    fn undefined_pointer_variable_warns_and_resolves_to_zero() {
        let src = lines("  LDA missing\n");
        let report = assemble("t.easm", &src, 16).unwrap();
        assert_eq!(report.memory.read(1), 0);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn unknown_mnemonic_is_fatal() {
        let src = lines("  FROB 1\n");
        let err = assemble("t.easm", &src, 16).unwrap_err();
        assert!(err.to_string().contains("unknown mnemonic"));
    }

    #[test]
    fn operand_arity_mismatch_is_fatal() {
        let src = lines("  LDA\n");
        let err = assemble("t.easm", &src, 16).unwrap_err();
        assert!(err.to_string().contains("expects 1 operand"));
    }

    #[test]
    fn string_literal_memory_write_spells_out_bytes() {
        let src = lines("200 = \"hi\"\n  NOP\n");
        let report = assemble("t.easm", &src, 16).unwrap();
        assert_eq!(report.memory.read(200), b'h' as Word);
        assert_eq!(report.memory.read(201), b'i' as Word);
    }

    #[test]
    fn immediate_jump_operand_is_recorded_for_extern_pairing() {
        let src = lines("  JSR #0\n  HLT\n");
        let report = assemble("t.easm", &src, 16).unwrap();
        assert_eq!(report.immediate_jump_sites, vec![1]);
    }
}
