/*!
Operand expression evaluation: `+`/`-` chains of integer literals, bare
names (pointer variables), and `.name` pointer-variable dereferences.
*/

use std::collections::HashMap;

use crate::word::Word;

/// One term in a `+`/`-` expression, with the sign that precedes it.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Literal(i64),
    Name(String),
    PointerRef(String),
}

/// Splits `text` into signed terms. The first term's implicit sign is
/// `+`. Whitespace around operators is tolerated; whitespace inside a
/// term is not (names don't contain spaces).
fn split_terms(text: &str) -> Vec<(bool, Term)> {
    let mut terms = Vec::new();
    let mut positive = true;
    let mut current = String::new();

    let flush = |current: &mut String, positive: bool, terms: &mut Vec<(bool, Term)>| {
        let token = current.trim();
        if token.is_empty() {
            return;
        }
        let term = if let Some(name) = token.strip_prefix('.') {
            Term::PointerRef(name.to_string())
        } else if let Ok(n) = token.parse::<i64>() {
            Term::Literal(n)
        } else {
            Term::Name(token.to_string())
        };
        terms.push((positive, term));
        current.clear();
    };

    for ch in text.chars() {
        match ch {
            '+' => {
                flush(&mut current, positive, &mut terms);
                positive = true;
            }
            '-' => {
                flush(&mut current, positive, &mut terms);
                positive = false;
            }
            _ => current.push(ch),
        }
    }
    flush(&mut current, positive, &mut terms);
    terms
}

/// Evaluates an expression of `+`/`-` terms against the known
/// pointer-variable table. Labels never participate in data-expression
/// evaluation (only in jump operands, via `parse_jump_operand`).
/// Unresolved names warn (via the returned `bool`) and contribute `0`.
///
/// Returns `(value, all_resolved)`.
pub fn evaluate(text: &str, pointer_vars: &HashMap<String, Word>, bits: u32) -> (Word, bool) {
    let modulus: i64 = 1i64 << bits;
    let mut total: i64 = 0;
    let mut all_resolved = true;

    for (positive, term) in split_terms(text) {
        let value = match term {
            Term::Literal(n) => n,
            Term::Name(name) | Term::PointerRef(name) => {
                if let Some(&v) = pointer_vars.get(&name) {
                    v as i64
                } else {
                    all_resolved = false;
                    0
                }
            }
        };
        total += if positive { value } else { -value };
    }

    let wrapped = total.rem_euclid(modulus) as Word;
    (wrapped, all_resolved)
}

/// Parses a control-flow operand: `#<int>` is a literal target, anything
/// else is a label name to resolve against `labels`.
pub enum JumpOperand {
    Immediate(Word),
    Label(String),
}

pub fn parse_jump_operand(text: &str) -> JumpOperand {
    if let Some(n) = text.strip_prefix('#') {
        let value = n.trim().parse::<i64>().unwrap_or(0);
        JumpOperand::Immediate(value.rem_euclid(1 << 32) as Word)
    } else {
        JumpOperand::Label(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_sum_evaluates_directly() {
        let vars = HashMap::new();
        let (v, ok) = evaluate("3+4-1", &vars, 32);
        assert_eq!(v, 6);
        assert!(ok);
    }

    #[test]
    fn pointer_ref_resolves_from_table() {
        let mut vars = HashMap::new();
        vars.insert("char".to_string(), 4000);
        let (v, ok) = evaluate(".char+1", &vars, 32);
        assert_eq!(v, 4001);
        assert!(ok);
    }

    #[test]
    fn undefined_name_warns_and_resolves_to_zero() {
        let vars = HashMap::new();
        let (v, ok) = evaluate("missing", &vars, 32);
        assert_eq!(v, 0);
        assert!(!ok);
    }

    #[test]
    fn negative_total_wraps_into_word_range() {
        let vars = HashMap::new();
        let (v, ok) = evaluate("0-1", &vars, 8);
        assert_eq!(v, 255);
        assert!(ok);
    }

    #[test]
    fn immediate_jump_operand_parses_hash_prefix() {
        match parse_jump_operand("#0") {
            JumpOperand::Immediate(n) => assert_eq!(n, 0),
            JumpOperand::Label(_) => panic!("expected immediate"),
        }
    }

    #[test]
    fn bare_name_jump_operand_is_a_label() {
        match parse_jump_operand("loop_top") {
            JumpOperand::Label(name) => assert_eq!(name, "loop_top"),
            JumpOperand::Immediate(_) => panic!("expected label"),
        }
    }
}
