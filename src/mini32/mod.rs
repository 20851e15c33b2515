/*!
The Mini32 structured-language compiler: a small stack-machine-flavored
language that lowers to the same EASM text the hand-written assembler
source accepts. Grounded in `tools/mini32_compiler.py`'s pipeline shape
(preprocess lines, parse to a tree, walk the tree emitting assembly,
then a peephole cleanup pass) with the stack-based calling convention,
multi-value return, and indexed/pointer access spec.md adds on top.
*/

pub mod ast;
pub mod codegen;
pub mod lexer;
pub mod parser;
pub mod peephole;

use crate::error::Result;

/// Compiles Mini32 source to EASM text. `source_name` is used only for
/// error locations; the returned lines are ready to feed to
/// [`crate::asm::assemble`].
pub fn compile(source_name: &str, source: &str) -> Result<Vec<String>> {
    let lines = lexer::preprocess(source_name, source)?;
    let mut parser = parser::Parser::new(source_name, lines);
    let program = parser.parse()?;
    let generated = codegen::CodeGenerator::new(&parser, &program).generate()?;
    Ok(peephole::optimize(generated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_function_compiles_to_a_label_and_a_ret() {
        let src = "func main:\n    return\n";
        let lines = compile("t.mini32", src).unwrap();
        assert!(lines.iter().any(|l| l.trim() == "main:"));
        assert!(lines.iter().any(|l| l.trim() == "RET"));
    }

    #[test]
    fn arithmetic_and_store_lower_to_load_add_store() {
        let src = "var total\nfunc main:\n    let total = 1 + 2\n    return\n";
        let lines = compile("t.mini32", src).unwrap();
        assert!(lines.iter().any(|l| l.trim() == "LDI 1"));
        assert!(lines.iter().any(|l| l.trim() == "ADI 2"));
        assert!(lines.iter().any(|l| l.trim() == "STA .total"));
    }

    #[test]
    fn if_else_emits_no_redundant_load_after_store() {
        let src = "var x\nfunc main:\n    if x == 0:\n        let x = 1\n    else:\n        let x = 2\n    return\n";
        let lines = compile("t.mini32", src).unwrap();
        for w in lines.windows(2) {
            let a = w[0].trim();
            let b = w[1].trim();
            if let Some(target) = a.strip_prefix("STA ") {
                assert_ne!(b, format!("LDA {target}"), "redundant store-then-load survived peephole: {lines:?}");
            }
        }
    }
}
