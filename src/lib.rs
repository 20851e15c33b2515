#![doc = r#"
Library crate for a small word-addressed educational computer: its
microcoded CPU, a two-pass assembler for its EASM language, a module
linker/loader, and a compiler for the higher-level Mini32 language that
lowers to EASM.

Modules:
- word: the `Word` alias and bit-width masking shared by every component
- memory: flat word-addressed RAM
- alu: the adder/subtractor and its carry/zero flags
- microcode: control-word bits, the opcode table, and per-opcode microcode
- cpu: register file and the clock discipline
- peripherals: character LCD / monitor state machines
- machine: glue between `cpu::Cpu` and its peripherals, plus the run loop
- asm: the two-pass EASM assembler
- link: module header parsing, auto-layout, relocation, and image emission
- mini32: the Mini32 structured-language compiler, lowering to EASM
- error: the shared `EduvmError`/`Result`/`Warning` types
"#]

pub mod alu;
pub mod asm;
pub mod cpu;
pub mod error;
pub mod link;
pub mod machine;
pub mod memory;
pub mod microcode;
pub mod mini32;
pub mod peripherals;
pub mod word;

pub use error::{EduvmError, Result, Warning};
pub use machine::Machine;
pub use memory::Memory;
pub use word::Word;
