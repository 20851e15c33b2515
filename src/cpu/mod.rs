/*!
cpu - Register file and clock discipline for the word machine.

    regs.rs   - `Registers`: every addressable register plus bus arbitration.
    clock.rs  - `Cpu`: the `update -> clock_high` cycle discipline, one
                micro-op at a time.

`Cpu` is the bare fetch/execute engine; peripherals (keyboard, output,
character display) are wired up one level up, in `crate::machine`, which
polls `Cpu`'s screen/output registers after each `step` and forwards them
to a `CharacterSink`.
*/

pub mod clock;
pub mod regs;

pub use clock::{Cpu, HaltReason, StepEffects};
pub use regs::Registers;
