/*!
Register file: every stateful element the control word can address, plus
bus arbitration.

Overview
========
Each register is a plain `Word` (or, for `Flags`, the latched two-bit
packing from `alu::Flags::pack`). `Registers::bus_value` implements the
fixed output-enable precedence from `microcode::BUS_PRECEDENCE` — when
more than one output-enable bit is asserted in the same control word
(a microcode bug, never legitimate), the *last* one in the precedence
list wins, matching the reference machine's last-assignment-wins bus
model rather than raising an error.
*/

use crate::alu;
use crate::microcode::{bit, BUS_PRECEDENCE, ControlWord};
use crate::word::{truncate, Word};

/// Every named register in the machine, plus the always-on `ScreenData`/
/// `ScreenCtrl` peripheral latches that the control unit treats as
/// ordinary registers for bus purposes.
#[derive(Debug, Clone, Default)]
pub struct Registers {
    pub pc: Word,
    pub a: Word,
    pub b: Word,
    pub mar: Word,
    pub mdr: Word,
    pub ir_a: Word,
    pub ir_b: Word,
    pub output: Word,
    pub input: Word,
    pub sp: Word,
    pub flags: Word,
    pub screen_data: Word,
    pub screen_ctrl: Word,
}

impl Registers {
    pub fn new(stack_pointer_start: Word) -> Self {
        Registers {
            sp: stack_pointer_start,
            ..Default::default()
        }
    }

    /// Resolves the value currently driving the bus for `control`, given
    /// the live ALU sum (computed every cycle regardless of whether `EO`
    /// is asserted) and the keyboard input-port value.
    ///
    /// Returns `0` if no output-enable bit is asserted (an idle bus,
    /// which in hardware floats but which the reference simulator treats
    /// as `0`).
    pub fn bus_value(&self, control: ControlWord, alu_sum: Word, keyboard: Word) -> Word {
        let mut value = 0;
        for &signal in BUS_PRECEDENCE {
            if control & signal == 0 {
                continue;
            }
            value = match signal {
                bit::IAO => self.ir_a,
                bit::IBO => self.ir_b,
                bit::RO => self.mdr,
                bit::AO => self.a,
                bit::KEO => keyboard,
                bit::EO => alu_sum,
                bit::CO => self.pc,
                bit::STO => self.sp,
                bit::BO => self.b,
                _ => value,
            };
        }
        value
    }

    /// Applies every input-latch bit in `control` for the current bus
    /// value, plus the register-file-local side effects (`CE`, `INS`,
    /// `DES`, `RSA`, `LSA`) that don't depend on memory. Memory-facing
    /// bits (`MI`, `RI`) are handled by the caller, which owns the
    /// `Memory`.
    ///
    /// `RSA`/`LSA` bypass the shared bus entirely: they are dedicated
    /// shift/double paths wired straight into `A`, not ALU-input
    /// modifiers like `SU`. `flags` is the ALU's evaluation of the
    /// current `(A, B, SU)` for every other instruction; `LSA` overrides
    /// it with the doubling operation's own carry/zero before `FI`
    /// latches.
    pub fn latch(&mut self, control: ControlWord, bus: Word, flags: alu::Flags, bits: u32) {
        if control & bit::RSA != 0 {
            self.a >>= 1;
        }
        let flags = if control & bit::LSA != 0 {
            let result = alu::evaluate(self.a, self.a, false, bits);
            self.a = result.sum;
            result.flags
        } else {
            flags
        };
        if control & bit::IAI != 0 {
            self.ir_a = bus;
        }
        if control & bit::IBI != 0 {
            self.ir_b = bus;
        }
        if control & bit::AI != 0 {
            self.a = bus;
        }
        if control & bit::BI != 0 {
            self.b = bus;
        }
        if control & bit::OI != 0 {
            self.output = bus;
        }
        if control & bit::FI != 0 {
            self.flags = flags.pack();
        }
        if control & bit::DDI != 0 {
            self.screen_data = bus;
        }
        if control & bit::DCI != 0 {
            self.screen_ctrl = truncate(bus >> bits.saturating_sub(3), 3);
        }
        if control & bit::SPI != 0 {
            self.sp = bus;
        }
        if control & bit::CE != 0 {
            // Deliberately unmasked: PC running past `2^bits` is how the
            // machine detects "ran off the end of memory" and halts, in
            // `Cpu::step` rather than here.
            self.pc += 1;
        }
        if control & bit::INS != 0 {
            self.sp = truncate(self.sp + 1, bits);
        }
        if control & bit::DES != 0 {
            self.sp = truncate(self.sp.wrapping_sub(1), bits);
        }
    }

    /// Unpacks the latched flag register into `(carry, zero)`.
    pub fn flag_bits(&self) -> alu::Flags {
        alu::Flags {
            carry: self.flags & 0b10 != 0,
            zero: self.flags & 0b01 != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_precedence_picks_last_asserted_signal() {
        let regs = Registers {
            a: 7,
            b: 9,
            ..Default::default()
        };
        // AO earlier in precedence than BO; BO should win.
        let control = bit::AO | bit::BO;
        assert_eq!(regs.bus_value(control, 0, 0), 9);
    }

    #[test]
    fn idle_bus_reads_zero() {
        let regs = Registers::new(0);
        assert_eq!(regs.bus_value(0, 42, 99), 0);
    }

    #[test]
    fn ce_increments_pc_without_masking() {
        // PC is deliberately left unmasked so `Cpu::step` can detect the
        // overflow and halt, rather than silently wrapping here.
        let mut regs = Registers::new(0);
        regs.pc = 255;
        regs.latch(bit::CE, 0, alu::Flags::default(), 8);
        assert_eq!(regs.pc, 256);
    }

    #[test]
    fn ins_increments_stack_pointer_des_decrements() {
        let mut regs = Registers::new(200);
        regs.latch(bit::INS, 0, alu::Flags::default(), 8);
        assert_eq!(regs.sp, 201);
        regs.latch(bit::DES, 0, alu::Flags::default(), 8);
        assert_eq!(regs.sp, 200);
    }

    #[test]
    fn dci_latches_the_top_three_bits_of_the_bus() {
        let mut regs = Registers::new(0);
        regs.latch(bit::DCI, 0b1010_0000, alu::Flags::default(), 8);
        assert_eq!(regs.screen_ctrl, 0b101);
    }

    #[test]
    fn flag_round_trip_through_pack_and_unpack() {
        let mut regs = Registers::new(0);
        let flags = alu::Flags { carry: true, zero: false };
        regs.latch(bit::FI, 0, flags, 8);
        assert_eq!(regs.flag_bits(), flags);
    }
}
