/*!
`Machine`: wires a bare `cpu::Cpu` to its peripherals and drives the run
loop the four binaries share.

Overview
========
`Cpu::step` knows nothing about LCDs or monitors — it just exposes the
`ScreenData`/`ScreenCtrl` registers after every timestep. `Machine` polls
those registers when a step touches `DDI`/`DCI`, feeds them to whichever
display variant is configured, and forwards the result to a
`CharacterSink`. This mirrors the reference machine's separation between
the CPU simulator proper and its "external collaborator" displays.
*/

use log::{debug, trace};

use crate::cpu::{Cpu, HaltReason};
use crate::peripherals::{CharacterDisplay, CharacterSink, Monitor, NullSink};
use crate::word::Word;

/// Which character display, if any, is attached.
#[derive(Debug)]
pub enum Display {
    None,
    Lcd(CharacterDisplay),
    Monitor(Monitor),
}

/// A `Cpu` plus its attached peripherals, driving the shared run loop.
pub struct Machine {
    pub cpu: Cpu,
    display: Display,
    sink: Box<dyn CharacterSink>,
}

/// Why a run loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Halted,
    CycleBudgetExhausted,
}

impl Machine {
    pub fn new(cpu: Cpu, display: Display) -> Self {
        Machine {
            cpu,
            display,
            sink: Box::new(NullSink),
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn CharacterSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn set_keyboard(&mut self, value: Word) {
        self.cpu.keyboard = value;
    }

    pub fn output(&self) -> Word {
        self.cpu.regs.output
    }

    /// Runs one timestep and routes any display-affecting side effect to
    /// the attached peripheral.
    pub fn step(&mut self) -> Option<HaltReason> {
        let (effects, halt) = self.cpu.step();
        if effects.screen_data_written || effects.screen_ctrl_written {
            let data = self.cpu.regs.screen_data;
            let ctrl = self.cpu.regs.screen_ctrl;
            match &mut self.display {
                Display::None => {}
                Display::Lcd(lcd) => lcd.observe(data, ctrl, self.sink.as_mut()),
                Display::Monitor(mon) => mon.observe(data, ctrl, self.sink.as_mut()),
            }
        }
        if effects.output_written {
            trace!("output register <- {}", self.cpu.regs.output);
        }
        halt
    }

    /// Runs until `HLT` retires or `max_cycles` timesteps have elapsed,
    /// whichever comes first. A program that never halts (an assembler
    /// or compiler bug, or a deliberately interactive shell image) is
    /// not a crate-level error — the caller decides what "no natural
    /// halt" means for its invocation.
    pub fn run(&mut self, max_cycles: u64) -> StopReason {
        debug!("run: max_cycles={max_cycles}");
        for _ in 0..max_cycles {
            if self.step().is_some() {
                debug!("halted at pc={:#x}", self.cpu.program_counter());
                return StopReason::Halted;
            }
        }
        StopReason::CycleBudgetExhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Memory;

    #[test]
    fn run_stops_at_halt_before_budget_exhausted() {
        let mut mem = Memory::new(8);
        mem.write_block(0, &[5, 7, 255]); // LDI 7; HLT
        let cpu = Cpu::new(mem, 255);
        let mut machine = Machine::new(cpu, Display::None);
        assert_eq!(machine.run(1000), StopReason::Halted);
        assert_eq!(machine.cpu.regs.a, 7);
    }

    #[test]
    fn run_reports_budget_exhausted_for_infinite_loop() {
        let mut mem = Memory::new(8);
        mem.write_block(0, &[6, 0]); // JMP 0
        let cpu = Cpu::new(mem, 255);
        let mut machine = Machine::new(cpu, Display::None);
        assert_eq!(machine.run(50), StopReason::CycleBudgetExhausted);
    }
}
