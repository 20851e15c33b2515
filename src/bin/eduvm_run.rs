/*!
Headless runner: loads an assembled/linked memory image (or a single
EASM source file), optionally overlays further JSON images, and steps
the machine to completion or a cycle cap. No actual rendering happens —
there is no font or framebuffer in this crate — but `--display` still
attaches the chosen state machine so `DDI`/`DCI` writes behave the same
as they would under a real LCD or monitor, and the final screen
contents print as text once the run stops.
*/

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use clap::{Parser, ValueEnum};
use eduvm::cpu::Cpu;
use eduvm::link::image::MemoryImage;
use eduvm::machine::{Display, Machine, StopReason};
use eduvm::memory::Memory;
use eduvm::peripherals::{CharacterDisplay, CharacterSink, Monitor};
use eduvm::{EduvmError, Result};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum DisplayKind {
    None,
    Lcd,
    Monitor,
}

#[derive(Parser)]
#[command(name = "eduvm-run", about = "Run an assembled or linked program headlessly")]
struct Args {
    /// Program to load: a `.easm` source file, or a JSON memory image.
    program: PathBuf,

    /// Additional JSON memory images overlaid into RAM after the initial load.
    #[arg(long = "json", value_name = "FILE")]
    json: Vec<PathBuf>,

    /// CPU word width in bits (address space is also `2^bits` words).
    #[arg(long, default_value_t = 8)]
    bits: u32,

    /// Initial stack pointer value. Defaults to the top of memory.
    #[arg(long = "sp")]
    stack_pointer: Option<u32>,

    /// Maximum timesteps to run before giving up.
    #[arg(long, default_value_t = 1_000_000)]
    max_cycles: u64,

    /// Address to start execution at (ignored when loading a JSON image
    /// with a named entry; use `--entry-label` instead).
    #[arg(long, default_value_t = 0)]
    start: u32,

    /// Which character display state machine, if any, to attach.
    #[arg(long = "display", value_enum, default_value_t = DisplayKind::None)]
    display: DisplayKind,

    /// Rows x cols of the attached display, e.g. `2x16` or `20x40`.
    #[arg(long = "display-size", default_value = "2x16")]
    display_size: String,
}

/// Remembers the most recent `redraw` behind a shared handle, so the
/// runner can print final screen contents after `Machine` has taken
/// ownership of the boxed sink.
#[derive(Default)]
struct ScreenState {
    buffer: Vec<u8>,
    cols: usize,
}

struct CapturingSink(Rc<RefCell<ScreenState>>);

impl CharacterSink for CapturingSink {
    fn redraw(&mut self, buffer: &[u8], cols: usize, _cursor: usize) {
        let mut state = self.0.borrow_mut();
        state.buffer = buffer.to_vec();
        state.cols = cols;
    }
}

fn print_screen(state: &ScreenState) {
    if state.cols == 0 {
        return;
    }
    println!("--- screen ---");
    for row in state.buffer.chunks(state.cols) {
        let text: String = row.iter().map(|&b| if b == 0 { ' ' } else { b as char }).collect();
        println!("{text}");
    }
}

fn parse_display_size(text: &str) -> Result<(usize, usize)> {
    let (rows, cols) = text
        .split_once('x')
        .ok_or_else(|| EduvmError::config(format!("invalid --display-size '{text}', expected ROWSxCOLS")))?;
    let rows = rows
        .parse()
        .map_err(|_| EduvmError::config(format!("invalid --display-size '{text}', expected ROWSxCOLS")))?;
    let cols = cols
        .parse()
        .map_err(|_| EduvmError::config(format!("invalid --display-size '{text}', expected ROWSxCOLS")))?;
    Ok((rows, cols))
}

fn load_image(memory: &mut Memory, image: &MemoryImage) {
    for module in image.modules.values() {
        for (offset, word) in module.words.iter().enumerate() {
            memory.write(module.base + offset as u32, *word);
        }
    }
}

fn run() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut memory = Memory::new(args.bits);
    let text = fs::read_to_string(&args.program).map_err(|e| EduvmError::io(args.program.clone(), e))?;

    if args.program.extension().is_some_and(|ext| ext == "json") {
        let image = MemoryImage::from_json(&text)
            .map_err(|e| EduvmError::config(format!("{}: invalid memory image: {e}", args.program.display())))?;
        load_image(&mut memory, &image);
    } else {
        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        let report = eduvm::asm::assemble(&args.program, &lines, args.bits)?;
        for w in &report.warnings {
            eprintln!("{w}");
        }
        memory.write_block(0, &(0..report.code_length).map(|a| report.memory.read(a)).collect::<Vec<_>>());
    }

    for path in &args.json {
        let text = fs::read_to_string(path).map_err(|e| EduvmError::io(path.clone(), e))?;
        let image = MemoryImage::from_json(&text)
            .map_err(|e| EduvmError::config(format!("{}: invalid memory image: {e}", path.display())))?;
        load_image(&mut memory, &image);
    }

    let stack_pointer = args.stack_pointer.unwrap_or_else(|| eduvm::word::mask(args.bits));
    let mut cpu = Cpu::new(memory, stack_pointer);
    cpu.regs.pc = args.start;

    let (rows, cols) = parse_display_size(&args.display_size)?;
    let display = match args.display {
        DisplayKind::None => Display::None,
        DisplayKind::Lcd => Display::Lcd(CharacterDisplay::new(rows, cols)),
        DisplayKind::Monitor => Display::Monitor(Monitor::new(rows, cols)),
    };
    let screen = Rc::new(RefCell::new(ScreenState::default()));
    let mut machine = Machine::new(cpu, display).with_sink(Box::new(CapturingSink(screen.clone())));

    let stop = machine.run(args.max_cycles);
    match stop {
        StopReason::Halted => println!("halted"),
        StopReason::CycleBudgetExhausted => println!("stopped: cycle budget exhausted"),
    }
    println!(
        "pc={} a={} b={} sp={} output={} flags={:#04x}",
        machine.cpu.program_counter(),
        machine.cpu.regs.a,
        machine.cpu.regs.b,
        machine.cpu.regs.sp,
        machine.cpu.regs.output,
        machine.cpu.regs.flags,
    );
    print_screen(&screen.borrow());
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
