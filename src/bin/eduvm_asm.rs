/*!
Assembles one EASM source file: writes the assembled words plus a
disassembly-friendly listing (mnemonic/operand per source line, with the
reference assembler's highlight correction alongside).
*/

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use eduvm::{EduvmError, Result};

#[derive(Parser)]
#[command(name = "eduvm-asm", about = "Assemble one EASM source file")]
struct Args {
    /// EASM source file (`.easm`).
    input: PathBuf,

    /// Destination for the assembled words, one decimal value per line.
    /// Defaults to `<input>.words`.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Destination for the disassembly-friendly listing. Defaults to
    /// `<input>.lst`.
    #[arg(long = "listing")]
    listing: Option<PathBuf>,

    /// CPU word width in bits (address space is also `2^bits` words).
    #[arg(long, default_value_t = 8)]
    bits: u32,
}

fn run() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let text = fs::read_to_string(&args.input).map_err(|e| EduvmError::io(args.input.clone(), e))?;
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    let report = eduvm::asm::assemble(&args.input, &lines, args.bits)?;
    for w in &report.warnings {
        eprintln!("{w}");
    }

    let words_path = args.output.clone().unwrap_or_else(|| args.input.with_extension("words"));
    let words_text: String = (0..report.code_length)
        .map(|addr| report.memory.read(addr).to_string())
        .collect::<Vec<_>>()
        .join("\n")
        + "\n";
    fs::write(&words_path, words_text).map_err(|e| EduvmError::io(words_path.clone(), e))?;

    let listing_path = args.listing.clone().unwrap_or_else(|| args.input.with_extension("lst"));
    let mut listing = String::new();
    for line in &report.program {
        listing.push_str(&format!(
            "{:>5}  correction={:<4} {}\n",
            line.source_line,
            line.correction,
            line.tokens.join(" ")
        ));
    }
    fs::write(&listing_path, listing).map_err(|e| EduvmError::io(listing_path.clone(), e))?;

    println!(
        "assembled {} words into {} ({})",
        report.code_length,
        words_path.display(),
        listing_path.display()
    );
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
