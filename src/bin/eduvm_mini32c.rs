/*!
Compiles one Mini32 source file to EASM text, following
`tools/mini32_compiler.py`'s CLI shape: a positional input path and an
optional `-o`/`--output` destination, stdout otherwise.
*/

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use eduvm::{EduvmError, Result};

#[derive(Parser)]
#[command(name = "eduvm-mini32c", about = "Compile a Mini32 source file to EASM")]
struct Args {
    /// Mini32 source file (`.mini32`).
    input: PathBuf,

    /// Destination for the generated EASM text. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,
}

fn run() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let source = fs::read_to_string(&args.input).map_err(|e| EduvmError::io(args.input.clone(), e))?;
    let source_name = args.input.to_string_lossy().into_owned();
    let lines = eduvm::mini32::compile(&source_name, &source)?;
    let text = lines.join("\n") + "\n";

    match &args.output {
        Some(path) => fs::write(path, &text).map_err(|e| EduvmError::io(path.clone(), e))?,
        None => {
            std::io::stdout()
                .write_all(text.as_bytes())
                .map_err(|e| EduvmError::io("<stdout>", e))?;
        }
    }
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
