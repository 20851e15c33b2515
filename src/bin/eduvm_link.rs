/*!
Drives the linker over a directory of `*.easm` modules plus a host OS
source file: emits `compiled_routines.json`, `memory_map.txt`,
`free_gaps.txt`, `bss_map.txt`, and patches the OS source in place per
spec.md §4.H's three-step call-stub/echon/os_api edit sequence.
*/

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use eduvm::link::os_patch;
use eduvm::link::{link, ModuleSource};
use eduvm::{EduvmError, Result};

#[derive(Parser)]
#[command(name = "eduvm-link", about = "Link a directory of EASM modules plus a host OS source")]
struct Args {
    /// Directory containing `*.easm` module sources.
    modules_dir: PathBuf,

    /// Host OS source file, patched in place after linking.
    os_source: PathBuf,

    /// Directory to write `compiled_routines.json`/`memory_map.txt`/
    /// `free_gaps.txt`/`bss_map.txt` into.
    #[arg(short = 'd', long = "out-dir", default_value = ".")]
    out_dir: PathBuf,

    /// CPU word width in bits (address space is also `2^bits` words).
    #[arg(long, default_value_t = 8)]
    bits: u32,
}

fn load_modules(dir: &std::path::Path) -> Result<Vec<ModuleSource>> {
    let mut sources = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| EduvmError::io(dir.to_path_buf(), e))?;
    for entry in entries {
        let entry = entry.map_err(|e| EduvmError::io(dir.to_path_buf(), e))?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "easm") {
            let text = fs::read_to_string(&path).map_err(|e| EduvmError::io(path.clone(), e))?;
            let name_hint = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
            let lines: Vec<String> = text.lines().map(str::to_string).collect();
            sources.push(ModuleSource::new(path, name_hint, lines));
        }
    }
    sources.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(sources)
}

fn run() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let sources = load_modules(&args.modules_dir)?;
    if sources.is_empty() {
        return Err(EduvmError::config(format!("{}: no '*.easm' module sources found", args.modules_dir.display())));
    }
    let report = link(&sources, args.bits)?;
    for w in &report.warnings {
        eprintln!("{w}");
    }

    fs::create_dir_all(&args.out_dir).map_err(|e| EduvmError::io(args.out_dir.clone(), e))?;

    let json_path = args.out_dir.join("compiled_routines.json");
    let json = report.image.to_json().map_err(|e| EduvmError::link(format!("failed to serialize image: {e}")))?;
    fs::write(&json_path, json).map_err(|e| EduvmError::io(json_path.clone(), e))?;

    let map_path = args.out_dir.join("memory_map.txt");
    fs::write(&map_path, &report.memory_map).map_err(|e| EduvmError::io(map_path.clone(), e))?;

    let gaps_path = args.out_dir.join("free_gaps.txt");
    fs::write(&gaps_path, &report.free_gaps).map_err(|e| EduvmError::io(gaps_path.clone(), e))?;

    let bss_path = args.out_dir.join("bss_map.txt");
    fs::write(&bss_path, &report.bss_map).map_err(|e| EduvmError::io(bss_path.clone(), e))?;

    let os_text = fs::read_to_string(&args.os_source).map_err(|e| EduvmError::io(args.os_source.clone(), e))?;
    let mut os_lines: Vec<String> = os_text.lines().map(str::to_string).collect();

    if let Some(shell) = report.image.modules.get("shell") {
        os_patch::patch_call_stub(&mut os_lines, shell.base)?;
    }
    if let Some(echon) = report.image.modules.get("echon") {
        os_patch::patch_echon_call(&mut os_lines, echon.base)?;
    }
    let labels = os_patch::build_label_table(&os_lines);
    os_patch::patch_os_api_table(&mut os_lines, &labels)?;

    let patched = os_lines.join("\n") + "\n";
    fs::write(&args.os_source, patched).map_err(|e| EduvmError::io(args.os_source.clone(), e))?;

    println!(
        "linked {} modules into {} ({} bytes written), patched {}",
        report.image.modules.len(),
        json_path.display(),
        fs::metadata(&json_path).map(|m| m.len()).unwrap_or(0),
        args.os_source.display()
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
