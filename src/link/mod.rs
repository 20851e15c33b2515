/*!
The module linker/loader: header parsing, preprocessing, auto-layout,
relocation, extern resolution, and JSON image emission for a directory
of EASM modules plus a host OS source.

    header.rs    - `;! key: value` module header parsing
    preprocess.rs - extern rewriting, auto-data discovery, BSS sizing
    layout.rs    - base-address placement and overlap/gap bookkeeping
    relocate.rs  - in-place operand relocation and extern resolution
    image.rs     - the `serde` JSON image and program-table packing
    os_patch.rs  - the three textual OS-source edits
    report.rs    - memory_map/free_gaps/bss_map text reports
    abi.rs       - the fixed OS ABI slot table

`link` ties these together: modules are processed in dependency order
(a module's `deps` must already have a chosen base before it is
assembled, since those bases are injected as pointer-variable aliases),
each is preprocessed, its BSS/data regions are placed, its code is
assembled at a virtual base of zero (the canonical assembler behavior,
which never relocates on its own), its real length drives the final
base choice, and its operands are relocated in place.
*/

pub mod abi;
pub mod header;
pub mod image;
pub mod layout;
pub mod os_patch;
pub mod preprocess;
pub mod relocate;
pub mod report;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::error::{EduvmError, Result, Warning};
use crate::word::Word;

use header::{extract_header, ModuleHeader};
use image::{build_program_table, BssRegion, MemoryImage, ModuleImage};
use layout::Layout;
use preprocess::preprocess;
use relocate::{relocate_in_place, resolve_externs};
use report::{bss_map_txt, free_gaps_txt, memory_map_txt, Segment};

/// One `.easm` (or legacy `.txt`) module source, not yet header-split.
#[derive(Debug, Clone)]
pub struct ModuleSource {
    pub path: PathBuf,
    pub name_hint: String,
    pub lines: Vec<String>,
}

impl ModuleSource {
    pub fn new(path: impl Into<PathBuf>, name_hint: impl Into<String>, lines: Vec<String>) -> Self {
        ModuleSource {
            path: path.into(),
            name_hint: name_hint.into(),
            lines,
        }
    }
}

/// Everything a completed link produces.
#[derive(Debug)]
pub struct LinkReport {
    pub image: MemoryImage,
    pub warnings: Vec<Warning>,
    pub memory_map: String,
    pub free_gaps: String,
    pub bss_map: String,
}

/// Fixed high-RAM address the auto-layout cursor starts from. spec.md
/// leaves the exact value to the implementation (§9 Open Question,
/// resolved in DESIGN.md); chosen comfortably above the ABI's own
/// highest fixed slot region and below `prog_table`.
const LAYOUT_START: Word = 20000;
const DATA_ALIGN: Word = 16;

fn topo_order(parsed: &[(String, ModuleHeader, Vec<String>)]) -> Result<Vec<usize>> {
    let names: Vec<&str> = parsed.iter().map(|(n, _, _)| n.as_str()).collect();
    let mut visited = vec![0u8; parsed.len()]; // 0 = unvisited, 1 = in-progress, 2 = done
    let mut order = Vec::with_capacity(parsed.len());

    fn visit(
        idx: usize,
        names: &[&str],
        parsed: &[(String, ModuleHeader, Vec<String>)],
        visited: &mut [u8],
        order: &mut Vec<usize>,
    ) -> Result<()> {
        match visited[idx] {
            2 => return Ok(()),
            1 => return Err(EduvmError::link(format!("dependency cycle involving module '{}'", names[idx]))),
            _ => {}
        }
        visited[idx] = 1;
        for dep in &parsed[idx].1.deps {
            let dep_idx = names
                .iter()
                .position(|n| n == dep)
                .ok_or_else(|| EduvmError::link(format!("module '{}' depends on undefined module '{dep}'", names[idx])))?;
            visit(dep_idx, names, parsed, visited, order)?;
        }
        visited[idx] = 2;
        order.push(idx);
        Ok(())
    }

    for idx in 0..parsed.len() {
        visit(idx, &names, parsed, &mut visited, &mut order)?;
    }
    Ok(order)
}

/// Links every module in `sources` plus the shared `bits` word width
/// into a single [`LinkReport`].
pub fn link(sources: &[ModuleSource], bits: u32) -> Result<LinkReport> {
    let parsed: Vec<(String, ModuleHeader, Vec<String>)> = sources
        .iter()
        .map(|src| {
            let (header, body) = extract_header(&src.lines);
            let name = header.name.clone().unwrap_or_else(|| src.name_hint.to_lowercase());
            (name, header, body)
        })
        .collect();

    let order = topo_order(&parsed)?;

    let mut layout = Layout::new(LAYOUT_START);
    let mut bases: HashMap<String, Word> = HashMap::new();
    let mut modules: BTreeMap<String, ModuleImage> = BTreeMap::new();
    let mut warnings = Vec::new();
    let mut segments = Vec::new();
    let mut bss_rows: Vec<(String, Word, Word)> = Vec::new();
    let mut program_entries: Vec<(String, Word)> = Vec::new();
    let mut pending_externs: Vec<(Word, String)> = Vec::new();

    for idx in order {
        let (name, header, body) = &parsed[idx];
        let source_path = sources[idx].path.clone();

        let pre = preprocess(body, header);

        let deps_bases: Vec<(String, Word)> = header
            .deps
            .iter()
            .map(|dep| {
                bases
                    .get(dep)
                    .copied()
                    .map(|b| (dep.clone(), b))
                    .ok_or_else(|| EduvmError::link(format!("module '{name}' depends on unplaced module '{dep}'")))
            })
            .collect::<Result<_>>()?;

        let bss_base = if pre.bss_words > 0 {
            Some(layout.place(pre.bss_words, header.bss_align, idx))
        } else {
            None
        };

        let total_data_words: Word = pre.auto_data.iter().map(|e| e.words).sum();
        let data_base = if total_data_words > 0 {
            Some(layout.place(total_data_words, DATA_ALIGN, idx))
        } else {
            None
        };

        let alias_lines = preprocess::build_alias_header(header, &deps_bases, bss_base, data_base, &pre.auto_data);
        let mut final_lines = alias_lines;
        final_lines.extend(pre.lines.iter().cloned());

        let mut report = crate::asm::assemble(&source_path, &final_lines, bits)?;
        for w in &report.warnings {
            warnings.push(w.clone());
        }

        let code_length = report.code_length;
        let code_base = match header.base {
            Some(base) => {
                layout.reserve_fixed(base, code_length, idx);
                base
            }
            None => layout.place(code_length, header.align, idx),
        };

        relocate_in_place(&mut report.memory, &report.program, code_length, code_base, &report.immediate_jump_sites)?;

        for (site, extern_name) in report.immediate_jump_sites.iter().zip(pre.extern_calls.iter()) {
            pending_externs.push((code_base + site, extern_name.clone()));
        }

        bases.insert(name.clone(), code_base);
        let entry_addr = report.labels.get(&header.entry).copied().unwrap_or(0) + code_base;
        program_entries.push((name.clone(), entry_addr));

        segments.push(Segment {
            start: code_base,
            end: code_base + code_length,
            kind: "code",
            name: name.clone(),
        });

        let words: Vec<Word> = (0..code_length).map(|i| report.memory.read(i)).collect();

        let bss = bss_base.map(|base| {
            segments.push(Segment {
                start: base,
                end: base + pre.bss_words,
                kind: "bss",
                name: name.clone(),
            });
            bss_rows.push((name.clone(), base, pre.bss_words));
            BssRegion { base, size: pre.bss_words }
        });

        let deps: BTreeMap<String, Word> = deps_bases.into_iter().collect();

        modules.insert(
            name.clone(),
            ModuleImage {
                base: code_base,
                length: code_length,
                words,
                entry: Some(header.entry.clone()),
                deps,
                bss,
            },
        );

        if let Some(base) = data_base {
            segments.push(Segment {
                start: base,
                end: base + total_data_words,
                kind: "data",
                name: format!("{name}_data"),
            });
            let data_words: Vec<Word> = (base..base + total_data_words).map(|a| report.memory.read(a)).collect();
            modules.insert(
                format!("{name}_data"),
                ModuleImage {
                    base,
                    length: total_data_words,
                    words: data_words,
                    entry: None,
                    deps: BTreeMap::new(),
                    bss: None,
                },
            );
        }
    }

    // Resolve every extern call site now that every module has a base.
    let symbols: HashMap<String, Word> = bases.clone();
    for (name, image) in modules.iter_mut() {
        let sites: Vec<(Word, String)> = pending_externs
            .iter()
            .filter(|(addr, _)| *addr >= image.base && *addr < image.base + image.length)
            .map(|(addr, sym)| (addr - image.base, sym.clone()))
            .collect();
        if sites.is_empty() {
            continue;
        }
        let mut scratch = crate::memory::Memory::new(bits);
        scratch.write_block(0, &image.words);
        resolve_externs(&mut scratch, &sites, &symbols).map_err(|e| {
            EduvmError::link(format!("{name}: {e}"))
        })?;
        image.words = (0..image.length).map(|i| scratch.read(i)).collect();
    }

    let program_table_words = build_program_table(&program_entries);
    layout.reserve_fixed(abi::PROG_TABLE_BASE, program_table_words.len() as Word, usize::MAX);
    segments.push(Segment {
        start: abi::PROG_TABLE_BASE,
        end: abi::PROG_TABLE_BASE + program_table_words.len() as Word,
        kind: "prog_table",
        name: "program_table".to_string(),
    });
    modules.insert(
        "program_table".to_string(),
        ModuleImage {
            base: abi::PROG_TABLE_BASE,
            length: program_table_words.len() as Word,
            words: program_table_words,
            entry: None,
            deps: BTreeMap::new(),
            bss: None,
        },
    );

    if let Some((a, b)) = layout.find_overlap() {
        return Err(EduvmError::link(format!(
            "module layout overlap: [{},{}) collides with [{},{})",
            a.start, a.end, b.start, b.end
        )));
    }

    let image = MemoryImage { modules };
    let memory_map = memory_map_txt(&segments);
    let free_gaps = free_gaps_txt(&segments);
    let bss_map = bss_map_txt(&bss_rows);

    Ok(LinkReport {
        image,
        warnings,
        memory_map,
        free_gaps,
        bss_map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|s| s.to_string()).collect()
    }

    #[test]
    fn two_independent_modules_link_without_overlap() {
        let sources = vec![
            ModuleSource::new("a.easm", "a", lines("start:\n  LDI 1\n  HLT\n")),
            ModuleSource::new("b.easm", "b", lines("start:\n  LDI 2\n  HLT\n")),
        ];
        let report = link(&sources, 16).unwrap();
        assert!(report.image.modules.contains_key("a"));
        assert!(report.image.modules.contains_key("b"));
        assert!(report.image.modules.contains_key("program_table"));
        let a_base = report.image.modules["a"].base;
        let b_base = report.image.modules["b"].base;
        assert_ne!(a_base, b_base);
    }

    #[test]
    fn dependent_module_receives_its_dependency_base_as_alias() {
        let sources = vec![
            ModuleSource::new("divide.easm", "divide", lines("start:\n  HLT\n")),
            ModuleSource::new(
                "display_number.easm",
                "display_number",
                lines(";! deps: divide\nstart:\n  LDA divide\n  HLT\n"),
            ),
        ];
        let report = link(&sources, 16).unwrap();
        let divide_base = report.image.modules["divide"].base;
        let dn = &report.image.modules["display_number"];
        assert_eq!(dn.words[1], divide_base);
    }

    #[test]
    fn extern_call_site_resolves_to_callee_module_base() {
        let sources = vec![
            ModuleSource::new("echon.easm", "echon", lines("start:\n  HLT\n")),
            ModuleSource::new("shell.easm", "shell", lines("start:\n  JSR @echon\n  HLT\n")),
        ];
        let report = link(&sources, 16).unwrap();
        let echon_base = report.image.modules["echon"].base;
        let shell = &report.image.modules["shell"];
        assert_eq!(shell.words[1], echon_base);
    }

    #[test]
    fn explicit_base_module_reserves_its_fixed_range() {
        let sources = vec![ModuleSource::new("fixed.easm", "fixed", lines(";! base: 9000\nstart:\n  HLT\n"))];
        let report = link(&sources, 16).unwrap();
        assert_eq!(report.image.modules["fixed"].base, 9000);
    }

    #[test]
    fn overlapping_explicit_bases_are_a_link_error() {
        let sources = vec![
            ModuleSource::new("a.easm", "a", lines(";! base: 9000\nstart:\n  LDI 1\n  HLT\n")),
            ModuleSource::new("b.easm", "b", lines(";! base: 9000\nstart:\n  LDI 2\n  HLT\n")),
        ];
        assert!(link(&sources, 16).is_err());
    }

    #[test]
    fn missing_dependency_is_a_link_error() {
        let sources = vec![ModuleSource::new("a.easm", "a", lines(";! deps: ghost\nstart:\n  HLT\n"))];
        assert!(link(&sources, 16).is_err());
    }

    #[test]
    fn auto_data_module_produces_a_data_sibling_image() {
        let sources = vec![ModuleSource::new(
            "greet.easm",
            "greet",
            lines("start:\n  LDA greeting\n  HLT\n.greeting = \"hi\"\n"),
        )];
        let report = link(&sources, 16).unwrap();
        assert!(report.image.modules.contains_key("greet_data"));
        let data = &report.image.modules["greet_data"];
        assert_eq!(data.words[0], b'h' as Word);
        assert_eq!(data.words[1], b'i' as Word);
    }
}
