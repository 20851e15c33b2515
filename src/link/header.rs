/*!
Module header comments: `;! key: value` lines before any code, carrying
per-module linker metadata (base/align/deps/abi/bss/entry/name).
*/

use crate::word::Word;

/// Which BSS policy a module requested, per its `;! bss:` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BssSize {
    Auto,
    Fixed(Word),
    None,
}

impl Default for BssSize {
    fn default() -> Self {
        BssSize::Auto
    }
}

/// Which ABI aliases to inject, per the module's `;! abi:` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbiMode {
    #[default]
    None,
    Os,
}

#[derive(Debug, Clone)]
pub struct ModuleHeader {
    pub name: Option<String>,
    pub entry: String,
    pub align: Word,
    pub base: Option<Word>,
    pub deps: Vec<String>,
    pub abi: AbiMode,
    pub bss: BssSize,
    pub bss_align: Word,
}

impl Default for ModuleHeader {
    fn default() -> Self {
        ModuleHeader {
            name: None,
            entry: "start".to_string(),
            align: 100,
            base: None,
            deps: Vec::new(),
            abi: AbiMode::None,
            bss: BssSize::Auto,
            bss_align: 16,
        }
    }
}

/// Splits `lines` into `(header, body)`: every leading `;!` line is
/// consumed into `header`, the rest (starting at the first non-header
/// line, blank lines included) is returned as the module body.
pub fn extract_header(lines: &[String]) -> (ModuleHeader, Vec<String>) {
    let mut header = ModuleHeader::default();
    let mut split = 0;

    for line in lines {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix(";!") {
            apply_directive(&mut header, rest.trim());
            split += 1;
        } else {
            break;
        }
    }

    (header, lines[split..].to_vec())
}

fn apply_directive(header: &mut ModuleHeader, directive: &str) {
    let Some((key, value)) = directive.split_once(':') else {
        return;
    };
    let key = key.trim();
    let value = value.trim();

    match key {
        "name" => header.name = Some(value.to_lowercase()),
        "entry" => header.entry = value.to_string(),
        "align" => {
            if let Ok(n) = value.parse::<Word>() {
                header.align = n;
            }
        }
        "base" => {
            if let Ok(n) = value.parse::<Word>() {
                header.base = Some(n);
            }
        }
        "deps" => {
            header.deps = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        "abi" => {
            header.abi = match value {
                "os" => AbiMode::Os,
                _ => AbiMode::None,
            };
        }
        "bss" => {
            header.bss = match value {
                "auto" => BssSize::Auto,
                "none" => BssSize::None,
                n => n.parse::<Word>().map(BssSize::Fixed).unwrap_or(BssSize::Auto),
            };
        }
        "bss_align" => {
            if let Ok(n) = value.parse::<Word>() {
                header.bss_align = n;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(|s| s.to_string()).collect()
    }

    #[test]
    fn header_fields_are_parsed_and_stripped_from_body() {
        let src = lines(";! name: Shell\n;! entry: main\n;! align: 64\n;! deps: echon, divide\n;! abi: os\n;! bss: auto\nstart:\n  HLT\n");
        let (header, body) = extract_header(&src);
        assert_eq!(header.name.as_deref(), Some("shell"));
        assert_eq!(header.entry, "main");
        assert_eq!(header.align, 64);
        assert_eq!(header.deps, vec!["echon", "divide"]);
        assert_eq!(header.abi, AbiMode::Os);
        assert_eq!(header.bss, BssSize::Auto);
        assert_eq!(body, lines("start:\n  HLT\n"));
    }

    #[test]
    fn missing_header_leaves_defaults_and_full_body() {
        let src = lines("start:\n  HLT\n");
        let (header, body) = extract_header(&src);
        assert_eq!(header.entry, "start");
        assert_eq!(header.align, 100);
        assert!(header.base.is_none());
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn explicit_base_is_captured() {
        let src = lines(";! base: 9000\nstart:\n  HLT\n");
        let (header, _) = extract_header(&src);
        assert_eq!(header.base, Some(9000));
    }

    #[test]
    fn fixed_bss_size_parses_as_integer() {
        let src = lines(";! bss: 256\nstart:\n  HLT\n");
        let (header, _) = extract_header(&src);
        assert_eq!(header.bss, BssSize::Fixed(256));
    }
}
