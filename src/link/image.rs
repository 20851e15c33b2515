/*!
The JSON memory image: `serde`-derived mirrors of spec.md §6.4's module
map and §6.5's packed program-table entries.
*/

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::word::Word;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BssRegion {
    pub base: Word,
    pub size: Word,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleImage {
    pub base: Word,
    pub length: Word,
    pub words: Vec<Word>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub deps: BTreeMap<String, Word>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bss: Option<BssRegion>,
}

/// The full link output: every module keyed by name, in the exact shape
/// `eduvm-link` writes to `compiled_routines.json`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct MemoryImage {
    #[serde(flatten)]
    pub modules: BTreeMap<String, ModuleImage>,
}

impl MemoryImage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Packs one program-table entry per spec.md §6.5: 8 ASCII name bytes
/// (zero-padded/truncated), the module's entry address, and a reserved
/// zero word.
pub fn pack_program_table_entry(name: &str, entry_addr: Word) -> [Word; 10] {
    let mut words = [0; 10];
    for (i, slot) in words[..8].iter_mut().enumerate() {
        *slot = name.as_bytes().get(i).copied().unwrap_or(0) as Word;
    }
    words[8] = entry_addr;
    words[9] = 0;
    words
}

/// Builds the `program_table` module's word array: every callable
/// module's packed entry, in the order given, followed by a single zero
/// sentinel word.
pub fn build_program_table(entries: &[(String, Word)]) -> Vec<Word> {
    let mut words = Vec::with_capacity(entries.len() * 10 + 1);
    for (name, addr) in entries {
        words.extend_from_slice(&pack_program_table_entry(name, *addr));
    }
    words.push(0);
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_table_entry_truncates_and_pads_the_name() {
        let entry = pack_program_table_entry("ab", 1234);
        assert_eq!(&entry[..2], &[b'a' as Word, b'b' as Word]);
        assert_eq!(&entry[2..8], &[0; 6]);
        assert_eq!(entry[8], 1234);
        assert_eq!(entry[9], 0);
    }

    #[test]
    fn program_table_entry_truncates_names_longer_than_eight() {
        let entry = pack_program_table_entry("toolongname", 1);
        assert_eq!(entry[0], b't' as Word);
        assert_eq!(entry[7], b'm' as Word);
    }

    #[test]
    fn build_program_table_ends_with_zero_sentinel() {
        let words = build_program_table(&[("shell".to_string(), 9000)]);
        assert_eq!(words.len(), 11);
        assert_eq!(words[10], 0);
    }

    #[test]
    fn memory_image_round_trips_through_json() {
        let mut image = MemoryImage::default();
        image.modules.insert(
            "echon".to_string(),
            ModuleImage {
                base: 9000,
                length: 3,
                words: vec![1, 2, 3],
                entry: Some("start".to_string()),
                deps: BTreeMap::new(),
                bss: Some(BssRegion { base: 9500, size: 512 }),
            },
        );
        let json = image.to_json().unwrap();
        let parsed = MemoryImage::from_json(&json).unwrap();
        assert_eq!(image, parsed);
    }
}
