/*!
The fixed OS ABI slot table: absolute RAM addresses every `abi: os`
module gets as pointer-variable aliases, and that the Mini32 compiler's
predefined-symbol table draws from so the two subsystems can't drift
apart.
*/

use crate::word::Word;

/// `(alias name, absolute address)`, in the order spec.md §6.6 lists
/// them. Single source of truth for both the loader's header
/// preprocessing and Mini32's `abi_mem`/`abi_const` predefined symbols.
pub const ABI_SLOTS: &[(&str, Word)] = &[
    ("char", 4000),
    ("textloc", 4001),
    ("arg1", 4002),
    ("arg2", 4003),
    ("res1", 4004),
    ("res2", 4005),
    ("pow2", 4006),
    ("num_digits", 4007),
    ("ascii_start", 4008),
    ("no_input", 4009),
    ("work1", 4010),
    ("work2", 4011),
    ("work3", 4012),
    ("work4", 4013),
    ("input_buf", 4100),
    ("input_ptr", 4180),
    ("cmd_len", 4181),
    ("cmd_ready", 4182),
    ("argv_base", 4400),
    ("argv_buf", 4500),
    ("random_seed", 4600),
    ("inc_random_seed", 4601),
    ("bits_avail", 4602),
    ("prog_table", 10000),
];

/// Address of the canonical program-table module, broken out because
/// both the linker's program-table synthesis and `gen_memory_map`-style
/// reporting need it by name rather than by scanning the slot list.
pub const PROG_TABLE_BASE: Word = 10000;

pub fn lookup(name: &str) -> Option<Word> {
    ABI_SLOTS.iter().find(|(n, _)| *n == name).map(|(_, addr)| *addr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prog_table_alias_matches_dedicated_constant() {
        assert_eq!(lookup("prog_table"), Some(PROG_TABLE_BASE));
    }

    #[test]
    fn unknown_alias_is_none() {
        assert_eq!(lookup("not_a_real_slot"), None);
    }
}
