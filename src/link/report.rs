/*!
Human-readable and machine-readable layout reports, generated from the
same [`super::layout::Layout`] that drives placement so they can never
drift from the addresses actually used. Grounded in
`tools/gen_memory_map.py`'s segment/gap model, generalized from that
script's fixed JSON input to this crate's auto-layout.
*/

use crate::word::Word;

/// One placed region, named for reporting purposes (`gen_memory_map.py`'s
/// `Segment`).
#[derive(Debug, Clone)]
pub struct Segment {
    pub start: Word,
    pub end: Word,
    pub kind: &'static str,
    pub name: String,
}

impl Segment {
    fn length(&self) -> Word {
        self.end.saturating_sub(self.start)
    }

    fn as_line(&self) -> String {
        format!(
            "[{},{})  {:12}  {:20}  len={}",
            self.start,
            self.end,
            self.kind,
            self.name,
            self.length()
        )
    }
}

/// `memory_map.txt`: every segment sorted by address, plus the free
/// gaps between them.
pub fn memory_map_txt(segments: &[Segment]) -> String {
    let mut sorted = segments.to_vec();
    sorted.sort_by_key(|s| (s.start, s.end));

    let mut out = String::new();
    out.push_str("Memory Map Overview (sorted by start address)\n\n");
    out.push_str("Segments:\n");
    for seg in &sorted {
        out.push_str("  ");
        out.push_str(&seg.as_line());
        out.push('\n');
    }

    out.push('\n');
    let gaps = free_gaps(&sorted);
    if !gaps.is_empty() {
        out.push_str("Free gaps between segments:\n");
        for (start, end) in &gaps {
            out.push_str(&format!("  [{start},{end})  words={}  (free)\n", end - start));
        }
    }
    out
}

fn free_gaps(sorted: &[Segment]) -> Vec<(Word, Word)> {
    let mut gaps = Vec::new();
    for pair in sorted.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if b.start > a.end {
            gaps.push((a.end, b.start));
        }
    }
    gaps
}

/// `free_gaps.txt`: the same gap list, one `start,end` pair per line.
pub fn free_gaps_txt(segments: &[Segment]) -> String {
    let mut sorted = segments.to_vec();
    sorted.sort_by_key(|s| (s.start, s.end));
    let mut out = String::new();
    for (start, end) in free_gaps(&sorted) {
        out.push_str(&format!("{start},{end}\n"));
    }
    out
}

/// `bss_map.txt`: one `module: [base, base+size)` line per module that
/// has a BSS region.
pub fn bss_map_txt(entries: &[(String, Word, Word)]) -> String {
    let mut out = String::new();
    for (name, base, size) in entries {
        out.push_str(&format!("{name}: [{base},{})  size={size}\n", base + size));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_map_lists_segments_sorted_and_gaps_between_them() {
        let segs = vec![
            Segment { start: 100, end: 110, kind: "code", name: "shell".to_string() },
            Segment { start: 0, end: 10, kind: "code", name: "echon".to_string() },
        ];
        let text = memory_map_txt(&segs);
        let echon_pos = text.find("echon").unwrap();
        let shell_pos = text.find("shell").unwrap();
        assert!(echon_pos < shell_pos);
        assert!(text.contains("[10,100)  words=90  (free)"));
    }

    #[test]
    fn free_gaps_txt_is_machine_readable() {
        let segs = vec![
            Segment { start: 0, end: 10, kind: "code", name: "a".to_string() },
            Segment { start: 20, end: 30, kind: "code", name: "b".to_string() },
        ];
        assert_eq!(free_gaps_txt(&segs), "10,20\n");
    }

    #[test]
    fn bss_map_lists_each_module_region() {
        let text = bss_map_txt(&[("shell".to_string(), 9500, 512)]);
        assert_eq!(text, "shell: [9500,10012)  size=512\n");
    }
}
