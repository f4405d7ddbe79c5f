//! Fuzzy Locator (§4.2).
//!
//! Finds where a hunk's `old_block` actually sits in the current file
//! buffer, tolerating line-number drift and minor context rot. Two phases:
//! a cheap exact-match probe near the hunk's declared position, then a
//! full-buffer fuzzy sweep scored by character-level sequence ratio
//! (mirrors Python's `difflib.SequenceMatcher.ratio()`).

use similar::TextDiff;

use crate::buffer::FileBuffer;

/// How many lines around the header's declared position the narrow-anchor
/// phase probes before falling back to a full sweep.
const ANCHOR_WINDOW: usize = 3;

/// Result of a successful locate: the 0-based starting line and the
/// confidence score that produced it (`1.0` for an anchor-phase exact hit).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub start: usize,
    pub confidence: f64,
}

/// Search `buffer` for `old_block`, starting from `approx_line` (1-based,
/// as declared by the hunk header). Returns `None` only when `old_block`
/// is empty or the buffer is shorter than it (a window never fits).
pub fn locate(buffer: &FileBuffer, old_block: &[String], approx_line: usize) -> Option<Location> {
    if old_block.is_empty() || buffer.lines.len() < old_block.len() {
        return None;
    }

    if let Some(start) = anchor_search(buffer, old_block, approx_line) {
        return Some(Location {
            start,
            confidence: 1.0,
        });
    }

    fuzzy_sweep(buffer, old_block)
}

fn anchor_search(buffer: &FileBuffer, old_block: &[String], approx_line: usize) -> Option<usize> {
    let approx0 = approx_line.saturating_sub(1);
    let lo = approx0.saturating_sub(ANCHOR_WINDOW);
    let hi = (approx0 + ANCHOR_WINDOW).min(buffer.lines.len().saturating_sub(old_block.len()));

    (lo..=hi).find(|&start| window_matches_exactly(buffer, old_block, start))
}

fn window_matches_exactly(buffer: &FileBuffer, old_block: &[String], start: usize) -> bool {
    let end = start + old_block.len();
    if end > buffer.lines.len() {
        return false;
    }
    buffer.lines[start..end]
        .iter()
        .zip(old_block.iter())
        .all(|(a, b)| a.trim_end() == b.trim_end())
}

fn fuzzy_sweep(buffer: &FileBuffer, old_block: &[String]) -> Option<Location> {
    let window_len = old_block.len();
    let last_start = buffer.lines.len() - window_len;
    let needle = trimmed_join(old_block);

    let mut best: Option<Location> = None;
    for start in 0..=last_start {
        let window = trimmed_join(&buffer.lines[start..start + window_len]);
        let ratio = TextDiff::from_chars(&needle, &window).ratio() as f64;
        if best.map_or(true, |b| ratio > b.confidence) {
            best = Some(Location {
                start,
                confidence: ratio,
            });
        }
    }
    best
}

/// Join lines right-trimmed, so trailing-whitespace noise never affects the
/// fuzzy ratio (§4.2: "right-trim both sides when comparing").
fn trimmed_join(lines: &[String]) -> String {
    lines
        .iter()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &str) -> Vec<String> {
        s.lines().map(str::to_string).collect()
    }

    #[test]
    fn anchor_phase_finds_exact_match_at_declared_line() {
        let buf = FileBuffer::from_text("a\nb\nc\nd\ne\n");
        let old_block = lines("c\nd");
        let loc = locate(&buf, &old_block, 3).unwrap();
        assert_eq!(loc.start, 2);
        assert_eq!(loc.confidence, 1.0);
    }

    #[test]
    fn anchor_phase_tolerates_line_drift() {
        let buf = FileBuffer::from_text("x\nx\nx\na\nb\nc\n");
        let old_block = lines("a\nb\nc");
        // Header claims line 1, but the real block starts at line 4.
        let loc = locate(&buf, &old_block, 1).unwrap();
        assert_eq!(loc.start, 3);
    }

    #[test]
    fn fuzzy_sweep_recovers_mismatched_whitespace() {
        let buf = FileBuffer::from_text("fn main() {\n    let x = 1;\n}\n");
        let old_block = lines("fn main() {\n  let x = 1;\n}");
        let loc = locate(&buf, &old_block, 100).unwrap();
        assert_eq!(loc.start, 0);
        assert!(loc.confidence > 0.9);
    }

    #[test]
    fn returns_none_when_block_longer_than_buffer() {
        let buf = FileBuffer::from_text("a\nb\n");
        let old_block = lines("a\nb\nc\nd");
        assert!(locate(&buf, &old_block, 1).is_none());
    }

    #[test]
    fn anchor_phase_ignores_trailing_whitespace() {
        let buf = FileBuffer::from_text("a\nb   \nc\nd\ne\n");
        let old_block = lines("c\nd");
        let loc = locate(&buf, &old_block, 3).unwrap();
        assert_eq!(loc.start, 2);
        assert_eq!(loc.confidence, 1.0);
    }

    #[test]
    fn locate_is_deterministic_across_repeated_calls() {
        let buf = FileBuffer::from_text("fn main() {\n    let x = 1;\n}\nfn main() {\n    let x = 1;\n}\n");
        let old_block = lines("fn main() {\n  let x = 1;\n}");
        let first = locate(&buf, &old_block, 1).unwrap();
        for _ in 0..10 {
            let again = locate(&buf, &old_block, 1).unwrap();
            assert_eq!(again.start, first.start);
            assert_eq!(again.confidence, first.confidence);
        }
    }
}
