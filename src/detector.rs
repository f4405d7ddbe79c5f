//! Already-Applied Detector (§4.3).
//!
//! Before spending a hunk's one shot at the locator, check whether the
//! file already reads as the hunk's post-image at the given position —
//! the common case when a caller replays a diff the codebase already has.

use similar::TextDiff;

use crate::buffer::FileBuffer;

/// Fuzzy-ratio floor for the backstop check, once the line-by-line pass
/// finds a mismatch rather than a clean already-applied or pending read.
const ALREADY_APPLIED_RATIO: f64 = 0.98;

/// Does the file, read at `pos` (0-based), already contain this hunk's
/// post-image rather than its pre-image?
///
/// Walks every index in the longer of `old_block`/`new_lines`: a file line
/// equal to the new line counts as already-applied, one equal to the old
/// line counts as pending (not yet applied), and anything else is an
/// outright mismatch — handled only by the fuzzy-ratio backstop below.
pub fn is_applied(buffer: &FileBuffer, old_block: &[String], new_lines: &[String], pos: usize) -> bool {
    let span = old_block.len().max(new_lines.len());
    if pos + span > buffer.lines.len() {
        return false;
    }
    let mut pending = false;

    for i in 0..span {
        let file_line = buffer.lines.get(pos + i).map(|s| s.trim_end());
        let old_line = old_block.get(i).map(|s| s.trim_end());
        let new_line = new_lines.get(i).map(|s| s.trim_end());

        match file_line {
            Some(fl) if Some(fl) == new_line => continue,
            Some(fl) if Some(fl) == old_line => pending = true,
            _ => return fuzzy_backstop(buffer, new_lines, pos),
        }
    }

    !pending
}

fn fuzzy_backstop(buffer: &FileBuffer, new_lines: &[String], pos: usize) -> bool {
    if new_lines.is_empty() {
        return false;
    }
    let end = (pos + new_lines.len()).min(buffer.lines.len());
    if end <= pos {
        return false;
    }
    let window = buffer.lines[pos..end].join("\n");
    let needle = new_lines.join("\n");
    TextDiff::from_chars(&needle, &window).ratio() as f64 >= ALREADY_APPLIED_RATIO
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &str) -> Vec<String> {
        s.lines().map(str::to_string).collect()
    }

    #[test]
    fn detects_already_applied_exact() {
        let buf = FileBuffer::from_text("fn main() {\n    b();\n}\n");
        let old_block = lines("fn main() {\n    a();\n}");
        let new_lines = lines("fn main() {\n    b();\n}");
        assert!(is_applied(&buf, &old_block, &new_lines, 0));
    }

    #[test]
    fn detects_pending_not_applied() {
        let buf = FileBuffer::from_text("fn main() {\n    a();\n}\n");
        let old_block = lines("fn main() {\n    a();\n}");
        let new_lines = lines("fn main() {\n    b();\n}");
        assert!(!is_applied(&buf, &old_block, &new_lines, 0));
    }

    #[test]
    fn out_of_bounds_position_is_not_applied() {
        let buf = FileBuffer::from_text("fn main() {\n");
        let old_block = lines("fn main() {\n    a();\n}");
        let new_lines = lines("fn main() {\n    b();\n}");
        assert!(!is_applied(&buf, &old_block, &new_lines, 0));
    }

    #[test]
    fn trailing_whitespace_does_not_break_match() {
        let buf = FileBuffer::from_text("fn main() {  \n    b();\n}\n");
        let old_block = lines("fn main() {\n    a();\n}");
        let new_lines = lines("fn main() {\n    b();\n}");
        assert!(is_applied(&buf, &old_block, &new_lines, 0));
    }

    #[test]
    fn mismatch_falls_back_to_fuzzy_ratio() {
        let buf = FileBuffer::from_text("fn main() {\n    b();\n}\n");
        let old_block = lines("fn main() {\n    a();\n}");
        let new_lines = lines("fn main() {\n    b();\n}");
        // Perturb position so the literal line-by-line walk mismatches
        // outright, exercising the fuzzy backstop.
        let buf2 = FileBuffer::from_text("// noise\nfn main() {\n    b();\n}\n");
        assert!(!is_applied(&buf2, &old_block, &new_lines, 0));
        assert!(is_applied(&buf, &old_block, &new_lines, 0));
    }
}
