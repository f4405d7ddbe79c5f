//! Stage C: in-process fuzzy applicator (§4.4) — the correctness core that
//! runs on whatever hunks Stages A and B left `failed`.

use std::collections::HashSet;

use crate::buffer::FileBuffer;
use crate::config::Config;
use crate::detector::is_applied;
use crate::diff::Hunk;
use crate::locator::locate;
use crate::result::FailureReason;

/// How close two hunks' declared starting lines must be to be clustered
/// and applied as one atomic, reverse-order pass (§4.4).
const CLUSTER_DISTANCE: usize = 10;

pub enum HunkOutcome {
    Succeeded,
    AlreadyApplied,
    Failed(FailureReason),
}

/// Apply every hunk in `hunks` (assumed sorted by `number`, i.e. original
/// diff order) against `buffer` in place, clustering nearby hunks into
/// reverse-order atomic passes.
///
/// Returns the outcome of each hunk, keyed by hunk number.
pub fn apply_all(buffer: &mut FileBuffer, hunks: &[Hunk], config: &Config) -> Vec<(usize, HunkOutcome)> {
    let mut outcomes = Vec::with_capacity(hunks.len());
    let mut seen: HashSet<(Vec<String>, Vec<String>)> = HashSet::new();
    let mut cumulative_offset: isize = 0;

    for cluster in cluster_hunks(hunks) {
        let base_offset = cumulative_offset;
        let mut cluster_delta: isize = 0;

        // Largest `old_start` first so earlier splices never invalidate a
        // not-yet-processed hunk's position.
        let mut ordered: Vec<&Hunk> = cluster.iter().collect();
        ordered.sort_by(|a, b| b.old_start.cmp(&a.old_start));

        for hunk in ordered {
            let old_block = hunk.old_block();
            let new_lines = hunk.new_lines();
            let key = (old_block.clone(), new_lines.clone());

            if seen.contains(&key) {
                outcomes.push((hunk.number, HunkOutcome::AlreadyApplied));
                continue;
            }

            let outcome = apply_one(buffer, &old_block, &new_lines, hunk.old_start, base_offset, config);
            if !matches!(outcome, HunkOutcome::Failed(_)) {
                seen.insert(key);
            }
            if let HunkOutcome::Succeeded = &outcome {
                cluster_delta += new_lines.len() as isize - old_block.len() as isize;
            }
            outcomes.push((hunk.number, outcome));
        }

        cumulative_offset = base_offset + cluster_delta;
    }

    outcomes.sort_by_key(|(n, _)| *n);
    outcomes
}

fn apply_one(
    buffer: &mut FileBuffer,
    old_block: &[String],
    new_lines: &[String],
    old_start: usize,
    cumulative_offset: isize,
    config: &Config,
) -> HunkOutcome {
    let candidate = (old_start as isize - 1 + cumulative_offset)
        .max(0)
        .min(buffer.lines.len() as isize) as usize;

    if whole_file_already_applied(buffer, old_block, new_lines) {
        return HunkOutcome::AlreadyApplied;
    }

    let pos = if window_matches(buffer, old_block, candidate) {
        candidate
    } else {
        match locate(buffer, old_block, candidate + 1) {
            Some(loc) if loc.confidence > config.min_confidence => loc.start,
            Some(loc) => {
                return HunkOutcome::Failed(FailureReason::LowConfidence {
                    confidence: loc.confidence,
                })
            }
            None => return HunkOutcome::Failed(FailureReason::NotFound),
        }
    };

    if is_applied(buffer, old_block, new_lines, pos) {
        return HunkOutcome::AlreadyApplied;
    }

    let actual_old_count = old_block.len().min(buffer.lines.len() - pos);
    let end = pos + actual_old_count;
    buffer.lines.splice(pos..end, new_lines.iter().cloned());

    HunkOutcome::Succeeded
}

fn window_matches(buffer: &FileBuffer, old_block: &[String], pos: usize) -> bool {
    let end = pos + old_block.len();
    end <= buffer.lines.len() && buffer.lines[pos..end] == old_block[..]
}

/// Scan every position in the buffer; already-applied if the detector
/// agrees at some position *and* the window there is exactly `new_lines`.
fn whole_file_already_applied(buffer: &FileBuffer, old_block: &[String], new_lines: &[String]) -> bool {
    if new_lines.is_empty() || buffer.lines.len() < new_lines.len() {
        return false;
    }
    let last_start = buffer.lines.len() - new_lines.len();
    (0..=last_start).any(|pos| {
        buffer.lines[pos..pos + new_lines.len()] == new_lines[..] && is_applied(buffer, old_block, new_lines, pos)
    })
}

fn cluster_hunks(hunks: &[Hunk]) -> Vec<Vec<Hunk>> {
    let mut sorted: Vec<Hunk> = hunks.to_vec();
    sorted.sort_by_key(|h| h.old_start);

    let mut clusters: Vec<Vec<Hunk>> = Vec::new();
    for hunk in sorted {
        match clusters.last_mut() {
            Some(last)
                if last
                    .last()
                    .is_some_and(|prev| hunk.old_start.saturating_sub(prev.old_start) <= CLUSTER_DISTANCE) =>
            {
                last.push(hunk);
            }
            _ => clusters.push(vec![hunk]),
        }
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::Hunk;

    fn hunk(number: usize, old_start: usize, new_start: usize, lines: &[&str]) -> Hunk {
        Hunk {
            number,
            old_start,
            new_start,
            lines: lines.iter().map(|s| s.to_string()).collect(),
            no_trailing_newline: false,
        }
    }

    #[test]
    fn applies_a_clean_single_hunk() {
        let mut buffer = FileBuffer::from_text("def hello():\n    print('Hello')\n");
        let h = hunk(1, 1, 1, &[" def hello():", "     print('Hello')", "+    print('World')"]);
        let config = Config::new(".");
        let outcomes = apply_all(&mut buffer, &[h], &config);
        assert!(matches!(outcomes[0].1, HunkOutcome::Succeeded));
        assert_eq!(buffer.lines, vec!["def hello():", "    print('Hello')", "    print('World')"]);
    }

    #[test]
    fn detects_already_applied_whole_file_scan() {
        let mut buffer = FileBuffer::from_text("def hello():\n    print('Hello')\n    print('World')\n");
        let h = hunk(1, 1, 1, &[" def hello():", "     print('Hello')", "+    print('World')"]);
        let config = Config::new(".");
        let outcomes = apply_all(&mut buffer, &[h], &config);
        assert!(matches!(outcomes[0].1, HunkOutcome::AlreadyApplied));
    }

    #[test]
    fn fails_with_low_confidence_when_no_match_exists() {
        let mut buffer = FileBuffer::from_text("totally unrelated content\nmore lines here\n");
        let h = hunk(1, 1, 1, &[" def hello():", "-    print('Hello')", "+    print('World')"]);
        let config = Config::new(".");
        let outcomes = apply_all(&mut buffer, &[h], &config);
        assert!(matches!(outcomes[0].1, HunkOutcome::Failed(_)));
    }

    #[test]
    fn clusters_and_applies_nearby_hunks_in_reverse_order() {
        let mut buffer = FileBuffer::from_text(
            "line1\nline2\nline3\nline4\nline5\nline6\nline7\nline8\nline9\nline10\n",
        );
        let h1 = hunk(1, 2, 2, &["-line2", "+line2-new"]);
        let h2 = hunk(2, 6, 6, &["-line6", "+line6-new"]);
        let config = Config::new(".");
        let outcomes = apply_all(&mut buffer, &[h1, h2], &config);
        assert!(outcomes.iter().all(|(_, o)| matches!(o, HunkOutcome::Succeeded)));
        assert_eq!(buffer.lines[1], "line2-new");
        assert_eq!(buffer.lines[5], "line6-new");
    }
}
