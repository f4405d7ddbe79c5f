//! Stage A: external textual `patch` tool (§4.4).

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::diff::FileDiff;
use crate::subprocess::run_captured;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HunkVerdict {
    Succeeded,
    Failed,
    AlreadyApplied,
}

/// Outcome of one Stage A attempt.
pub struct StageAResult {
    pub verdicts: HashMap<usize, HunkVerdict>,
    /// Set when stderr carried the "misordered hunks" signal; the caller
    /// should skip straight to Stage C with the full diff.
    pub misordered: bool,
}

const PATCH_ARGS_DRY_RUN: &[&str] = &[
    "--strip=1",
    "--forward",
    "--no-backup-if-mismatch",
    "--reject-file=-",
    "--batch",
    "--ignore-whitespace",
    "--verbose",
    "--dry-run",
];

const PATCH_ARGS_COMMIT: &[&str] = &[
    "--strip=1",
    "--forward",
    "--no-backup-if-mismatch",
    "--reject-file=-",
    "--batch",
    "--ignore-whitespace",
    "--verbose",
];

/// Try to apply every hunk of `file_diff` via the `patch(1)` CLI. Dry-run
/// first; if anything succeeded, re-invoke for real.
pub fn apply(file_diff: &FileDiff, cwd: &Path, timeout: Duration) -> StageAResult {
    let text = file_diff.render_subset(&all_hunk_numbers(file_diff));

    let dry_run = match run_captured("patch", PATCH_ARGS_DRY_RUN, cwd, Some(text.as_bytes()), timeout) {
        Ok(out) => out,
        Err(_) => {
            return StageAResult {
                verdicts: HashMap::new(),
                misordered: false,
            }
        }
    };

    if dry_run.timed_out {
        return StageAResult {
            verdicts: HashMap::new(),
            misordered: false,
        };
    }

    let misordered = dry_run.stderr.to_lowercase().contains("misordered hunks");
    if misordered {
        return StageAResult {
            verdicts: HashMap::new(),
            misordered: true,
        };
    }

    let mut verdicts = parse_patch_output(&dry_run.stdout);
    let any_succeeded = verdicts
        .values()
        .any(|v| matches!(v, HunkVerdict::Succeeded));

    if any_succeeded {
        if let Ok(commit) = run_captured("patch", PATCH_ARGS_COMMIT, cwd, Some(text.as_bytes()), timeout) {
            if !commit.timed_out {
                verdicts = parse_patch_output(&commit.stdout);
            }
        }
    }

    StageAResult {
        verdicts,
        misordered: false,
    }
}

fn all_hunk_numbers(file_diff: &FileDiff) -> Vec<usize> {
    file_diff.hunks.iter().map(|h| h.number).collect()
}

/// Parse `patch`'s verbose stdout for `Hunk #N succeeded at L` /
/// `Hunk #N failed` lines, tolerating the "succeeded at N with fuzz M"
/// variant, and classifying "Reversed (or previously applied)" as
/// already-applied rather than success (§9 design notes).
fn parse_patch_output(stdout: &str) -> HashMap<usize, HunkVerdict> {
    let mut verdicts = HashMap::new();

    for line in stdout.lines() {
        let Some(rest) = line.trim_start().strip_prefix("Hunk #") else {
            continue;
        };
        let mut tokens = rest.split_whitespace();
        let Some(number) = tokens.next().and_then(|t| t.parse::<usize>().ok()) else {
            continue;
        };

        let verdict = if line.contains("Reversed (or previously applied)") {
            HunkVerdict::AlreadyApplied
        } else if line.contains("succeeded") {
            HunkVerdict::Succeeded
        } else if line.contains("failed") {
            HunkVerdict::Failed
        } else {
            continue;
        };

        verdicts.insert(number, verdict);
    }

    verdicts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_succeeded_and_failed_lines() {
        let stdout = "Hunking file foo.rs\nHunk #1 succeeded at 10.\nHunk #2 failed at 40.\n";
        let verdicts = parse_patch_output(stdout);
        assert_eq!(verdicts.get(&1), Some(&HunkVerdict::Succeeded));
        assert_eq!(verdicts.get(&2), Some(&HunkVerdict::Failed));
    }

    #[test]
    fn tolerates_fuzz_wording_variant() {
        let stdout = "Hunk #3 succeeded at 20 with fuzz 2.\n";
        let verdicts = parse_patch_output(stdout);
        assert_eq!(verdicts.get(&3), Some(&HunkVerdict::Succeeded));
    }

    #[test]
    fn classifies_reversed_as_already_applied() {
        let stdout = "Hunk #1 succeeded at 10 (offset 2 lines).\nHunk #2 FAILED -- reason...\nHunk #1 Reversed (or previously applied) at 10.\n";
        // Last matching line wins, mirroring patch's own re-reporting.
        let verdicts = parse_patch_output(stdout);
        assert_eq!(verdicts.get(&1), Some(&HunkVerdict::AlreadyApplied));
    }
}
