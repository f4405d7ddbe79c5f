//! Stage B: VCS-style apply tool, run only on hunks Stage A left `failed`
//! (§4.4).

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use tempfile::NamedTempFile;

use crate::applicator::stage_a::HunkVerdict;
use crate::diff::FileDiff;
use crate::subprocess::run_captured;

pub struct StageBResult {
    pub verdicts: HashMap<usize, HunkVerdict>,
}

const GIT_APPLY_TOLERANCE_FLAGS: &[&str] = &[
    "--whitespace=nowarn",
    "--ignore-whitespace",
    "--ignore-space-change",
    "--verbose",
];

/// Attempt `file_diff`'s hunks named by `numbers` via `git apply`. A
/// `--check` dry-run decides between "already applied" and "needs a real
/// attempt"; a real invocation with `--reject` follows when needed.
pub fn apply(file_diff: &FileDiff, numbers: &[usize], cwd: &Path, timeout: Duration) -> StageBResult {
    if numbers.is_empty() {
        return StageBResult {
            verdicts: HashMap::new(),
        };
    }

    let text = file_diff.render_subset(numbers);
    let Some(patch_file) = write_temp_patch(&text) else {
        return StageBResult {
            verdicts: HashMap::new(),
        };
    };
    let patch_path = patch_file.path().to_string_lossy().into_owned();

    let mut check_args: Vec<&str> = vec!["apply", "--check"];
    check_args.extend_from_slice(GIT_APPLY_TOLERANCE_FLAGS);
    check_args.push(&patch_path);
    let check = run_captured("git", &check_args, cwd, None, timeout);

    let Ok(check) = check else {
        return StageBResult {
            verdicts: HashMap::new(),
        };
    };
    if check.timed_out {
        return StageBResult {
            verdicts: HashMap::new(),
        };
    }

    if !check.stderr.to_lowercase().contains("patch does not apply") {
        // stderr lacks the "does not apply" marker: the VCS tool considers
        // these hunks no-ops already present in the file.
        return StageBResult {
            verdicts: numbers
                .iter()
                .map(|&n| (n, HunkVerdict::AlreadyApplied))
                .collect(),
        };
    }

    let mut apply_args: Vec<&str> = vec!["apply", "--reject"];
    apply_args.extend_from_slice(GIT_APPLY_TOLERANCE_FLAGS);
    apply_args.push(&patch_path);
    let apply = run_captured("git", &apply_args, cwd, None, timeout);
    let verdict = match apply {
        Ok(out) if out.success() => HunkVerdict::Succeeded,
        Ok(out) if out.stderr.to_lowercase().contains("already applied") => {
            HunkVerdict::AlreadyApplied
        }
        _ => HunkVerdict::Failed,
    };
    StageBResult {
        verdicts: numbers.iter().map(|&n| (n, verdict)).collect(),
    }
}

fn write_temp_patch(text: &str) -> Option<NamedTempFile> {
    let mut file = NamedTempFile::new().ok()?;
    file.write_all(text.as_bytes()).ok()?;
    file.flush().ok()?;
    Some(file)
}
