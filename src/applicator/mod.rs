//! Three-Stage Applicator (§4.4): the orchestrator tying the parser,
//! fuzzy locator, and already-applied detector together.

mod stage_a;
mod stage_b;
mod stage_c;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::buffer::FileBuffer;
use crate::config::Config;
use crate::diff::{FileDiff, FileMode, Hunk};
use crate::error::EngineError;
use crate::result::{ApplicationResult, FailureReason};

use stage_a::HunkVerdict;

/// Resolve `target_file_path` against `config.codebase_dir`, refusing any
/// path that would resolve outside it.
pub fn resolve_target_path(target_file_path: &Path, config: &Config) -> Result<PathBuf, EngineError> {
    let joined = if target_file_path.is_absolute() {
        target_file_path.to_path_buf()
    } else {
        config.codebase_dir().join(target_file_path)
    };

    let mut depth: isize = 0;
    for component in joined.components() {
        use std::path::Component;
        match component {
            Component::ParentDir => depth -= 1,
            Component::Normal(_) => depth += 1,
            _ => {}
        }
        if depth < 0 {
            return Err(EngineError::PathTraversal(target_file_path.to_path_buf()));
        }
    }

    if !target_file_path.is_absolute() {
        return Ok(joined);
    }

    if joined.starts_with(config.codebase_dir()) {
        Ok(joined)
    } else {
        Err(EngineError::PathTraversal(target_file_path.to_path_buf()))
    }
}

/// Run the full three-stage pipeline against one [`FileDiff`], writing the
/// result (if any) to `path`.
pub fn run(file_diff: &FileDiff, path: &Path, config: &Config) -> Result<ApplicationResult, EngineError> {
    let before_bytes = fs::read(path).ok();

    if before_bytes.is_none() && file_diff.mode != FileMode::New {
        return Err(EngineError::MissingFile(path.to_path_buf()));
    }

    let mut succeeded: Vec<usize> = Vec::new();
    let mut already_applied: Vec<usize> = Vec::new();
    let mut failed_reasons: Vec<(usize, FailureReason)> = Vec::new();
    let mut remaining: HashSet<usize> = file_diff.hunks.iter().map(|h| h.number).collect();

    let skip_external_tools = config.force_fuzzy || file_diff.mode == FileMode::New || before_bytes.is_none();

    if !skip_external_tools {
        let stage_a_result = stage_a::apply(file_diff, config.codebase_dir(), config.tool_timeout);

        if !stage_a_result.misordered {
            apply_verdicts(&stage_a_result.verdicts, &mut remaining, &mut succeeded, &mut already_applied);

            if !remaining.is_empty() {
                let numbers: Vec<usize> = remaining.iter().copied().collect();
                let stage_b_result =
                    stage_b::apply(file_diff, &numbers, config.codebase_dir(), config.tool_timeout);
                apply_verdicts(&stage_b_result.verdicts, &mut remaining, &mut succeeded, &mut already_applied);
            }
        }
    }

    if !remaining.is_empty() {
        let remaining_hunks: Vec<Hunk> = file_diff
            .hunks
            .iter()
            .filter(|h| remaining.contains(&h.number))
            .cloned()
            .collect();

        let mut buffer = if before_bytes.is_some() {
            FileBuffer::read(path)?
        } else {
            FileBuffer::empty()
        };

        let outcomes = stage_c::apply_all(&mut buffer, &remaining_hunks, config);
        let mut any_succeeded = false;
        for (number, outcome) in outcomes {
            match outcome {
                stage_c::HunkOutcome::Succeeded => {
                    succeeded.push(number);
                    any_succeeded = true;
                }
                stage_c::HunkOutcome::AlreadyApplied => already_applied.push(number),
                stage_c::HunkOutcome::Failed(reason) => failed_reasons.push((number, reason)),
            }
        }

        if any_succeeded {
            buffer.write(path)?;
        }
    }

    cleanup_artifacts(path);

    let after_bytes = fs::read(path).ok();
    let changes_written = before_bytes != after_bytes;
    let failed: Vec<usize> = failed_reasons.iter().map(|(n, _)| *n).collect();

    Ok(ApplicationResult::finish(
        succeeded,
        failed,
        already_applied,
        &failed_reasons,
        changes_written,
    ))
}

fn apply_verdicts(
    verdicts: &std::collections::HashMap<usize, HunkVerdict>,
    remaining: &mut HashSet<usize>,
    succeeded: &mut Vec<usize>,
    already_applied: &mut Vec<usize>,
) {
    for (&number, verdict) in verdicts {
        if !remaining.contains(&number) {
            continue;
        }
        match verdict {
            HunkVerdict::Succeeded => {
                succeeded.push(number);
                remaining.remove(&number);
            }
            HunkVerdict::AlreadyApplied => {
                already_applied.push(number);
                remaining.remove(&number);
            }
            HunkVerdict::Failed => {
                // Stays in `remaining` for Stage B, then Stage C.
            }
        }
    }
}

/// Delete any `.rej`/`.orig` artifacts the external tools left behind next
/// to `path` (§4.4 "Cleanup").
fn cleanup_artifacts(path: &Path) {
    for ext in ["rej", "orig"] {
        let candidate = path.with_extension(match path.extension() {
            Some(existing) => format!("{}.{}", existing.to_string_lossy(), ext),
            None => ext.to_string(),
        });
        let _ = fs::remove_file(candidate);

        let mut with_suffix = path.as_os_str().to_os_string();
        with_suffix.push(format!(".{ext}"));
        let _ = fs::remove_file(PathBuf::from(with_suffix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_dir_escape() {
        let config = Config::new("/base");
        let err = resolve_target_path(Path::new("../../etc/passwd"), &config).unwrap_err();
        assert!(matches!(err, EngineError::PathTraversal(_)));
    }

    #[test]
    fn accepts_relative_path_within_root() {
        let config = Config::new("/base");
        let resolved = resolve_target_path(Path::new("src/main.rs"), &config).unwrap();
        assert_eq!(resolved, PathBuf::from("/base/src/main.rs"));
    }
}
