//! A robust unified-diff application engine with fuzzy matching, built to
//! tolerate the imperfect diffs LLMs produce.
//!
//! `diffapply` applies unified diffs to a codebase without relying on
//! strict line numbers: it locates the surrounding context even when the
//! diff's declared line numbers have drifted, and can recover when an
//! external patch tool gives up entirely.
//!
//! ## Pipeline
//!
//! A diff is applied in up to three stages, in order, per file:
//!
//! 1. An external `patch(1)` dry-run probe, committed if anything in it
//!    succeeds.
//! 2. `git apply` on whatever hunks Stage 1 could not place.
//! 3. An in-process fuzzy applicator — the correctness core — on whatever
//!    remains, using context matching and a confidence-scored fuzzy
//!    locator.
//!
//! ## Example
//!
//! ````rust
//! use diffapply::{apply_diff, Config};
//! use std::fs;
//! use std::path::Path;
//! use tempfile::tempdir;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dir = tempdir()?;
//! let file_path = dir.path().join("src/main.rs");
//! fs::create_dir_all(file_path.parent().unwrap())?;
//! fs::write(&file_path, "fn main() {\n    println!(\"Hello, world!\");\n}\n")?;
//!
//! let diff_text = r#"
//! ```diff
//! --- a/src/main.rs
//! +++ b/src/main.rs
//! @@ -1,3 +1,3 @@
//!  fn main() {
//! -    println!("Hello, world!");
//! +    println!("Hello, diffapply!");
//!  }
//! ```
//! "#;
//!
//! let config = Config::new(dir.path());
//! let result = apply_diff(diff_text, Path::new("src/main.rs"), &config)?;
//! assert_eq!(result.status, diffapply::ApplicationStatus::Success);
//! # Ok(())
//! # }
//! ````

mod applicator;
mod buffer;
mod config;
mod detector;
mod diff;
mod error;
mod locator;
mod result;
mod subprocess;

use std::path::Path;

use log::{debug, warn};

pub use buffer::{FileBuffer, LineEnding};
pub use config::{Config, DEFAULT_MIN_CONFIDENCE, DEFAULT_TOOL_TIMEOUT};
pub use diff::{parse, parse_diffs, Diff, FileDiff, FileMode, Hunk};
pub use error::EngineError;
pub use result::{ApplicationResult, ApplicationStatus, ErrorPayload, FailureReason, ResultDetails};

/// The public entry point (§4.5): parse `diff_text`, select the section
/// targeting `target_file_path`, and run it through the three-stage
/// applicator against `config.codebase_dir`.
///
/// Parser and path-resolution failures are the only cases that return
/// `Err`; every other outcome — including every per-hunk failure — is
/// folded into the returned [`ApplicationResult`].
pub fn apply_diff(
    diff_text: &str,
    target_file_path: &Path,
    config: &Config,
) -> Result<ApplicationResult, EngineError> {
    let files = match diff::parse_diffs(diff_text) {
        Ok(files) if !files.is_empty() => files,
        Ok(_) | Err(_) => match diff::parse(diff_text) {
            Ok(files) => files,
            Err(err) => {
                warn!("failed to parse diff: {err}");
                return Ok(ApplicationResult::fatal(err.kind()));
            }
        },
    };

    let file_diff = select_file_diff(&files, target_file_path);
    let resolved_path = applicator::resolve_target_path(target_file_path, config)?;

    debug!(
        "applying {} hunk(s) to {}",
        file_diff.hunks.len(),
        resolved_path.display()
    );

    match applicator::run(file_diff, &resolved_path, config) {
        Ok(result) => Ok(result),
        Err(EngineError::MissingFile(path)) => {
            warn!("target file not found: {}", path.display());
            Ok(ApplicationResult::fatal("missing_file"))
        }
        Err(err) => Err(err),
    }
}

/// Pick the `FileDiff` that targets `target_file_path`; if none match and
/// exactly one section was parsed, use it regardless (a caller passing the
/// path they intend to patch is the overwhelmingly common case); otherwise
/// fall back to the first section and log the ambiguity.
fn select_file_diff<'a>(files: &'a [FileDiff], target_file_path: &Path) -> &'a FileDiff {
    if let Some(matched) = files.iter().find(|f| {
        f.effective_path() == target_file_path || f.effective_path().ends_with(target_file_path)
    }) {
        return matched;
    }

    if files.len() == 1 {
        return &files[0];
    }

    warn!(
        "diff contains {} file sections but none match {}; defaulting to the first",
        files.len(),
        target_file_path.display()
    );
    &files[0]
}
