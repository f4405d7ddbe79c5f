//! Engine configuration.
//!
//! The original `MIN_CONFIDENCE` global is replaced with a struct threaded
//! through the entry point (§9 design notes), constructible either from the
//! environment (for the CLI) or explicitly (for library embedding and
//! tests).

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Confidence floor below which a fuzzy locator match is refused (§4.2).
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.72;

/// Per-subprocess-invocation timeout (§5).
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime configuration for a single [`crate::apply_diff`] call.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory used as the subprocess working directory and as the
    /// base for path-traversal checks. Corresponds to `USER_CODEBASE_DIR`.
    pub codebase_dir: PathBuf,
    /// When set, Stages A and B are skipped entirely; only Stage C runs.
    /// Corresponds to `FORCE_FUZZY`.
    pub force_fuzzy: bool,
    /// Fuzzy locator confidence floor (§4.2).
    pub min_confidence: f64,
    /// Timeout applied to each Stage A/B subprocess invocation (§5).
    pub tool_timeout: Duration,
}

impl Config {
    /// Build a config pointed at `codebase_dir` with every other field at
    /// its documented default.
    pub fn new(codebase_dir: impl Into<PathBuf>) -> Self {
        Self {
            codebase_dir: codebase_dir.into(),
            force_fuzzy: false,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Read `USER_CODEBASE_DIR` and `FORCE_FUZZY` from the environment
    /// (§6). `USER_CODEBASE_DIR` is mandatory; its absence is a programmer
    /// error at the call site (typically the CLI), so this returns `None`
    /// rather than silently defaulting to the current directory.
    pub fn from_env() -> Option<Self> {
        let codebase_dir = env::var_os("USER_CODEBASE_DIR").map(PathBuf::from)?;
        let force_fuzzy = env::var("FORCE_FUZZY")
            .map(|v| is_truthy(&v))
            .unwrap_or(false);
        Some(Self {
            codebase_dir,
            force_fuzzy,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        })
    }

    pub fn codebase_dir(&self) -> &Path {
        &self.codebase_dir
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy("true"));
        assert!(is_truthy("yes"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy(""));
    }
}
