//! Data model for a parsed diff (§3).

use std::path::PathBuf;

/// Whether a file section of a diff creates, deletes, or modifies its
/// target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    New,
    Delete,
    Modify,
}

/// A single `@@ ... @@` hunk.
///
/// The canonical storage is the ordered list of prefixed lines (`' '`,
/// `'+'`, `'-'`); `old_block` and `new_lines` are derived accessors, so
/// `old_count == len(old_block)` and `new_count == len(new_lines)` hold
/// by construction rather than by a separate bookkeeping step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// 1-based ordinal within its `FileDiff`, preserved for reporting.
    pub number: usize,
    /// 1-based starting line in the pre-image, as declared by the header.
    pub old_start: usize,
    /// 1-based starting line in the post-image, as declared by the header.
    pub new_start: usize,
    /// Raw lines, each prefixed with `' '`, `'+'`, or `'-'`.
    pub lines: Vec<String>,
    /// Set when a `\ No newline at end of file` marker followed this
    /// hunk's last line.
    pub no_trailing_newline: bool,
}

impl Hunk {
    /// Context and deletion lines, prefix stripped. This is the sequence
    /// the locator/detector search for in the file buffer.
    pub fn old_block(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter(|l| !l.starts_with('+'))
            .map(|l| l[1..].to_string())
            .collect()
    }

    /// Context and addition lines, prefix stripped. This is the sequence
    /// spliced into the file buffer.
    pub fn new_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter(|l| !l.starts_with('-'))
            .map(|l| l[1..].to_string())
            .collect()
    }

    pub fn old_count(&self) -> usize {
        self.old_block().len()
    }

    pub fn new_count(&self) -> usize {
        self.new_lines().len()
    }

    /// A hunk with only context lines carries no effective change and can
    /// always be treated as a no-op.
    pub fn has_changes(&self) -> bool {
        self.lines.iter().any(|l| l.starts_with(['+', '-']))
    }

    /// Render this hunk back into unified-diff text, header included.
    /// Used to build the reduced diffs handed to Stage B.
    pub fn render(&self) -> String {
        let mut out = format!(
            "@@ -{},{} +{},{} @@\n",
            self.old_start,
            self.old_count(),
            self.new_start,
            self.new_count()
        );
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        if self.no_trailing_newline {
            out.push_str("\\ No newline at end of file\n");
        }
        out
    }
}

/// All the changes targeting a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    pub mode: FileMode,
    pub hunks: Vec<Hunk>,
    /// Whether the post-image should end with a trailing newline.
    pub ends_with_newline: bool,
}

impl FileDiff {
    /// The path this section's changes should be applied to: the target
    /// path, unless this is a deletion, in which case the source path is
    /// the only one that named a real file.
    pub fn effective_path(&self) -> &std::path::Path {
        if self.mode == FileMode::Delete {
            &self.source_path
        } else {
            &self.target_path
        }
    }

    /// Render the hunks named by `numbers` back into a standalone unified
    /// diff, headers included. Used to hand Stage B only the hunks Stage A
    /// could not apply (§4.4).
    pub fn render_subset(&self, numbers: &[usize]) -> String {
        let mut out = String::new();
        out.push_str(&format!("--- a/{}\n", self.source_path.display()));
        out.push_str(&format!("+++ b/{}\n", self.target_path.display()));
        for hunk in self.hunks.iter().filter(|h| numbers.contains(&h.number)) {
            out.push_str(&hunk.render());
        }
        out
    }
}

/// An ordered sequence of per-file changes, as produced by the parser.
pub type Diff = Vec<FileDiff>;
