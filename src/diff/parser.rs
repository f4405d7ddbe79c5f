//! Diff Parser & Normalizer (§4.1).
//!
//! Lexes unified-diff text into [`FileDiff`]/[`Hunk`] values, stripping the
//! noise LLMs routinely leave behind: trailing fenced-code markers, and
//! `+`/`-` lines emitted past a hunk's own declared size.

use std::path::{Path, PathBuf};

use crate::diff::types::{FileDiff, FileMode, Hunk};
use crate::error::EngineError;

/// Pre-pass cleanup (§4.1 `clean`).
///
/// Strips anything after the first triple-backtick fence marker (LLMs
/// frequently append a closing ` ``` ` and commentary after the diff), then
/// walks each hunk and drops any `+`/`-` line emitted after the header's
/// own declared `old_count`/`new_count` have already been satisfied.
pub fn clean(text: &str) -> String {
    let text = match text.find("```") {
        Some(idx) => &text[..idx],
        None => text,
    };

    let mut out: Vec<String> = Vec::new();
    let mut declared_old = 0usize;
    let mut declared_new = 0usize;
    let mut minus_seen = 0usize;
    let mut plus_seen = 0usize;
    let mut in_hunk = false;

    for line in text.lines() {
        if line.starts_with("@@") {
            let (_, old_count, _, new_count) = parse_hunk_header(line).unwrap_or((0, 1, 0, 1));
            declared_old = old_count;
            declared_new = new_count;
            minus_seen = 0;
            plus_seen = 0;
            in_hunk = true;
            out.push(line.to_string());
            continue;
        }

        if is_file_header_line(line) {
            in_hunk = false;
            out.push(line.to_string());
            continue;
        }

        if in_hunk {
            if let Some(stripped) = line.strip_prefix('-') {
                let _ = stripped;
                if minus_seen < declared_old {
                    minus_seen += 1;
                    out.push(line.to_string());
                }
                continue;
            }
            if let Some(stripped) = line.strip_prefix('+') {
                let _ = stripped;
                if plus_seen < declared_new {
                    plus_seen += 1;
                    out.push(line.to_string());
                }
                continue;
            }
            if line.starts_with(' ') || line.starts_with('\\') {
                out.push(line.to_string());
                continue;
            }
            // Any other line terminates the hunk.
            in_hunk = false;
            out.push(line.to_string());
            continue;
        }

        out.push(line.to_string());
    }

    out.join("\n")
}

fn is_file_header_line(line: &str) -> bool {
    line.starts_with("--- ")
        || line.starts_with("+++ ")
        || line.starts_with("diff --git")
        || line.starts_with("index ")
        || line.starts_with("new file mode")
        || line.starts_with("deleted file mode")
}

/// Parse one `@@ -old_start(,old_count)? +new_start(,new_count)? @@` header.
/// Omitted counts default to 1, per §4.1. Returns `None` if the line is not
/// a well-formed hunk header.
fn parse_hunk_header(line: &str) -> Option<(usize, usize, usize, usize)> {
    let mut tokens = line.split_whitespace();
    if tokens.next()? != "@@" {
        return None;
    }
    let old_tok = tokens.next()?;
    let new_tok = tokens.next()?;
    if tokens.next()? != "@@" {
        return None;
    }
    let (old_start, old_count) = parse_range(old_tok, '-')?;
    let (new_start, new_count) = parse_range(new_tok, '+')?;
    Some((old_start, old_count, new_start, new_count))
}

fn parse_range(token: &str, prefix: char) -> Option<(usize, usize)> {
    let rest = token.strip_prefix(prefix)?;
    match rest.split_once(',') {
        Some((start, count)) => Some((start.parse().ok()?, count.parse().ok()?)),
        None => Some((rest.parse().ok()?, 1)),
    }
}

/// Strip one leading `a/`/`b/` segment, then strip leading `./`/`../`
/// segments to stability (§4.1 target path resolution).
fn resolve_path(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if raw == "/dev/null" {
        return PathBuf::from("/dev/null");
    }
    let mut rest = raw.strip_prefix("a/").or_else(|| raw.strip_prefix("b/")).unwrap_or(raw);
    loop {
        if let Some(s) = rest.strip_prefix("./") {
            rest = s;
            continue;
        }
        if let Some(s) = rest.strip_prefix("../") {
            rest = s;
            continue;
        }
        break;
    }
    PathBuf::from(rest)
}

/// Detect whether a raw diff is a new-file creation (§4.1 `is_new_file`).
/// Looks for any of: a `-0,0` hunk header, a `/dev/null` source path, or an
/// explicit `new file mode` marker.
pub fn is_new_file(diff_lines: &[&str]) -> bool {
    diff_lines.iter().any(|line| {
        line.starts_with("@@ -0,0")
            || *line == "--- /dev/null"
            || line.contains("new file mode")
    })
}

struct HunkBuilder {
    number: usize,
    old_start: usize,
    new_start: usize,
    lines: Vec<String>,
    no_trailing_newline: bool,
}

impl HunkBuilder {
    fn finish(self) -> Hunk {
        Hunk {
            number: self.number,
            old_start: self.old_start,
            new_start: self.new_start,
            lines: self.lines,
            no_trailing_newline: self.no_trailing_newline,
        }
    }
}

#[derive(Default)]
struct FileBuilder {
    source: Option<PathBuf>,
    target: Option<PathBuf>,
    raw_source_line: Option<String>,
    saw_new_file_marker: bool,
    saw_deleted_file_marker: bool,
    hunks: Vec<Hunk>,
    ends_with_newline: bool,
}

impl FileBuilder {
    fn new() -> Self {
        Self {
            ends_with_newline: true,
            ..Default::default()
        }
    }

    fn has_content(&self) -> bool {
        self.source.is_some() || self.target.is_some() || !self.hunks.is_empty()
    }

    fn finish(self) -> Option<FileDiff> {
        if self.hunks.is_empty() {
            return None;
        }
        let source_path = self.source.clone().unwrap_or_else(PathBuf::new);
        let target_path = self.target.clone().unwrap_or_else(|| source_path.clone());

        let zero_hunk_header = self
            .hunks
            .first()
            .filter(|h| h.old_start == 0 && h.old_block().is_empty())
            .map(|_| "@@ -0,0 +1,1 @@");
        let new_file_marker = self.saw_new_file_marker.then_some("new file mode 100644");
        let marker_lines: Vec<&str> = [self.raw_source_line.as_deref(), new_file_marker, zero_hunk_header]
            .into_iter()
            .flatten()
            .collect();

        let mode = if is_new_file(&marker_lines) {
            FileMode::New
        } else if self.saw_deleted_file_marker || target_path == Path::new("/dev/null") {
            FileMode::Delete
        } else {
            FileMode::Modify
        };

        Some(FileDiff {
            source_path,
            target_path,
            mode,
            hunks: self.hunks,
            ends_with_newline: self.ends_with_newline,
        })
    }
}

/// Parse a single blob of unified-diff text into its `FileDiff`s (§4.1
/// `parse`). Tolerant of prose/noise outside hunks (the robustness this
/// whole engine exists for); fatal only when no hunk at all could be
/// recovered, or a hunk header is malformed.
pub fn parse(text: &str) -> Result<Vec<FileDiff>, EngineError> {
    let cleaned = clean(text);

    let mut files: Vec<FileDiff> = Vec::new();
    let mut current = FileBuilder::new();
    let mut hunk_counter = 0usize;
    let mut building: Option<HunkBuilder> = None;

    for (idx, line) in cleaned.lines().enumerate() {
        let lineno = idx + 1;

        if line.starts_with("diff --git") || line.starts_with("index ") {
            continue;
        }

        if line.starts_with("--- ") {
            if let Some(b) = building.take() {
                current.hunks.push(b.finish());
            }
            if current.has_content() {
                if let Some(fd) = std::mem::replace(&mut current, FileBuilder::new()).finish() {
                    files.push(fd);
                }
            }
            let raw = &line["--- ".len()..];
            current.source = Some(resolve_path(raw));
            current.raw_source_line = Some(line.to_string());
            continue;
        }

        if line.starts_with("+++ ") {
            let raw = &line["+++ ".len()..];
            current.target = Some(resolve_path(raw));
            continue;
        }

        if line.starts_with("new file mode") {
            current.saw_new_file_marker = true;
            continue;
        }
        if line.starts_with("deleted file mode") {
            current.saw_deleted_file_marker = true;
            continue;
        }

        if line.starts_with("@@") {
            if let Some(b) = building.take() {
                current.hunks.push(b.finish());
            }
            let (old_start, _old_count, new_start, _new_count) = parse_hunk_header(line)
                .ok_or_else(|| EngineError::Parse {
                    line: lineno,
                    message: format!("malformed hunk header: {line}"),
                })?;
            hunk_counter += 1;
            building = Some(HunkBuilder {
                number: hunk_counter,
                old_start,
                new_start,
                lines: Vec::new(),
                no_trailing_newline: false,
            });
            continue;
        }

        if let Some(b) = building.as_mut() {
            match line.chars().next() {
                Some(' ') | Some('+') | Some('-') => {
                    b.lines.push(line.to_string());
                    continue;
                }
                Some('\\') => {
                    b.no_trailing_newline = true;
                    current.ends_with_newline = false;
                    continue;
                }
                _ => {
                    current.hunks.push(building.take().unwrap().finish());
                    // Fall through: re-classify this same line as ordinary
                    // noise outside a hunk, below.
                }
            }
        }

        // Outside any hunk: tolerate blank lines and prose. This is the
        // pipeline's tolerance for LLM commentary interleaved with diff
        // text when a caller bypasses the fenced-block entry point.
    }

    if let Some(b) = building.take() {
        current.hunks.push(b.finish());
    }
    if let Some(fd) = current.finish() {
        files.push(fd);
    }

    if files.is_empty() {
        return Err(EngineError::Parse {
            line: 0,
            message: "no hunks found in diff".to_string(),
        });
    }

    Ok(files)
}

/// Parse one or more ` ```diff `/` ```patch ` fenced blocks out of
/// `content`, feeding each block through [`parse`] and merging hunks for
/// repeated sections of the same file.
pub fn parse_diffs(content: &str) -> Result<Vec<FileDiff>, EngineError> {
    let mut all: Vec<FileDiff> = Vec::new();
    let mut lines = content.lines().peekable();

    while let Some(_) = lines.by_ref().find(|l| is_fence_open(l)) {
        let mut block = String::new();
        for line in lines.by_ref() {
            if line.trim_end() == "```" {
                break;
            }
            block.push_str(line);
            block.push('\n');
        }
        if block.trim().is_empty() {
            continue;
        }
        let parsed = match parse(&block) {
            Ok(p) => p,
            Err(EngineError::Parse { .. }) => continue,
            Err(e) => return Err(e),
        };
        for file_diff in parsed {
            if let Some(existing) = all
                .iter_mut()
                .find(|f: &&mut FileDiff| f.target_path == file_diff.target_path)
            {
                existing.hunks.extend(file_diff.hunks);
                existing.ends_with_newline = file_diff.ends_with_newline;
            } else {
                all.push(file_diff);
            }
        }
    }

    Ok(all)
}

fn is_fence_open(line: &str) -> bool {
    let trimmed = line.trim_start();
    if !trimmed.starts_with("```") {
        return false;
    }
    let tag = trimmed.trim_start_matches('`');
    tag.split(|c: char| c == ',' || c.is_whitespace())
        .any(|word| word.eq_ignore_ascii_case("diff") || word.eq_ignore_ascii_case("patch"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_hunk() {
        let diff = "--- a/src/main.rs\n+++ b/src/main.rs\n@@ -1,3 +1,3 @@\n fn main() {\n-    a();\n+    b();\n }\n";
        let files = parse(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].hunks.len(), 1);
        let hunk = &files[0].hunks[0];
        assert_eq!(hunk.old_block(), vec!["fn main() {", "    a();", "}"]);
        assert_eq!(hunk.new_lines(), vec!["fn main() {", "    b();", "}"]);
    }

    #[test]
    fn recounts_over_declared_header() {
        // Header claims 5/5 lines but the body only has 3/3; the parser
        // must trust the body, not the header.
        let diff = "--- a/f\n+++ b/f\n@@ -1,5 +1,5 @@\n a\n-b\n+c\n";
        let files = parse(diff).unwrap();
        let hunk = &files[0].hunks[0];
        assert_eq!(hunk.old_count(), 2);
        assert_eq!(hunk.new_count(), 2);
    }

    #[test]
    fn clean_drops_overshoot_lines() {
        let diff = "--- a/f\n+++ b/f\n@@ -1,1 +1,1 @@\n-a\n+b\n+bogus extra line\n";
        let cleaned = clean(diff);
        assert!(!cleaned.contains("bogus extra line"));
    }

    #[test]
    fn clean_strips_trailing_fence() {
        let diff = "--- a/f\n+++ b/f\n@@ -1,1 +1,1 @@\n-a\n+b\n```\nSome commentary after.";
        let cleaned = clean(diff);
        assert!(!cleaned.contains("commentary"));
    }

    #[test]
    fn parse_diffs_extracts_fenced_block() {
        let content = "Some intro.\n```diff\n--- a/f\n+++ b/f\n@@ -1 +1 @@\n-a\n+b\n```\nTrailer.";
        let files = parse_diffs(content).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].target_path, PathBuf::from("f"));
    }

    #[test]
    fn malformed_header_is_fatal() {
        let diff = "--- a/f\n+++ b/f\n@@ nonsense @@\n-a\n+b\n";
        assert!(parse(diff).is_err());
    }

    #[test]
    fn detects_new_file_from_zero_hunk() {
        let lines = ["--- /dev/null", "+++ b/new.rs", "@@ -0,0 +1,2 @@", "+a", "+b"];
        assert!(is_new_file(&lines));
    }

    #[test]
    fn strips_dotdot_and_ab_prefixes() {
        assert_eq!(resolve_path("a/../foo/bar.rs"), PathBuf::from("foo/bar.rs"));
        assert_eq!(resolve_path("b/./baz.rs"), PathBuf::from("baz.rs"));
    }

    #[test]
    fn hunk_render_round_trips_through_reparse() {
        let diff = "--- a/src/main.rs\n+++ b/src/main.rs\n@@ -1,3 +1,3 @@\n fn main() {\n-    a();\n+    b();\n }\n";
        let hunk = &parse(diff).unwrap()[0].hunks[0];
        let rendered = hunk.render();

        let reparsed_diff = format!("--- a/src/main.rs\n+++ b/src/main.rs\n{rendered}");
        let reparsed_hunk = &parse(&reparsed_diff).unwrap()[0].hunks[0];

        assert_eq!(reparsed_hunk.lines, hunk.lines);
        assert_eq!(reparsed_hunk.old_block(), hunk.old_block());
        assert_eq!(reparsed_hunk.new_lines(), hunk.new_lines());
    }
}
