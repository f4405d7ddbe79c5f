//! Diff data model and parser (§3, §4.1).

mod parser;
mod types;

pub use parser::{clean, is_new_file, parse, parse_diffs};
pub use types::{Diff, FileDiff, FileMode, Hunk};
