//! Porcelain status parsing.
//!
//! Translates `git status --porcelain` output into `(kind, path)` pairs.
//! The parser is deliberately rigid: any code outside the fixed table maps
//! to [`ChangeKind::Unknown`], which the reconciler treats as fatal rather
//! than guessing at a classification.

use crate::path::SyncPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ChangeKind {
    Untracked,
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
    TypeChange,
    Unmerged,
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusEntry {
    pub kind: ChangeKind,
    pub path: SyncPath,
}

/// Parse a complete porcelain status document, one entry per non-empty
/// line.
pub fn parse_status(output: &str) -> Vec<StatusEntry> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> StatusEntry {
    let mut tokens = line.split_whitespace();
    let kind = match tokens.next().unwrap_or("") {
        "??" => ChangeKind::Untracked,
        "A" => ChangeKind::Added,
        "M" => ChangeKind::Modified,
        "D" => ChangeKind::Deleted,
        "R" => ChangeKind::Renamed,
        "C" => ChangeKind::Copied,
        "T" => ChangeKind::TypeChange,
        "U" => ChangeKind::Unmerged,
        _ => ChangeKind::Unknown,
    };

    // Renamed lines continue with `-> new`; only the first path (the
    // pre-rename name) is captured.
    let token = tokens.next().unwrap_or(line);
    let path = match token.strip_suffix('/') {
        Some(dir) => SyncPath::dir(dir),
        None => SyncPath::file(token),
    };

    StatusEntry { kind, path }
}
