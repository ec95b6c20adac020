//! Unified-diff rendering for staged changes in a dependency or catalog repository.
//!
//! The default renderer never suppresses a diff; the catalog writer's Kapitan
//! compatibility migration substitutes a renderer that treats certain Kubernetes-object
//! reorderings as equivalent and suppresses the resulting no-op hunks (see
//! [`crate::catalog::semantic_diff`]).

use similar::{ChangeTag, TextDiff};

/// A single file-level change staged for commit.
#[derive(Debug, Clone)]
pub enum ChangeKind {
    Added { path: String },
    Deleted { path: String },
    Renamed { from: String, to: String },
    Modified { path: String, before: String, after: String },
}

/// Renders a modified file's before/after text into diff lines, returning whether the
/// diff should be suppressed entirely (treated as no change for reporting purposes).
pub trait DiffFunc: Send + Sync {
    fn render(&self, before: &str, after: &str, from_file: &str, to_file: &str) -> (Vec<String>, bool);
}

/// Plain unified diff; never suppresses anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnifiedDiff;

impl DiffFunc for UnifiedDiff {
    fn render(&self, before: &str, after: &str, from_file: &str, to_file: &str) -> (Vec<String>, bool) {
        let diff = TextDiff::from_lines(before, after);
        let mut lines = vec![format!("--- {from_file}"), format!("+++ {to_file}")];
        for change in diff.iter_all_changes() {
            let prefix = match change.tag() {
                ChangeTag::Delete => "-",
                ChangeTag::Insert => "+",
                ChangeTag::Equal => " ",
            };
            lines.push(format!("{prefix}{}", change.value().trim_end_matches('\n')));
        }
        (lines, false)
    }
}

fn colorize(line: &str) -> String {
    if line.starts_with("--- ") || line.starts_with("+++ ") || line.starts_with("@@ ") {
        format!("\x1b[33m{line}\x1b[0m")
    } else if let Some(rest) = line.strip_prefix('+') {
        format!("\x1b[32m+{rest}\x1b[0m")
    } else if let Some(rest) = line.strip_prefix('-') {
        format!("\x1b[31m-{rest}\x1b[0m")
    } else {
        line.to_string()
    }
}

/// Render a single staged change into colourised diff text, using `diff_func` for
/// modified-file hunks.
pub fn render_change(change: &ChangeKind, diff_func: &dyn DiffFunc) -> Option<String> {
    match change {
        ChangeKind::Added { path } => Some(format!("\x1b[32mAdded file {path}\x1b[0m")),
        ChangeKind::Deleted { path } => Some(format!("\x1b[31mDeleted file {path}\x1b[0m")),
        ChangeKind::Renamed { from, to } => Some(format!("\x1b[33mRenamed file {from} => {to}\x1b[0m")),
        ChangeKind::Modified { path, before, after } => {
            let (lines, suppress) = diff_func.render(before, after, path, path);
            if suppress {
                None
            } else {
                Some(lines.iter().map(|l| colorize(l)).collect::<Vec<_>>().join("\n"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unified_diff_marks_added_and_removed_lines() {
        let diff_func = UnifiedDiff;
        let change = ChangeKind::Modified {
            path: "a.yaml".into(),
            before: "a: 1\nb: 2\n".into(),
            after: "a: 1\nb: 3\n".into(),
        };
        let rendered = render_change(&change, &diff_func).unwrap();
        assert!(rendered.contains("-b: 2"));
        assert!(rendered.contains("+b: 3"));
    }

    #[test]
    fn added_file_is_reported_without_a_diff_func_call() {
        struct Panicking;
        impl DiffFunc for Panicking {
            fn render(&self, _: &str, _: &str, _: &str, _: &str) -> (Vec<String>, bool) {
                panic!("should not be called for a pure add");
            }
        }
        let change = ChangeKind::Added { path: "new.yaml".into() };
        let rendered = render_change(&change, &Panicking).unwrap();
        assert!(rendered.contains("Added file new.yaml"));
    }
}
