//! Catalog Writer.
//!
//! Clones (or re-uses) the cluster's catalog repository, replaces its `manifests/`
//! subtree with the union of this compile's per-target output, stages the result with
//! either the default or the Kapitan 0.29→0.30 compatibility diff function, renders the
//! commit message, and applies the push policy.

use std::path::Path;

use crate::{
    config::Migration,
    error::Result,
    git::{diff::DiffFunc, WorkingRepo},
};

/// One component's contribution to the commit message's "Component commits" section.
#[derive(Debug, Clone)]
pub struct ComponentCommit {
    pub name: String,
    pub version: String,
    pub short_sha: String,
}

/// Render the commit message template.
pub fn render_commit_message(components: &[ComponentCommit], global_sha: &str, customer_sha: &str, timestamp_iso8601: &str) -> String {
    let mut message = String::from("Automated catalog update from Commodore\n\nComponent commits:\n");
    for component in components {
        message.push_str(&format!(" * {}: {} ({})\n", component.name, component.version, component.short_sha));
    }
    message.push_str("\nConfiguration commits:\n");
    message.push_str(&format!(" * global: {global_sha}\n"));
    message.push_str(&format!(" * customer: {customer_sha}\n"));
    message.push_str(&format!("\nCompilation timestamp: {timestamp_iso8601}\n"));
    message
}

/// Replace `<catalog>/manifests/` with the union of every `<compiled>/<alias>/` tree,
/// preserving the `manifests/` directory itself.
pub fn repopulate_manifests(catalog_dir: &Path, compiled_dir: &Path) -> Result<()> {
    let manifests_dir = catalog_dir.join("manifests");
    if manifests_dir.is_dir() {
        for entry in std::fs::read_dir(&manifests_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(entry.path())?;
            } else {
                std::fs::remove_file(entry.path())?;
            }
        }
    } else {
        std::fs::create_dir_all(&manifests_dir)?;
    }

    if compiled_dir.is_dir() {
        for entry in std::fs::read_dir(compiled_dir)? {
            let entry = entry?;
            let alias = entry.file_name();
            copy_dir(&entry.path(), &manifests_dir.join(alias))?;
        }
    }
    Ok(())
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}

/// Diff function that sorts Kubernetes objects by `(kind, namespace, name)` before
/// diffing and suppresses the whole diff if every resulting hunk pair is "non-semantic"
/// under the Kapitan 0.29→0.30 migration rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct Kapitan029To030Diff;

impl DiffFunc for Kapitan029To030Diff {
    fn render(&self, before: &str, after: &str, from_file: &str, to_file: &str) -> (Vec<String>, bool) {
        let before_sorted = sort_yaml_stream(before);
        let after_sorted = sort_yaml_stream(after);

        let diff = similar::TextDiff::from_lines(&before_sorted, &after_sorted);
        let mut lines = vec![format!("--- {from_file}"), format!("+++ {to_file}")];
        for change in diff.iter_all_changes() {
            let prefix = match change.tag() {
                similar::ChangeTag::Delete => "-",
                similar::ChangeTag::Insert => "+",
                similar::ChangeTag::Equal => " ",
            };
            lines.push(format!("{prefix}{}", change.value().trim_end_matches('\n')));
        }

        let suppress = should_suppress_kapitan_029_030_diff(&lines);
        (lines, suppress)
    }
}

fn sort_yaml_stream(text: &str) -> String {
    let mut documents: Vec<serde_yaml::Value> = serde_yaml::Deserializer::from_str(text)
        .filter_map(|d| serde_yaml::Value::deserialize(d).ok())
        .filter(|v| !v.is_null())
        .collect();

    documents.sort_by_key(|doc| {
        let kind = doc.get("kind").and_then(serde_yaml::Value::as_str).unwrap_or_default().to_string();
        let namespace = doc
            .get("metadata")
            .and_then(|m| m.get("namespace"))
            .and_then(serde_yaml::Value::as_str)
            .unwrap_or_default()
            .to_string();
        let name = doc
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(serde_yaml::Value::as_str)
            .unwrap_or_default()
            .to_string();
        (kind, namespace, name)
    });

    documents
        .iter()
        .map(|d| serde_yaml::to_string(d).unwrap_or_default())
        .collect::<Vec<_>>()
        .join("---\n")
}

use serde::Deserialize;

/// `true` iff this adjacent pair of diff lines (already sorted by K8s object) is a real
/// change under the Kapitan 0.29→0.30 migration, rather than one of the three changes the
/// migration is known to introduce without a behavioural change: a dropped `null`
/// document separator, or a `Tiller`→`Helm` rewrite of `managed-by`/`heritage`.
fn is_semantic_change_pair(line_a: &str, line_b: &str) -> bool {
    let a = line_a.trim_end();
    let b = line_b.trim_end();

    if a.starts_with(' ') || b.starts_with(' ') || a.starts_with("@@") || b.starts_with("@@") {
        return false;
    }

    if a == "-null" && (b == "----" || b == "---- null") {
        return false;
    }
    if a == "---- null" && b == "----" {
        return false;
    }

    if a.starts_with('-') && b.starts_with('+') {
        if a.ends_with("app.kubernetes.io/managed-by: Tiller") && b.ends_with("app.kubernetes.io/managed-by: Helm") {
            return false;
        }
        if a.ends_with("heritage: Tiller") && b.ends_with("heritage: Helm") {
            return false;
        }
    }

    true
}

/// `true` iff the whole diff should be suppressed: `diff_lines` carries a `---`/`+++`
/// header followed by the hunk body, and no adjacent pair in the body is a semantic
/// change under [`is_semantic_change_pair`].
pub fn should_suppress_kapitan_029_030_diff(diff_lines: &[String]) -> bool {
    if diff_lines.len() <= 2 {
        return true;
    }
    !diff_lines[2..].windows(2).any(|pair| is_semantic_change_pair(&pair[0], &pair[1]))
}

/// Determine which diff function to use for this compile's catalog staging.
pub fn diff_func_for(migration: &Option<Migration>) -> Box<dyn DiffFunc> {
    match migration {
        Some(Migration::Kap029To030) => Box::new(Kapitan029To030Diff),
        _ => Box::new(crate::git::UnifiedDiff),
    }
}

/// Commit and push policy outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    NotStaged,
    StagedOnly,
    Committed,
    Pushed,
}

/// Apply the push policy to a repo whose changes have already been staged.
pub fn apply_push_policy(
    repo: &WorkingRepo,
    message: &str,
    local: bool,
    push: bool,
    interactive: bool,
    confirm: impl FnOnce() -> bool,
    authenticator: &auth_git2::GitAuthenticator,
) -> Result<PushOutcome> {
    if local {
        return Ok(PushOutcome::NotStaged);
    }
    if !push {
        tracing::info!("changes staged but not committed; pass --push to commit and push");
        return Ok(PushOutcome::StagedOnly);
    }
    if interactive && !confirm() {
        tracing::info!("push declined interactively; leaving changes staged");
        return Ok(PushOutcome::StagedOnly);
    }

    repo.commit(message)?;
    repo.push(None, authenticator)?;
    Ok(PushOutcome::Pushed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_message_matches_template_shape() {
        let message = render_commit_message(
            &[ComponentCommit {
                name: "argocd".into(),
                version: "v1.0.0".into(),
                short_sha: "abc123".into(),
            }],
            "def456",
            "ghi789",
            "2026-07-26T00:00:00.000Z",
        );
        assert!(message.starts_with("Automated catalog update from Commodore"));
        assert!(message.contains(" * argocd: v1.0.0 (abc123)"));
        assert!(message.contains(" * global: def456"));
        assert!(message.contains(" * customer: ghi789"));
        assert!(message.contains("Compilation timestamp: 2026-07-26T00:00:00.000Z"));
    }

    #[test]
    fn tiller_to_helm_managed_by_is_suppressed() {
        let lines = vec![
            "--- a".to_string(),
            "+++ b".to_string(),
            "-    app.kubernetes.io/managed-by: Tiller".to_string(),
            "+    app.kubernetes.io/managed-by: Helm".to_string(),
        ];
        assert!(should_suppress_kapitan_029_030_diff(&lines));
    }

    #[test]
    fn unrelated_value_change_is_not_suppressed() {
        let lines = vec!["--- a".to_string(), "+++ b".to_string(), "-  replicas: 1".to_string(), "+  replicas: 2".to_string()];
        assert!(!should_suppress_kapitan_029_030_diff(&lines));
    }

    #[test]
    fn empty_diff_is_suppressed() {
        assert!(should_suppress_kapitan_029_030_diff(&["--- a".to_string(), "+++ b".to_string()]));
    }
}
