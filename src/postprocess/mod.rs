//! Postprocess Filter Runner.
//!
//! Reads a target's `parameters.commodore.postprocess.filters` list and applies each
//! enabled filter (built-in or jsonnet) to the corresponding subtree of its compiled
//! manifest directory. A validation pass runs ahead of execution so a single bad filter
//! entry is reported before any filter has mutated the tree.

pub mod builtin;
pub mod jsonnet;

use std::path::{Path, PathBuf};

use crate::{
    error::{Error, Result},
    postprocess::{builtin::BuiltinFilter, jsonnet::FilterEngine},
    value::Value,
};

#[derive(Debug, Clone, PartialEq)]
pub enum FilterKind {
    Builtin(BuiltinFilter),
    Jsonnet { script: PathBuf, args: Value },
}

#[derive(Debug, Clone)]
pub struct FilterEntry {
    pub path: PathBuf,
    pub kind: FilterKind,
    pub enabled: bool,
}

/// Resolve `enabled`, which may be a literal bool or an inventory reference such as
/// `${argocd:enable_filter}` resolved against the target's parameters.
fn resolve_enabled(raw: &Value, parameters: &Value) -> Result<bool> {
    match raw {
        Value::Bool(b) => Ok(*b),
        Value::String(reference) => {
            let path = reference.trim_start_matches("${").trim_end_matches('}').replace(':', ".");
            parameters
                .get_at(&path)
                .ok()
                .and_then(Value::as_bool)
                .ok_or_else(|| Error::TypeMismatch {
                    key: reference.clone(),
                    expected: "bool",
                    actual: "unresolved reference",
                })
        }
        other => Err(Error::TypeMismatch {
            key: "enabled".into(),
            expected: "bool or reference",
            actual: match other {
                Value::Int(_) => "int",
                Value::Float(_) => "float",
                Value::List(_) => "list",
                Value::Map(_) => "map",
                Value::Null => "null",
                _ => "unknown",
            },
        }),
    }
}

/// Parse one `filters` list entry.
pub fn parse_entry(entry: &Value, parameters: &Value) -> Result<FilterEntry> {
    let path = PathBuf::from(entry.get_string_at("path")?);
    let kind_name = entry.get_string_at("type")?;
    let filter_name = entry.get_string_at("filter")?;

    let enabled = match entry.get_at_opt("enabled")? {
        Some(raw) => resolve_enabled(raw, parameters)?,
        None => true,
    };

    let kind = match kind_name {
        "builtin" => {
            let args = entry.get_at_opt("filterargs")?.cloned().unwrap_or(Value::Map(Default::default()));
            let namespace = args.get_string_at("namespace").unwrap_or_default().to_string();
            let create_namespace = args.get_at_opt("create_namespace")?.and_then(Value::as_bool).unwrap_or(false);
            let exclude_objects = args
                .get_list_at("exclude_objects")
                .ok()
                .map(|l| l.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default();
            FilterKind::Builtin(BuiltinFilter::parse(filter_name, namespace, create_namespace, exclude_objects)?)
        }
        "jsonnet" => FilterKind::Jsonnet {
            script: PathBuf::from(filter_name),
            args: entry.get_at_opt("filterargs")?.cloned().unwrap_or(Value::Map(Default::default())),
        },
        other => return Err(Error::UnknownBuiltinFilter(other.to_string())),
    };

    Ok(FilterEntry { path, kind, enabled })
}

/// Validate that every filter entry's script/name exists and its output path stays
/// inside `compiled_root`, before any filter actually runs.
pub fn validate(entries: &[FilterEntry], component_worktree: &Path, compiled_root: &Path) -> Result<()> {
    for entry in entries {
        let output_path = compiled_root.join(&entry.path);
        if !crate::config::is_within(compiled_root, &output_path) {
            return Err(Error::FilterPathEscapesTree(output_path));
        }
        if let FilterKind::Jsonnet { script, .. } = &entry.kind {
            let full = component_worktree.join(script);
            if !full.is_file() {
                return Err(Error::MissingFilterScript(full));
            }
        }
    }
    Ok(())
}

/// Run every enabled filter entry against its compiled-tree subtree.
pub fn run(entries: &[FilterEntry], component_worktree: &Path, compiled_root: &Path, target: &str, component: &str, engine: &dyn FilterEngine) -> Result<()> {
    for entry in entries {
        if !entry.enabled {
            tracing::info!("filter for {} is disabled, skipping", entry.path.display());
            continue;
        }
        let output_path = compiled_root.join(&entry.path);
        match &entry.kind {
            FilterKind::Builtin(filter) => filter.apply(&output_path)?,
            FilterKind::Jsonnet { script, .. } => {
                let vars = jsonnet::FilterVars {
                    target: target.to_string(),
                    component: component.to_string(),
                    output_path: output_path.to_string_lossy().into_owned(),
                };
                jsonnet::run_jsonnet_filter(engine, component_worktree, script, &output_path, &vars)?;
            }
        }
    }
    Ok(())
}
