//! Secret-Reference Builder.
//!
//! Walks every target's resolved parameters for string values shaped like
//! `?{<type>:<ref>}`, and for each unique `(type, ref)` pair emits one Kapitan secret ref
//! file under `<catalog>/refs/<ref>`: a YAML document with `data` (the base64 of the
//! literal `<secret-path>:<key>` string), `encoding: original`, `type`, and the backend's
//! connection parameters nested under its own params key. Only the `vaultkv` backend is
//! implemented; any other type is rejected rather than silently skipped.

use std::{collections::HashMap, path::Path};

use base64::{engine::general_purpose::STANDARD, Engine};
use indexmap::IndexMap;
use regex::Regex;

use crate::{
    error::{Error, Result},
    value::Value,
};

/// A secret reference found while walking a target's parameters, with every parameter
/// path it was seen at (kept for diagnostics even though only the reference itself is
/// written to disk).
#[derive(Debug, Clone)]
pub struct SecretRef {
    pub backend: String,
    pub reference: String,
    pub source_keys: Vec<String>,
}

fn ref_pattern() -> Regex {
    Regex::new(r"\?\{([a-zA-Z0-9_-]+):([^}]+)\}").expect("static pattern is valid")
}

/// Find every `?{type:ref}` occurrence in `parameters`, merging repeated occurrences of
/// the same `(type, ref)` pair into one [`SecretRef`].
pub fn find_refs(parameters: &Value) -> Vec<SecretRef> {
    let pattern = ref_pattern();
    let mut found: IndexMap<(String, String), Vec<String>> = IndexMap::new();

    parameters.walk_leaves(&mut |path, leaf| {
        if let Some(text) = leaf.as_str() {
            for capture in pattern.captures_iter(text) {
                let backend = capture[1].to_string();
                let reference = capture[2].to_string();
                found.entry((backend, reference)).or_default().push(path.to_string());
            }
        }
    });

    found
        .into_iter()
        .map(|((backend, reference), source_keys)| SecretRef {
            backend,
            reference,
            source_keys,
        })
        .collect()
}

/// Render a Kapitan secret ref file for a `vaultkv` reference: `data` is the base64 of
/// the literal `<secret-path>:<key>` string (split from `reference` on the last `/`),
/// alongside `encoding`, `type`, and `vault_params` (`backend_params`, passed through
/// verbatim rather than flattened).
fn render_vaultkv(reference: &str, backend_params: &Value) -> Result<String> {
    let (secret_path, key) = reference
        .rsplit_once('/')
        .ok_or_else(|| Error::TypeMismatch {
            key: reference.to_string(),
            expected: "path/key",
            actual: "no separator",
        })?;

    let data = STANDARD.encode(format!("{secret_path}:{key}"));

    let mut doc = serde_yaml::Mapping::new();
    doc.insert("data".into(), data.into());
    doc.insert("encoding".into(), "original".into());
    doc.insert("type".into(), "vaultkv".into());
    doc.insert("vault_params".into(), serde_yaml::Value::from(backend_params));

    serde_yaml::to_string(&serde_yaml::Value::Mapping(doc)).map_err(Error::Yaml)
}

/// Clear `<catalog>/refs/` and write one file per unique secret reference found across
/// `targets`' parameters.
pub fn write_refs(refs_dir: &Path, targets: &[&Value], backend_params_by_type: &HashMap<String, Value>) -> Result<Vec<SecretRef>> {
    if refs_dir.is_dir() {
        std::fs::remove_dir_all(refs_dir)?;
    }
    std::fs::create_dir_all(refs_dir)?;

    let mut all_refs: IndexMap<(String, String), SecretRef> = IndexMap::new();
    for parameters in targets {
        for secret_ref in find_refs(parameters) {
            all_refs
                .entry((secret_ref.backend.clone(), secret_ref.reference.clone()))
                .and_modify(|existing| existing.source_keys.extend(secret_ref.source_keys.clone()))
                .or_insert(secret_ref);
        }
    }

    for secret_ref in all_refs.values() {
        if secret_ref.backend != "vaultkv" {
            return Err(Error::UnsupportedRefType(secret_ref.backend.clone()));
        }
        let backend_params = backend_params_by_type.get(&secret_ref.backend).cloned().unwrap_or(Value::Map(Default::default()));
        let contents = render_vaultkv(&secret_ref.reference, &backend_params)?;
        std::fs::write(refs_dir.join(&secret_ref.reference), contents)?;
    }

    Ok(all_refs.into_values().collect())
}
