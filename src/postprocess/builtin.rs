//! The closed registry of built-in postprocess filters.
//!
//! Modelled as a tagged enum rather than a name-keyed dynamic dispatch table, so adding
//! or removing a built-in is a compile-time-checked match arm rather than a runtime
//! lookup that can silently miss.

use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinFilter {
    HelmNamespace {
        namespace: String,
        create_namespace: bool,
        exclude_objects: Vec<String>,
    },
}

impl BuiltinFilter {
    pub fn parse(name: &str, namespace: String, create_namespace: bool, exclude_objects: Vec<String>) -> Result<BuiltinFilter> {
        match name {
            "helm_namespace" => Ok(BuiltinFilter::HelmNamespace {
                namespace,
                create_namespace,
                exclude_objects,
            }),
            other => Err(Error::UnknownBuiltinFilter(other.to_string())),
        }
    }

    /// Apply this filter to every YAML document under `output_path`, rewriting the
    /// `metadata.namespace` of each Kubernetes object unless its `kind` is excluded.
    pub fn apply(&self, output_path: &Path) -> Result<()> {
        match self {
            BuiltinFilter::HelmNamespace {
                namespace,
                create_namespace,
                exclude_objects,
            } => apply_helm_namespace(output_path, namespace, *create_namespace, exclude_objects),
        }
    }
}

fn apply_helm_namespace(output_path: &Path, namespace: &str, create_namespace: bool, exclude_objects: &[String]) -> Result<()> {
    if !output_path.is_dir() {
        return Ok(());
    }

    for entry in std::fs::read_dir(output_path)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }

        let raw = std::fs::read_to_string(&path)?;
        let mut documents: Vec<serde_yaml::Value> = Vec::new();
        for document in serde_yaml::Deserializer::from_str(&raw) {
            let value = serde_yaml::Value::deserialize(document).map_err(Error::Yaml)?;
            if value.is_null() {
                continue;
            }
            documents.push(rewrite_namespace(value, namespace, exclude_objects));
        }

        if create_namespace {
            documents.insert(0, namespace_object(namespace));
        }

        let rendered: Result<Vec<String>> = documents.iter().map(|d| serde_yaml::to_string(d).map_err(Error::Yaml)).collect();
        std::fs::write(&path, rendered?.join("---\n"))?;
    }
    Ok(())
}

fn rewrite_namespace(mut value: serde_yaml::Value, namespace: &str, exclude_objects: &[String]) -> serde_yaml::Value {
    let kind = value
        .get("kind")
        .and_then(serde_yaml::Value::as_str)
        .unwrap_or_default()
        .to_string();
    if exclude_objects.iter().any(|excluded| excluded == &kind) {
        return value;
    }
    if let Some(mapping) = value.as_mapping_mut() {
        let metadata = mapping
            .entry(serde_yaml::Value::String("metadata".into()))
            .or_insert_with(|| serde_yaml::Value::Mapping(Default::default()));
        if let Some(metadata) = metadata.as_mapping_mut() {
            metadata.insert(serde_yaml::Value::String("namespace".into()), serde_yaml::Value::String(namespace.to_string()));
        }
    }
    value
}

fn namespace_object(namespace: &str) -> serde_yaml::Value {
    serde_yaml::from_str(&format!("apiVersion: v1\nkind: Namespace\nmetadata:\n  name: {namespace}\n")).unwrap()
}

use serde::Deserialize;
