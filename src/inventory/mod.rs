//! Adapter around the class-hierarchy evaluator: an external subsystem (out of scope)
//! that reads YAML class and target files and emits a fully merged parameter tree per
//! target. This module owns the evaluator's invocation contract and caches the last
//! evaluation so stages can read it without re-running a full evaluation themselves.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::{
    error::{Error, Result},
    value::Value,
};

/// Filesystem locations the evaluator reads from.
#[derive(Debug, Clone)]
pub struct InventoryPaths {
    pub classes_dir: PathBuf,
    pub targets_dir: PathBuf,
    pub ignore_class_not_found: bool,
}

/// The class-hierarchy evaluator, injected so this module is testable without invoking
/// the real evaluator.
pub trait InventoryEngine: Send + Sync {
    fn evaluate(&self, storage: &InventoryPaths) -> Result<IndexMap<String, Value>>;
}

impl InventoryEngine for Box<dyn InventoryEngine> {
    fn evaluate(&self, storage: &InventoryPaths) -> Result<IndexMap<String, Value>> {
        (**self).evaluate(storage)
    }
}

/// Holds the evaluator and the most recent per-target evaluation.
pub struct Resolver<E: InventoryEngine> {
    engine: E,
    paths: InventoryPaths,
    cache: Option<IndexMap<String, Value>>,
}

impl<E: InventoryEngine> Resolver<E> {
    pub fn new(engine: E, paths: InventoryPaths) -> Self {
        Resolver { engine, paths, cache: None }
    }

    /// Re-run the evaluator unconditionally, caching and returning its result.
    ///
    /// The pipeline calls this after every stage that writes classes, targets, or
    /// class/default symlinks, since evaluation is never incremental.
    pub fn reevaluate(&mut self) -> Result<&IndexMap<String, Value>> {
        let evaluated = self.engine.evaluate(&self.paths)?;
        self.cache = Some(evaluated);
        Ok(self.cache.as_ref().unwrap())
    }

    pub fn cached(&self) -> Option<&IndexMap<String, Value>> {
        self.cache.as_ref()
    }

    fn target(&self, name: &str) -> Result<&Value> {
        self.cache
            .as_ref()
            .and_then(|c| c.get(name))
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    /// Entries of `applications` for `target`, in declaration order.
    pub fn applications(&self, target: &str) -> Result<Vec<String>> {
        let target = self.target(target)?;
        let list = target.get_list_at("parameters.applications").unwrap_or_default();
        list.iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| Error::TypeMismatch {
                        key: "applications".into(),
                        expected: "string",
                        actual: "non-string",
                    })
            })
            .collect()
    }

    /// Read an arbitrary dotted (slash-joined) path out of `target`'s parameters.
    pub fn get_at(&self, target: &str, path: &str) -> Result<&Value> {
        self.target(target)?.get_at(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml;

    struct FakeEngine {
        targets: IndexMap<String, Value>,
    }

    impl InventoryEngine for FakeEngine {
        fn evaluate(&self, _storage: &InventoryPaths) -> Result<IndexMap<String, Value>> {
            Ok(self.targets.clone())
        }
    }

    fn paths() -> InventoryPaths {
        InventoryPaths {
            classes_dir: PathBuf::from("/work/inventory/classes"),
            targets_dir: PathBuf::from("/work/inventory/targets"),
            ignore_class_not_found: false,
        }
    }

    #[test]
    fn applications_preserves_declaration_order() {
        let yaml: serde_yaml::Value = serde_yaml::from_str(
            r#"
            parameters:
              applications:
                - argocd
                - "vault as secrets"
            "#,
        )
        .unwrap();
        let mut targets = IndexMap::new();
        targets.insert("cluster".to_string(), Value::from(yaml));
        let mut resolver = Resolver::new(FakeEngine { targets }, paths());
        resolver.reevaluate().unwrap();

        let apps = resolver.applications("cluster").unwrap();
        assert_eq!(apps, vec!["argocd".to_string(), "vault as secrets".to_string()]);
    }

    #[test]
    fn unknown_target_is_not_found() {
        let resolver = Resolver::new(
            FakeEngine { targets: IndexMap::new() },
            paths(),
        );
        assert!(resolver.target("cluster").is_err());
    }
}
