//! Jsonnet-backed postprocess filters.
//!
//! The jsonnet evaluator itself is an out-of-scope external collaborator, represented
//! identically to the Inventory Resolver's evaluator: a small injected trait so this
//! module is testable against a fake without shelling out to a real jsonnet
//! interpreter.

use std::{collections::HashMap, path::Path};

use crate::error::{Error, Result};

/// Variables passed to a jsonnet filter script invocation.
#[derive(Debug, Clone)]
pub struct FilterVars {
    pub target: String,
    pub component: String,
    pub output_path: String,
}

/// Evaluates a jsonnet filter script, returning one JSON value per top-level output key.
pub trait FilterEngine: Send + Sync {
    fn evaluate(&self, script: &Path, vars: &FilterVars) -> Result<HashMap<String, serde_json::Value>>;
}

/// Placeholder [`FilterEngine`] used until a real jsonnet interpreter is wired in;
/// errors rather than silently producing no output.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnimplementedFilterEngine;

impl FilterEngine for UnimplementedFilterEngine {
    fn evaluate(&self, script: &Path, _vars: &FilterVars) -> Result<HashMap<String, serde_json::Value>> {
        Err(Error::MissingFilterScript(script.to_path_buf()))
    }
}

/// Run a jsonnet filter located at `script` (relative to `component_worktree`), writing
/// each top-level output key to `<output_path>/<key>.yaml`.
pub fn run_jsonnet_filter(engine: &dyn FilterEngine, component_worktree: &Path, relative_script: &Path, output_path: &Path, vars: &FilterVars) -> Result<()> {
    let script = component_worktree.join(relative_script);
    if !script.is_file() {
        return Err(Error::MissingFilterScript(script));
    }

    let outputs = engine.evaluate(&script, vars)?;
    std::fs::create_dir_all(output_path)?;
    for (key, json_value) in outputs {
        let yaml = serde_yaml::to_string(&json_value).map_err(Error::Yaml)?;
        std::fs::write(output_path.join(format!("{key}.yaml")), yaml)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealed_test::prelude::*;
    use serde_json::json;

    struct FakeEngine;
    impl FilterEngine for FakeEngine {
        fn evaluate(&self, _script: &Path, _vars: &FilterVars) -> Result<HashMap<String, serde_json::Value>> {
            let mut out = HashMap::new();
            out.insert("networkpolicy".to_string(), json!({"kind": "NetworkPolicy"}));
            Ok(out)
        }
    }

    #[sealed_test]
    fn missing_script_is_rejected_before_evaluation() {
        let work = std::env::current_dir().unwrap();
        let vars = FilterVars {
            target: "argocd".into(),
            component: "argocd".into(),
            output_path: work.to_string_lossy().into_owned(),
        };
        let err = run_jsonnet_filter(&FakeEngine, &work, Path::new("filters/missing.jsonnet"), &work, &vars).unwrap_err();
        assert!(matches!(err, Error::MissingFilterScript(_)));
    }

    #[sealed_test]
    fn evaluated_output_is_written_per_key() {
        let work = std::env::current_dir().unwrap();
        std::fs::create_dir_all(work.join("filters")).unwrap();
        std::fs::write(work.join("filters/netpol.jsonnet"), "{}").unwrap();

        let vars = FilterVars {
            target: "argocd".into(),
            component: "argocd".into(),
            output_path: work.to_string_lossy().into_owned(),
        };
        let out_dir = work.join("out");
        run_jsonnet_filter(&FakeEngine, &work, Path::new("filters/netpol.jsonnet"), &out_dir, &vars).unwrap();

        assert!(out_dir.join("networkpolicy.yaml").is_file());
    }
}
