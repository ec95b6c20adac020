//! End-to-end exercises of [`commodore::pipeline::Compilation`] wiring several modules
//! together: inventory evaluation, discovery/version binding, target generation,
//! secret-reference harvesting, and (in the last test) a real clone/commit/push against
//! a local bare repository standing in for the catalog remote.

use std::path::Path;

use commodore::{
    catalog::ComponentCommit,
    config::Config,
    error::{Error, Result},
    inventory::{InventoryEngine, InventoryPaths},
    pipeline::Compilation,
    postprocess::jsonnet::UnimplementedFilterEngine,
    registry::{ClusterFacts, NullRegistryClient},
    tool::PathToolProvider,
    value::Value,
};
use indexmap::IndexMap;
use sealed_test::prelude::*;

use super::git_fixture::{GitFixture, GitKind};

struct FakeEngine {
    targets: IndexMap<String, Value>,
}

impl InventoryEngine for FakeEngine {
    fn evaluate(&self, _storage: &InventoryPaths) -> Result<IndexMap<String, Value>> {
        Ok(self.targets.clone())
    }
}

fn cluster_target(yaml: &str) -> IndexMap<String, Value> {
    let parsed: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
    let mut targets = IndexMap::new();
    targets.insert("cluster".to_string(), Value::from(parsed));
    targets
}

fn local_facts(catalog_repo_url: impl Into<String>) -> ClusterFacts {
    ClusterFacts {
        id: "c-test".into(),
        tenant_id: "t-test".into(),
        display_name: "Test Cluster".into(),
        facts: Default::default(),
        dynamic_facts: Default::default(),
        catalog_repo_url: catalog_repo_url.into(),
        config_repo_url: None,
        config_repo_revision: None,
        global_repo_url: None,
        global_repo_revision: None,
    }
}

fn compilation(work_dir: &Path, targets: IndexMap<String, Value>, local: bool) -> Compilation {
    let config = Config {
        work_dir: work_dir.to_path_buf(),
        local,
        ..Default::default()
    };
    Compilation::new(
        config,
        Box::new(NullRegistryClient),
        Box::new(FakeEngine { targets }),
        Box::new(PathToolProvider),
        Box::new(UnimplementedFilterEngine),
    )
}

#[sealed_test]
fn identity_alias_compiles_targets_and_harvests_secret_refs() {
    let work = std::env::current_dir().unwrap();
    let targets = cluster_target(
        r#"
        parameters:
          applications:
            - argocd
          components:
            argocd:
              url: https://example.invalid/argocd.git
              version: v1.0.0
          argocd:
            admin_password: "?{vaultkv:argocd/admin_password}"
        "#,
    );

    let mut compilation = compilation(&work, targets, true);
    compilation.set_local_facts(local_facts(""));
    compilation.write_bootstrap_classes().unwrap();
    compilation.evaluate_inventory().unwrap();
    compilation.resolve_components().unwrap();
    compilation.write_per_alias_targets().unwrap();
    compilation.harvest_secret_refs(&Value::Map(Default::default())).unwrap();

    let cluster_yml = std::fs::read_to_string(work.join("inventory/targets/cluster.yml")).unwrap();
    assert!(!cluster_yml.contains("components.cluster"));

    let argocd_yml = std::fs::read_to_string(work.join("inventory/targets/argocd.yml")).unwrap();
    assert!(argocd_yml.contains("_instance: argocd"));
    assert!(argocd_yml.contains("- components.argocd"));

    assert!(work.join("catalog/refs/argocd/admin_password").is_file());
}

#[sealed_test]
fn multi_instance_alias_is_instantiated() {
    let work = std::env::current_dir().unwrap();
    let targets = cluster_target(
        r#"
        parameters:
          applications:
            - "vault as secrets"
          components:
            vault:
              url: https://example.invalid/vault.git
              version: v2.0.0
          vault:
            _metadata:
              multi_instance: true
        "#,
    );

    let mut compilation = compilation(&work, targets, true);
    compilation.set_local_facts(local_facts(""));
    compilation.evaluate_inventory().unwrap();
    compilation.resolve_components().unwrap();
    compilation.write_per_alias_targets().unwrap();

    let secrets_yml = std::fs::read_to_string(work.join("inventory/targets/secrets.yml")).unwrap();
    assert!(secrets_yml.contains("_instance: secrets"));
    assert!(secrets_yml.contains("- components.secrets"));

    let class_link = work.join("inventory/classes/components/secrets.yml");
    assert!(std::fs::symlink_metadata(&class_link).unwrap().file_type().is_symlink());
}

#[sealed_test]
fn alias_without_multi_instance_is_rejected() {
    let work = std::env::current_dir().unwrap();
    let targets = cluster_target(
        r#"
        parameters:
          applications:
            - "vault as secrets"
          components:
            vault:
              url: https://example.invalid/vault.git
              version: v2.0.0
        "#,
    );

    let mut compilation = compilation(&work, targets, true);
    compilation.set_local_facts(local_facts(""));
    compilation.evaluate_inventory().unwrap();
    compilation.resolve_components().unwrap();
    let err = compilation.write_per_alias_targets().unwrap_err();
    match err {
        Error::InstantiationNotSupported { component, alias } => {
            assert_eq!(component, "vault");
            assert_eq!(alias, "secrets");
        }
        other => panic!("expected InstantiationNotSupported, got {other:?}"),
    }
}

#[sealed_test]
fn write_catalog_clones_commits_and_pushes_to_a_local_remote() {
    let work = std::env::current_dir().unwrap();
    let catalog_bare = work.join("catalog.git");
    let fixture = GitFixture::new(&catalog_bare, GitKind::Bare).unwrap();
    fixture.stage_and_commit("README.md", "hello\n").unwrap();

    // Stand in for what a templater invocation plus postprocess filters would have
    // produced under `compiled/<alias>/...`.
    std::fs::create_dir_all(work.join("compiled/argocd/apps")).unwrap();
    std::fs::write(work.join("compiled/argocd/apps/argocd.yaml"), "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: argocd\n").unwrap();

    let targets = cluster_target("parameters:\n  applications: []\n");
    let mut compilation = compilation(&work, targets, false);
    compilation.set_local_facts(local_facts(catalog_bare.to_string_lossy().into_owned()));

    let outcome = compilation
        .write_catalog(
            vec![ComponentCommit {
                name: "argocd".into(),
                version: "v1.0.0".into(),
                short_sha: "abc123".into(),
            }],
            "2026-07-26T00:00:00.000Z",
            || true,
        )
        .unwrap();
    assert_eq!(outcome, commodore::catalog::PushOutcome::Pushed);

    let pushed = git2::Repository::open_bare(&catalog_bare).unwrap();
    let head = pushed.find_branch("main", git2::BranchType::Local).unwrap();
    let tree = head.get().peel_to_tree().unwrap();
    assert!(tree.get_path(Path::new("manifests/argocd/apps/argocd.yaml")).is_ok());
}
