//! Compilation Pipeline: the stage-by-stage state machine that turns a cluster ID into
//! a written and (optionally) pushed catalog.
//!
//! Mirrors the builder/strategy shape the Git layer uses for its own deploy flow: each
//! stage is a method on a state-holder that accumulates data as the compile progresses,
//! rather than a free function threading a dozen parameters through.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    process::Command,
    sync::Arc,
};

use auth_git2::GitAuthenticator;
use indexmap::IndexMap;
use indicatif::{MultiProgress, ProgressBar};

use crate::{
    catalog::{self, ComponentCommit, PushOutcome},
    concurrency,
    config::Config,
    discovery::{self, DependencySpec, Discovery},
    error::{Error, Result},
    git::{dependency::MultiDependency, repo::WorkingRepo},
    inventory::{InventoryEngine, InventoryPaths, Resolver},
    postprocess::{self, jsonnet::FilterEngine},
    refs,
    registry::{ClusterFacts, RegistryClient},
    target::{ComponentMetadata, TargetGenerator},
    tool::ToolProvider,
    value::Value,
};

/// Everything the compile accumulates as it moves through its stages.
pub struct Compilation {
    pub config: Config,
    pub registry: Box<dyn RegistryClient>,
    pub authenticator: Arc<GitAuthenticator>,
    pub tool_provider: Box<dyn ToolProvider>,
    pub filter_engine: Box<dyn FilterEngine>,
    resolver: Resolver<Box<dyn InventoryEngine>>,
    cluster_facts: Option<ClusterFacts>,
    discovery: Option<Discovery>,
    components: IndexMap<String, DependencySpec>,
    packages: IndexMap<String, DependencySpec>,
}

impl Compilation {
    pub fn new(config: Config, registry: Box<dyn RegistryClient>, engine: Box<dyn InventoryEngine>, tool_provider: Box<dyn ToolProvider>, filter_engine: Box<dyn FilterEngine>) -> Self {
        let paths = InventoryPaths {
            classes_dir: config.classes_dir(),
            targets_dir: config.targets_dir(),
            ignore_class_not_found: false,
        };
        Compilation {
            config,
            registry,
            authenticator: Arc::new(GitAuthenticator::default()),
            tool_provider,
            filter_engine,
            resolver: Resolver::new(engine, paths),
            cluster_facts: None,
            discovery: None,
            components: IndexMap::new(),
            packages: IndexMap::new(),
        }
    }

    /// `FetchClusterFacts`: retrieve and cache cluster facts from the registry. Skipped
    /// in local mode, where the caller supplies facts directly via
    /// [`Compilation::set_local_facts`].
    pub fn fetch_cluster_facts(&mut self, cluster_id: &str) -> Result<()> {
        let facts = self.registry.fetch_cluster(cluster_id)?;
        self.cluster_facts = Some(facts);
        Ok(())
    }

    pub fn set_local_facts(&mut self, facts: ClusterFacts) {
        self.cluster_facts = Some(facts);
    }

    /// Override the pinned global/tenant repository revisions fetched facts carry, used
    /// by the CLI's `-g`/`-c` flags to pin a specific commit without touching the
    /// registry.
    pub fn apply_revision_overrides(&mut self, global: Option<String>, tenant: Option<String>) {
        if let Some(facts) = &mut self.cluster_facts {
            if global.is_some() {
                facts.global_repo_revision = global;
            }
            if tenant.is_some() {
                facts.config_repo_revision = tenant;
            }
        }
    }

    fn facts(&self) -> Result<&ClusterFacts> {
        self.cluster_facts.as_ref().ok_or_else(|| Error::Evaluation("cluster facts not fetched yet".into()))
    }

    /// `WriteBootstrapClasses`: write `params/cluster.yml` with the cluster's facts.
    pub fn write_bootstrap_classes(&self) -> Result<()> {
        let facts = self.facts()?;
        let params_dir = self.config.classes_dir().join("params");
        std::fs::create_dir_all(&params_dir)?;
        let yaml = format!(
            "parameters:\n  cluster:\n    name: {}\n    tenant: {}\n    display_name: {:?}\n",
            facts.id, facts.tenant_id, facts.display_name
        );
        std::fs::write(params_dir.join("cluster.yml"), yaml)?;
        Ok(())
    }

    /// `EvaluateInventory`: re-run the evaluator unconditionally; callers invoke this
    /// after every stage that may have changed class/target files on disk.
    pub fn evaluate_inventory(&mut self) -> Result<()> {
        self.resolver.reevaluate()?;
        Ok(())
    }

    /// `ResolveComponents`: discovery + version binding against the bootstrap target.
    pub fn resolve_components(&mut self) -> Result<()> {
        let applications = self.resolver.applications("cluster")?;
        let discovery = discovery::discover(&applications)?;

        let parameters = self.resolver.get_at("cluster", "parameters")?.clone();
        let (components, packages) = discovery::bind_versions(&discovery, &parameters)?;

        self.discovery = Some(discovery);
        self.components = components;
        self.packages = packages;
        Ok(())
    }

    /// `FetchGlobalAndTenantRepos`: materialise the global defaults and tenant config
    /// worktrees under `inventory/classes/`.
    pub fn fetch_global_and_tenant_repos(&self, bar: &ProgressBar) -> Result<()> {
        let facts = self.facts()?;
        if let Some(global_url) = &facts.global_repo_url {
            let mut dependency = MultiDependency::new(global_url, &self.config.dependencies_dir(), &self.authenticator, bar)?;
            let target_dir = self.config.classes_dir().join("global");
            dependency.register_component("global", target_dir)?;
            dependency.checkout_component("global", facts.global_repo_revision.as_deref(), self.config.force)?;
        }
        if let Some(config_url) = &facts.config_repo_url {
            let mut dependency = MultiDependency::new(config_url, &self.config.dependencies_dir(), &self.authenticator, bar)?;
            let target_dir = self.config.classes_dir().join(&facts.tenant_id);
            dependency.register_component(&facts.tenant_id, target_dir)?;
            dependency.checkout_component(&facts.tenant_id, facts.config_repo_revision.as_deref(), self.config.force)?;
        }
        Ok(())
    }

    /// `FetchComponentsAndAliases`: checkout every component and alias worktree, a
    /// worker keyed by remote URL for the first checkout of a given URL in this
    /// compile.
    pub async fn fetch_components_and_aliases(&self) -> Result<()> {
        let discovery = self.discovery.as_ref().ok_or_else(|| Error::Evaluation("components not resolved yet".into()))?;
        let dependencies_dir = self.config.dependencies_dir();
        let authenticator = self.authenticator.clone();
        let force = self.config.force;

        let mut items = Vec::new();
        for (alias, base) in &discovery.aliases {
            let spec = self
                .components
                .get(alias)
                .or_else(|| self.components.get(base))
                .cloned()
                .ok_or_else(|| Error::MissingUrl(alias.clone()))?;
            items.push((alias.clone(), spec));
        }

        let results = concurrency::run_keyed(items, |(_, spec)| spec.url.clone(), concurrency::DEFAULT_CONCURRENCY, move |(alias, spec)| {
            let dependencies_dir = dependencies_dir.clone();
            let authenticator = authenticator.clone();
            async move {
                let bar = ProgressBar::hidden();
                let mut dependency = MultiDependency::new(&spec.url, &dependencies_dir, &authenticator, &bar)?;
                let target_dir = dependencies_dir.join(&alias);
                dependency.register_component(&alias, target_dir)?;
                dependency.checkout_component(&alias, spec.version.as_deref(), force)
            }
        })
        .await;

        results.into_iter().collect::<Result<Vec<()>>>()?;
        Ok(())
    }

    /// `FetchPackages`: checkout every package worktree, parallelised the same way as
    /// component aliases.
    pub async fn fetch_packages(&self) -> Result<()> {
        let dependencies_dir = self.config.dependencies_dir();
        let authenticator = self.authenticator.clone();
        let force = self.config.force;
        let items: Vec<(String, DependencySpec)> = self.packages.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        let results = concurrency::run_keyed(items, |(_, spec)| spec.url.clone(), concurrency::DEFAULT_CONCURRENCY, move |(name, spec)| {
            let dependencies_dir = dependencies_dir.clone();
            let authenticator = authenticator.clone();
            async move {
                let bar = ProgressBar::hidden();
                let mut dependency = MultiDependency::new(&spec.url, &dependencies_dir, &authenticator, &bar)?;
                let target_dir = dependencies_dir.join(format!("pkg.{name}"));
                dependency.register_package(&name, target_dir)?;
                dependency.checkout_package(&name, spec.version.as_deref(), force)
            }
        })
        .await;

        results.into_iter().collect::<Result<Vec<()>>>()?;
        Ok(())
    }

    /// `ValidateAliasesAndDeprecations` + `RegisterLibraryAliases` +
    /// `WritePerAliasTargets`: for every alias, validate its instantiation, symlink its
    /// class/defaults/libraries, and write its target file.
    pub fn write_per_alias_targets(&self) -> Result<()> {
        let discovery = self.discovery.as_ref().ok_or_else(|| Error::Evaluation("components not resolved yet".into()))?;
        let classes_dir = self.config.classes_dir();
        let targets_dir = self.config.targets_dir();
        let lib_dir = self.config.lib_dir();
        let generator = TargetGenerator {
            classes_dir: &classes_dir,
            targets_dir: &targets_dir,
            lib_dir: &lib_dir,
        };

        let component_names: std::collections::HashSet<String> = discovery.component_bases.iter().cloned().collect();
        let mut seen_library_aliases = HashMap::new();
        for (alias, base) in &discovery.aliases {
            let metadata = self.component_metadata(base)?;
            generator.link_class_and_defaults(base, alias, &metadata)?;
            let other_components: std::collections::HashSet<String> = component_names.iter().filter(|c| *c != base).cloned().collect();
            generator.link_library_aliases(base, &metadata, &other_components, &mut seen_library_aliases)?;

            let worktree = self.config.dependencies_dir().join(alias);
            generator.write_target(alias, &worktree, false)?;
        }

        generator.write_target("cluster", &self.config.work_dir, true)?;
        Ok(())
    }

    fn component_metadata(&self, component: &str) -> Result<ComponentMetadata> {
        let metadata_path = format!("parameters.{component}._metadata");
        let Some(parameters) = self.resolver.cached().and_then(|c| c.get("cluster")) else {
            return Ok(ComponentMetadata::default());
        };
        let Ok(node) = parameters.get_at(&metadata_path) else {
            return Ok(ComponentMetadata::default());
        };

        let multi_instance = node.get_at_opt("multi_instance")?.and_then(Value::as_bool).unwrap_or(false);
        let library_aliases = node
            .get_map_at("library_aliases")
            .ok()
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Ok(ComponentMetadata { multi_instance, library_aliases })
    }

    /// `HarvestSecretRefs`: recursively scan every evaluated target's parameters for
    /// secret references and write them under `<catalog>/refs/`.
    pub fn harvest_secret_refs(&self, vaultkv_params: &Value) -> Result<()> {
        let Some(evaluated) = self.resolver.cached() else {
            return Ok(());
        };
        let targets: Vec<&Value> = evaluated.values().collect();
        let mut backends = HashMap::new();
        backends.insert("vaultkv".to_string(), vaultkv_params.clone());
        refs::write_refs(&self.config.catalog_dir().join("refs"), &targets, &backends)?;
        Ok(())
    }

    /// `InvokeTemplater`: shell out to the templater subprocess (Kapitan) for `alias`.
    /// The templater itself is resolved from `PATH` by the OS, same as any other
    /// subprocess; `helm`/`kustomize`/`jb` lookups inside it go through
    /// [`crate::tool::ToolProvider`] instead since those are consumed by components.
    pub fn invoke_templater(&self, alias: &str) -> Result<()> {
        let status = Command::new("kapitan")
            .arg("compile")
            .arg("--target")
            .arg(alias)
            .current_dir(&self.config.work_dir)
            .status()?;
        if !status.success() {
            return Err(Error::TemplaterFailed(alias.to_string()));
        }
        Ok(())
    }

    /// `RunPostprocessFilters`: validate and run every enabled filter entry declared by
    /// `alias`'s evaluated target.
    pub fn run_postprocess_filters(&self, alias: &str, component_worktree: &Path) -> Result<()> {
        let Some(evaluated) = self.resolver.cached() else {
            return Ok(());
        };
        let Some(target_params) = evaluated.get(alias) else {
            return Ok(());
        };

        let Ok(filter_entries) = target_params.get_list_at("parameters.commodore.postprocess.filters") else {
            return Ok(());
        };

        let entries: Vec<_> = filter_entries
            .iter()
            .map(|entry| postprocess::parse_entry(entry, target_params))
            .collect::<Result<Vec<_>>>()?;

        let compiled_dir = self.config.compiled_dir().join(alias);
        postprocess::validate(&entries, component_worktree, &compiled_dir)?;
        postprocess::run(&entries, component_worktree, &compiled_dir, alias, alias, self.filter_engine.as_ref())
    }

    /// `WriteCatalog`: clone/reuse the catalog repo, repopulate `manifests/`, stage,
    /// commit, and apply the push policy.
    pub fn write_catalog(&self, component_commits: Vec<ComponentCommit>, timestamp_iso8601: &str, confirm: impl FnOnce() -> bool) -> Result<PushOutcome> {
        let facts = self.facts()?;
        let catalog_dir = self.config.catalog_dir();
        let bar = ProgressBar::hidden();

        let already_checked_out = catalog_dir.join(".git").is_dir();
        if self.config.local && !already_checked_out {
            tracing::info!("local mode with no existing catalog worktree; leaving compiled output under `compiled/`");
            return Ok(PushOutcome::NotStaged);
        }

        let repository = if already_checked_out {
            git2::Repository::open(&catalog_dir)?
        } else {
            crate::git::repo::clone_with_progress(&facts.catalog_repo_url, &catalog_dir, false, &self.authenticator, &bar)?
        };
        let repo = WorkingRepo::from_repository(repository).with_author(self.config.author_name.clone(), self.config.author_email.clone());
        if !facts.catalog_repo_url.is_empty() {
            repo.set_remote(&facts.catalog_repo_url)?;
        }

        catalog::repopulate_manifests(&catalog_dir, &self.config.compiled_dir())?;

        let diff_func = catalog::diff_func_for(&self.config.migration);
        let (_, changed) = repo.stage_all(diff_func.as_ref())?;
        if !changed {
            tracing::info!("no changes to catalog, nothing to commit");
            return Ok(PushOutcome::NotStaged);
        }

        let message = catalog::render_commit_message(&component_commits, "unknown", "unknown", timestamp_iso8601);
        catalog::apply_push_policy(&repo, &message, self.config.local, self.config.push, self.config.interactive, confirm, &self.authenticator)
    }

    /// Build a [`ProgressBar`]/[`MultiProgress`] pair for the concurrent fetch stages.
    pub fn progress() -> (MultiProgress, ProgressBar) {
        let multi = MultiProgress::new();
        let bar = multi.add(ProgressBar::new(0));
        (multi, bar)
    }
}
