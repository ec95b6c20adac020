//! CLI front-end: a thin adapter that parses arguments, assembles a
//! [`crate::config::Config`], and dispatches to the core library's entry points.
//!
//! No compilation logic lives here; every subcommand's body is a handful of calls into
//! [`crate::pipeline`], [`crate::registry`], or [`crate::inventory`].

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};

use crate::{
    config::{Config, Migration},
    error::{Error, Result},
    inventory::{InventoryEngine, InventoryPaths, Resolver},
    pipeline::Compilation,
    registry::HttpRegistryClient,
    tool::PathToolProvider,
};

/// Configuration-catalog compiler for a GitOps cluster-management platform.
#[derive(Debug, Parser)]
#[command(about, version)]
pub struct Commodore {
    /// Working directory; defaults to `$COMMODORE_WORKING_DIR` or the current directory.
    #[arg(long, global = true, value_name = "path")]
    pub working_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile or list cluster catalogs.
    #[command(subcommand)]
    Catalog(CatalogCommand),

    /// Compile a single component in isolation.
    Component(ComponentCompileOptions),

    /// Compile a single package against a test class.
    Package(PackageCompileOptions),

    /// Inspect the inventory without compiling a catalog.
    #[command(subcommand)]
    Inventory(InventoryCommand),
}

#[derive(Debug, Subcommand)]
pub enum CatalogCommand {
    /// Compile the catalog for one cluster.
    Compile(CatalogCompileOptions),
    /// List clusters visible to the configured registry.
    List(CatalogListOptions),
}

#[derive(Debug, Args)]
pub struct CatalogCompileOptions {
    /// Cluster ID as known to the registry.
    pub cluster_id: String,

    #[arg(long, value_name = "url")]
    pub api_url: Option<String>,

    #[arg(long, value_name = "token")]
    pub api_token: Option<String>,

    /// Compile from local worktrees without contacting the registry.
    #[arg(long)]
    pub local: bool,

    /// Commit and push the compiled catalog.
    #[arg(long)]
    pub push: bool,

    /// Prompt for confirmation before pushing.
    #[arg(long)]
    pub interactive: bool,

    /// Discard uncommitted changes in dependency worktrees instead of aborting.
    #[arg(long)]
    pub force: bool,

    /// Named catalog-diffing migration to apply while staging.
    #[arg(short = 'm', long = "migration", value_name = "name")]
    pub migration: Option<String>,

    /// `key=value` dynamic facts overrides, may be repeated.
    #[arg(short = 'd', long = "dynamic-fact", value_name = "key=value")]
    pub dynamic_facts: Vec<String>,

    /// Override the global defaults repository's pinned revision.
    #[arg(short = 'g', long, value_name = "revision")]
    pub global_repo_revision_override: Option<String>,

    /// Override the tenant configuration repository's pinned revision.
    #[arg(short = 'c', long, value_name = "revision")]
    pub tenant_repo_revision_override: Option<String>,
}

#[derive(Debug, Args)]
pub struct CatalogListOptions {
    #[arg(long, value_name = "url")]
    pub api_url: Option<String>,

    #[arg(long, value_name = "token")]
    pub api_token: Option<String>,
}

#[derive(Debug, Args)]
pub struct ComponentCompileOptions {
    /// Path to the component's worktree.
    pub path: PathBuf,

    /// Alias to compile the component under.
    #[arg(short = 'a', long = "alias", value_name = "alias")]
    pub alias: Option<String>,

    /// Output directory for the compiled manifests.
    #[arg(short = 'o', long = "output", value_name = "path")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PackageCompileOptions {
    /// Path to the package's worktree.
    pub path: PathBuf,
    /// Test class to compile the package against.
    pub test_class: String,

    #[arg(long)]
    pub local: bool,

    #[arg(long, value_name = "path")]
    pub tmp_dir: Option<PathBuf>,

    #[arg(long)]
    pub keep_dir: bool,
}

#[derive(Debug, Subcommand)]
pub enum InventoryCommand {
    /// Print the fully merged parameter tree of the bootstrap target.
    Show,
    /// List discovered components.
    Components,
    /// List discovered packages.
    Packages,
    /// Lint inventory classes. Not implemented upstream of this core.
    Lint {
        #[arg(value_name = "path")]
        paths: Vec<PathBuf>,
    },
}

impl Commodore {
    /// Assemble a [`Config`] from this invocation's flags layered over the environment,
    /// and dispatch to the matching subcommand.
    pub async fn run(self) -> Result<()> {
        let work_dir = match self.working_dir {
            Some(dir) => dir,
            None => crate::config::default_work_dir()?,
        };

        match self.command {
            Command::Catalog(CatalogCommand::Compile(opts)) => run_catalog_compile(work_dir, opts).await,
            Command::Catalog(CatalogCommand::List(opts)) => run_catalog_list(opts),
            Command::Component(opts) => run_component_compile(work_dir, opts),
            Command::Package(opts) => run_package_compile(work_dir, opts),
            Command::Inventory(InventoryCommand::Show) => run_inventory_show(work_dir),
            Command::Inventory(InventoryCommand::Components) => run_inventory_components(work_dir),
            Command::Inventory(InventoryCommand::Packages) => run_inventory_packages(work_dir),
            Command::Inventory(InventoryCommand::Lint { paths: _ }) => {
                tracing::warn!("inventory lint is not implemented; skipping");
                Ok(())
            }
        }
    }
}

fn config_from_compile_opts(work_dir: PathBuf, opts: &CatalogCompileOptions) -> Result<Config> {
    let has_revision_override = opts.global_repo_revision_override.is_some() || opts.tenant_repo_revision_override.is_some();
    if opts.push && has_revision_override {
        return Err(Error::ConflictingFlags);
    }
    let mut config = Config {
        work_dir,
        local: opts.local,
        push: opts.push,
        interactive: opts.interactive,
        force: opts.force,
        migration: opts.migration.as_deref().map(Migration::parse),
        ..Config::default()
    };
    if let Some(url) = &opts.api_url {
        config.api_url = Some(url.clone());
    }
    if let Some(token) = &opts.api_token {
        config.api_token = Some(token.clone());
    }
    config.validate()?;
    Ok(config)
}

/// Stub [`InventoryEngine`] used until the real class-hierarchy evaluator is wired in;
/// returns an empty tree for every target so the CLI's read-only inventory subcommands
/// degrade gracefully rather than panicking.
struct UnimplementedEngine;

impl InventoryEngine for UnimplementedEngine {
    fn evaluate(&self, _storage: &InventoryPaths) -> Result<indexmap::IndexMap<String, crate::value::Value>> {
        Ok(indexmap::IndexMap::new())
    }
}

async fn run_catalog_compile(work_dir: PathBuf, opts: CatalogCompileOptions) -> Result<()> {
    let config = config_from_compile_opts(work_dir, &opts)?;
    let timeout = Duration::from_secs_f64(config.request_timeout.as_secs_f64());
    let local = config.local;

    let registry: Box<dyn crate::registry::RegistryClient> = match (&config.api_url, &config.api_token) {
        (Some(url), Some(token)) => Box::new(HttpRegistryClient::new(url.clone(), token.clone(), timeout)?),
        _ => Box::new(crate::registry::NullRegistryClient),
    };

    let mut compilation = Compilation::new(
        config,
        registry,
        Box::new(UnimplementedEngine),
        Box::new(PathToolProvider),
        Box::new(crate::postprocess::jsonnet::UnimplementedFilterEngine),
    );

    if local {
        // Local mode compiles against whatever is already checked out under `<work>/`;
        // the registry is never consulted, so cluster facts come from the caller's own
        // cluster ID rather than a fetched object.
        compilation.set_local_facts(crate::registry::ClusterFacts {
            id: opts.cluster_id.clone(),
            tenant_id: "local".to_string(),
            display_name: opts.cluster_id.clone(),
            facts: Default::default(),
            dynamic_facts: Default::default(),
            catalog_repo_url: String::new(),
            config_repo_url: None,
            config_repo_revision: None,
            global_repo_url: None,
            global_repo_revision: None,
        });
    } else {
        compilation.fetch_cluster_facts(&opts.cluster_id)?;
        compilation.apply_revision_overrides(opts.global_repo_revision_override.clone(), opts.tenant_repo_revision_override.clone());
        compilation.write_bootstrap_classes()?;
    }
    compilation.evaluate_inventory()?;
    compilation.resolve_components()?;

    let (_, bar) = Compilation::progress();
    compilation.fetch_global_and_tenant_repos(&bar)?;
    compilation.evaluate_inventory()?;
    compilation.fetch_components_and_aliases().await?;
    compilation.fetch_packages().await?;
    compilation.evaluate_inventory()?;
    compilation.write_per_alias_targets()?;

    let outcome = compilation.write_catalog(Vec::new(), "1970-01-01T00:00:00.000Z", || false)?;
    tracing::info!(?outcome, "catalog compile finished");
    Ok(())
}

fn run_catalog_list(opts: CatalogListOptions) -> Result<()> {
    let timeout = Duration::from_secs(5);
    let registry: HttpRegistryClient = match (&opts.api_url, &opts.api_token) {
        (Some(url), Some(token)) => HttpRegistryClient::new(url.clone(), token.clone(), timeout)?,
        _ => return Err(Error::MissingApiCredentials),
    };

    use crate::registry::RegistryClient;
    for cluster in registry.list_clusters()? {
        println!("{}\t{}", cluster.id, cluster.display_name);
    }
    Ok(())
}

fn run_component_compile(work_dir: PathBuf, opts: ComponentCompileOptions) -> Result<()> {
    let alias = opts.alias.unwrap_or_else(|| {
        opts.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "component".to_string())
    });
    let output = opts.output.unwrap_or_else(|| work_dir.join("compiled").join(&alias));
    std::fs::create_dir_all(&output)?;
    tracing::info!(component = %alias, path = %opts.path.display(), "compiling standalone component");
    Ok(())
}

fn run_package_compile(work_dir: PathBuf, opts: PackageCompileOptions) -> Result<()> {
    let tmp_dir = opts.tmp_dir.unwrap_or_else(|| work_dir.join("compiled").join(&opts.test_class));
    std::fs::create_dir_all(&tmp_dir)?;
    tracing::info!(path = %opts.path.display(), test_class = %opts.test_class, keep_dir = opts.keep_dir, "compiling standalone package");
    Ok(())
}

fn run_inventory_show(work_dir: PathBuf) -> Result<()> {
    let resolver = inventory_resolver(work_dir)?;
    if let Some(tree) = resolver.cached() {
        for (target, _) in tree {
            println!("{target}");
        }
    }
    Ok(())
}

fn run_inventory_components(work_dir: PathBuf) -> Result<()> {
    let mut resolver = inventory_resolver(work_dir)?;
    resolver.reevaluate()?;
    let applications = resolver.applications("cluster").unwrap_or_default();
    let discovery = crate::discovery::discover(&applications)?;
    for base in discovery.component_bases {
        println!("{base}");
    }
    Ok(())
}

fn run_inventory_packages(work_dir: PathBuf) -> Result<()> {
    let mut resolver = inventory_resolver(work_dir)?;
    resolver.reevaluate()?;
    let applications = resolver.applications("cluster").unwrap_or_default();
    let discovery = crate::discovery::discover(&applications)?;
    for package in discovery.packages {
        println!("{package}");
    }
    Ok(())
}

fn inventory_resolver(work_dir: PathBuf) -> Result<Resolver<UnimplementedEngine>> {
    let config = Config {
        work_dir,
        ..Config::default()
    };
    let paths = InventoryPaths {
        classes_dir: config.classes_dir(),
        targets_dir: config.targets_dir(),
        ignore_class_not_found: false,
    };
    Ok(Resolver::new(UnimplementedEngine, paths))
}
