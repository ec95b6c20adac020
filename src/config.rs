//! Runtime configuration and working-directory layout.
//!
//! Assembled from CLI flags layered over environment variables; there is no
//! on-disk configuration file beyond the OIDC token cache ([`crate::tokencache`]).
//! Path resolution otherwise follows a `Layout`-style pattern: XDG-style
//! directories via `dirs`, expanded lazily rather than cached at startup.

use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::{Error, Result};

/// Named catalog-diffing migration. Only `Kap029To030` is implemented; any other name
/// is accepted but treated as a no-op; unrecognised migration names are not rejected
/// outright since new migrations are expected to be added over time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Migration {
    Kap029To030,
    Unknown(String),
}

impl Migration {
    pub fn parse(name: &str) -> Migration {
        match name {
            "kapitan-0.29-to-0.30" => Migration::Kap029To030,
            other => Migration::Unknown(other.to_string()),
        }
    }
}

/// Assembled configuration for one compile invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub work_dir: PathBuf,
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub github_token: Option<String>,
    pub request_timeout: Duration,
    pub local: bool,
    pub push: bool,
    pub interactive: bool,
    pub force: bool,
    pub migration: Option<Migration>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub jobs: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            work_dir: PathBuf::from("."),
            api_url: env::var("COMMODORE_API_URL").ok(),
            api_token: env::var("COMMODORE_API_TOKEN").ok(),
            github_token: env::var("COMMODORE_GITHUB_TOKEN").ok(),
            request_timeout: Duration::from_secs(5),
            local: false,
            push: false,
            interactive: false,
            force: false,
            migration: None,
            author_name: env::var("GIT_AUTHOR_NAME").ok(),
            author_email: env::var("GIT_AUTHOR_EMAIL").ok(),
            jobs: None,
        }
    }
}

impl Config {
    /// Validate flag combinations that are only ever wrong together, never individually.
    pub fn validate(&self) -> Result<()> {
        if !self.local && (self.api_url.is_none() || self.api_token.is_none()) {
            return Err(Error::MissingApiCredentials);
        }
        Ok(())
    }

    pub fn inventory_dir(&self) -> PathBuf {
        self.work_dir.join("inventory")
    }

    pub fn classes_dir(&self) -> PathBuf {
        self.inventory_dir().join("classes")
    }

    pub fn targets_dir(&self) -> PathBuf {
        self.inventory_dir().join("targets")
    }

    pub fn dependencies_dir(&self) -> PathBuf {
        self.work_dir.join("dependencies")
    }

    pub fn vendor_dir(&self) -> PathBuf {
        self.work_dir.join("vendor")
    }

    pub fn compiled_dir(&self) -> PathBuf {
        self.work_dir.join("compiled")
    }

    pub fn catalog_dir(&self) -> PathBuf {
        self.work_dir.join("catalog")
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.dependencies_dir().join("lib")
    }
}

/// Resolve the default working directory: `$COMMODORE_WORKING_DIR` if set, otherwise the
/// current directory.
pub fn default_work_dir() -> Result<PathBuf> {
    if let Ok(dir) = env::var("COMMODORE_WORKING_DIR") {
        return Ok(PathBuf::from(dir));
    }
    env::current_dir().map_err(Error::Io)
}

/// Path to the OIDC token cache file, rooted at the XDG data directory.
pub fn token_cache_path() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|p| p.join("commodore").join("token-cache.json"))
        .ok_or(Error::NoWayHome("data directory"))
}

/// Expand `$HOME`/`~`-style path fragments found in configuration values (component
/// sub-paths sourced from inventory are never expanded, but operator-supplied overrides
/// such as `--api-token-file` are).
pub fn expand_path(raw: &str) -> Result<PathBuf> {
    shellexpand::full(raw)
        .map(|expanded| PathBuf::from(expanded.into_owned()))
        .map_err(|e| Error::Usage(e.to_string()))
}

pub fn is_within(base: &Path, candidate: &Path) -> bool {
    candidate.starts_with(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealed_test::prelude::*;

    #[test]
    fn migration_parses_known_name() {
        assert_eq!(Migration::parse("kapitan-0.29-to-0.30"), Migration::Kap029To030);
    }

    #[test]
    fn migration_unknown_name_is_noop_variant() {
        assert_eq!(
            Migration::parse("ignore-yaml-formatting"),
            Migration::Unknown("ignore-yaml-formatting".into())
        );
    }

    #[test]
    fn validate_requires_api_credentials_unless_local() {
        let mut cfg = Config {
            api_url: None,
            api_token: None,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
        cfg.local = true;
        assert!(cfg.validate().is_ok());
    }

    #[sealed_test]
    fn default_work_dir_falls_back_to_cwd() {
        std::env::remove_var("COMMODORE_WORKING_DIR");
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(default_work_dir().unwrap(), cwd);
    }

    #[test]
    fn layout_paths_are_rooted_at_work_dir() {
        let cfg = Config {
            work_dir: PathBuf::from("/work"),
            ..Default::default()
        };
        assert_eq!(cfg.classes_dir(), PathBuf::from("/work/inventory/classes"));
        assert_eq!(cfg.dependencies_dir(), PathBuf::from("/work/dependencies"));
        assert_eq!(cfg.catalog_dir(), PathBuf::from("/work/catalog"));
    }

    #[test]
    fn is_within_rejects_escaping_paths() {
        let base = Path::new("/work/compiled/argocd");
        assert!(is_within(base, Path::new("/work/compiled/argocd/apps")));
        assert!(!is_within(base, Path::new("/work/compiled/other")));
    }
}
