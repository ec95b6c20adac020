//! One bare clone shared by every component or package alias that depends on the same
//! remote URL, with per-alias worktrees checked out at whatever version each alias
//! requests.

use std::path::{Path, PathBuf};

use auth_git2::GitAuthenticator;
use git2::Repository;
use indexmap::IndexMap;
use indicatif::ProgressBar;

use crate::{
    error::{Error, Result},
    git::{
        repo::{clone_with_progress, WorkingRepo},
        worktree::WorktreeStore,
    },
    url,
};

/// Either a component or a package alias, for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasKind {
    Component,
    Package,
}

impl AliasKind {
    fn label(self) -> &'static str {
        match self {
            AliasKind::Component => "component",
            AliasKind::Package => "package",
        }
    }
}

/// Bare clone backing one or more component/package worktrees.
pub struct MultiDependency {
    url: String,
    bare_dir: PathBuf,
    components: IndexMap<String, PathBuf>,
    packages: IndexMap<String, PathBuf>,
}

impl MultiDependency {
    /// Open the bare clone for `repo_url` under `dependencies_dir`, cloning it first if
    /// this is the first time anything has depended on this remote.
    pub fn new(repo_url: &str, dependencies_dir: &Path, authenticator: &GitAuthenticator, bar: &ProgressBar) -> Result<Self> {
        let normalised = url::normalise(repo_url);
        let bare_dir = url::bare_clone_dir(dependencies_dir, &normalised)?;

        if !bare_dir.join("HEAD").is_file() {
            std::fs::create_dir_all(bare_dir.parent().unwrap_or(&bare_dir))?;
            clone_with_progress(&normalised, &bare_dir, true, authenticator, bar)?;
        }

        Ok(MultiDependency {
            url: normalised,
            bare_dir,
            components: IndexMap::new(),
            packages: IndexMap::new(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bare_dir(&self) -> &Path {
        &self.bare_dir
    }

    /// Fetch new refs from the remote into the shared bare clone.
    pub fn fetch(&self) -> Result<()> {
        let repository = Repository::open_bare(&self.bare_dir)?;
        let mut remote = repository.find_remote("origin")?;
        remote.fetch::<&str>(&[], None, None)?;
        Ok(())
    }

    pub fn get_component(&self, name: &str) -> Option<&Path> {
        self.components.get(name).map(PathBuf::as_path)
    }

    pub fn register_component(&mut self, name: &str, target_dir: PathBuf) -> Result<()> {
        register(&mut self.components, AliasKind::Component, name, target_dir)
    }

    pub fn deregister_component(&mut self, name: &str) -> bool {
        self.components.shift_remove(name).is_some()
    }

    /// Create or update the worktree for component alias `name` at `version`.
    pub fn checkout_component(&self, name: &str, version: Option<&str>, force: bool) -> Result<()> {
        let target = self
            .components
            .get(name)
            .ok_or_else(|| Error::Usage(format!("can't checkout unknown component '{name}'")))?;
        WorktreeStore::new(&self.bare_dir).checkout(target, version, &self.url, name, force)
    }

    pub fn get_package(&self, name: &str) -> Option<&Path> {
        self.packages.get(name).map(PathBuf::as_path)
    }

    pub fn register_package(&mut self, name: &str, target_dir: PathBuf) -> Result<()> {
        register(&mut self.packages, AliasKind::Package, name, target_dir)
    }

    pub fn deregister_package(&mut self, name: &str) -> bool {
        self.packages.shift_remove(name).is_some()
    }

    pub fn checkout_package(&self, name: &str, version: Option<&str>, force: bool) -> Result<()> {
        let target = self
            .packages
            .get(name)
            .ok_or_else(|| Error::Usage(format!("can't checkout unknown package '{name}'")))?;
        WorktreeStore::new(&self.bare_dir).checkout(target, version, &self.url, name, force)
    }

    /// Open a [`WorkingRepo`] for an already-checked-out component or package worktree,
    /// used by callers that need to inspect its tree rather than just its checked-out
    /// files on disk.
    pub fn open_worktree(path: &Path) -> Result<WorkingRepo> {
        WorkingRepo::open(path)
    }
}

fn register(map: &mut IndexMap<String, PathBuf>, kind: AliasKind, name: &str, target_dir: PathBuf) -> Result<()> {
    if map.contains_key(name) {
        return Err(Error::AlreadyRegistered {
            kind: kind.label(),
            name: name.to_string(),
        });
    }
    map.insert(name.to_string(), target_dir);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_component_rejects_duplicate_name() {
        let mut components = IndexMap::new();
        register(&mut components, AliasKind::Component, "argocd", PathBuf::from("/work/a")).unwrap();
        let err = register(&mut components, AliasKind::Component, "argocd", PathBuf::from("/work/b")).unwrap_err();
        assert!(matches!(err, Error::AlreadyRegistered { kind: "component", .. }));
    }

    #[test]
    fn deregister_reports_whether_anything_was_removed() {
        let mut packages = IndexMap::new();
        register(&mut packages, AliasKind::Package, "argocd", PathBuf::from("/work/a")).unwrap();
        assert!(!{
            let mut m = packages.clone();
            m.shift_remove("missing").is_some()
        });
        assert!(packages.shift_remove("argocd").is_some());
    }
}
