//! Worktree checkout policy for dependency and package clones.
//!
//! `git2` has no usable worktree API, so worktree management shells out to the `git`
//! binary directly, the same way the bare-alias deployment shells out for sparse
//! checkout. Every dependency and package shares one bare clone per remote URL; each
//! alias that needs a particular version gets its own worktree under that bare clone.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Command,
};

use tracing::{debug, info, instrument};

use crate::error::{Error, Result};

fn syscall(cmd: impl AsRef<OsStr>, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> Result<String> {
    let cmd = cmd.as_ref();
    let output = Command::new(cmd).args(args).output()?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if !output.status.success() {
        return Err(Error::Syscall {
            program: cmd.to_string_lossy().into_owned(),
            message: if stderr.is_empty() { stdout } else { stderr },
        });
    }
    Ok(stdout.trim_end_matches('\n').to_string())
}

fn git_bare(bare_dir: &Path, args: &[&str]) -> Result<String> {
    let mut full = vec!["--git-dir", &bare_dir.to_string_lossy()];
    full.extend_from_slice(args);
    syscall("git", full.iter().map(OsStr::new))
}

fn git_in(worktree: &Path, args: &[&str]) -> Result<String> {
    let mut full = vec!["-C", &worktree.to_string_lossy()];
    full.extend_from_slice(args);
    syscall("git", full.iter().map(OsStr::new))
}

/// `true` if `path` is itself a linked worktree (its `.git` is a file pointing back at
/// the bare clone) rather than a plain non-worktree checkout (`.git` is a directory).
pub fn is_worktree_checkout(path: &Path) -> bool {
    path.join(".git").is_file()
}

fn has_uncommitted_changes(worktree: &Path) -> Result<bool> {
    let status = git_in(worktree, &["status", "--porcelain"])?;
    Ok(!status.trim().is_empty())
}

fn current_remote_url(worktree: &Path) -> Result<String> {
    git_in(worktree, &["remote", "get-url", "origin"])
}

/// Owns worktree operations for one bare clone.
pub struct WorktreeStore<'a> {
    bare_dir: &'a Path,
}

impl<'a> WorktreeStore<'a> {
    pub fn new(bare_dir: &'a Path) -> Self {
        WorktreeStore { bare_dir }
    }

    pub fn prune(&self) -> Result<()> {
        git_bare(self.bare_dir, &["worktree", "prune"])?;
        Ok(())
    }

    /// Paths of every worktree registered against this bare clone, pruning stale
    /// entries first.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        self.prune()?;
        let out = git_bare(self.bare_dir, &["worktree", "list", "--porcelain"])?;
        Ok(out
            .lines()
            .filter_map(|line| line.strip_prefix("worktree "))
            .map(PathBuf::from)
            .collect())
    }

    fn create(&self, worktree: &Path, version: &str) -> Result<()> {
        self.prune()?;
        let path = worktree.to_string_lossy();
        git_bare(self.bare_dir, &["worktree", "add", "-f", &path, version]).map_err(|e| match e {
            Error::Syscall { .. } => Error::RefError(version.to_string()),
            other => other,
        })?;
        Ok(())
    }

    fn migrate(&self, worktree: &Path, version: &str, name: &str, force: bool) -> Result<()> {
        if !force && (has_uncommitted_changes(worktree)? || is_worktree_checkout(worktree)) {
            return Err(Error::DirtyWorktree { name: name.to_string() });
        }
        info!("removing non-worktree checkout {}", worktree.display());
        std::fs::remove_dir_all(worktree)?;
        self.create(worktree, version)
    }

    fn switch_remote(&self, worktree: &Path, version: &str, name: &str, force: bool) -> Result<()> {
        if !force && has_uncommitted_changes(worktree)? {
            return Err(Error::DirtyWorktree { name: name.to_string() });
        }
        info!("removing stale worktree {} for remote switch", worktree.display());
        git_bare(self.bare_dir, &["worktree", "remove", "--force", &worktree.to_string_lossy()])?;
        self.create(worktree, version)
    }

    /// Create or update the worktree at `path` so it checks out `version` (or the
    /// remote's default branch, if `version` is `None`) against `remote_url`.
    ///
    /// Implements the checkout policy: create if absent, migrate a non-worktree
    /// checkout found at `path`, recreate if an existing worktree tracks a different
    /// remote, otherwise just update the version in place.
    #[instrument(skip(self), level = "debug")]
    pub fn checkout(&self, path: &Path, version: Option<&str>, remote_url: &str, name: &str, force: bool) -> Result<()> {
        let version = match version {
            Some(v) => v.to_string(),
            None => default_branch(self.bare_dir)?,
        };

        if !path.is_dir() {
            debug!("no existing checkout at {}, creating worktree", path.display());
            return self.create(path, &version);
        }

        if !is_worktree_checkout(path) {
            return self.migrate(path, &version, name, force);
        }

        if current_remote_url(path)? != remote_url {
            return self.switch_remote(path, &version, name, force);
        }

        git_in(path, &["fetch", "--tags", "--prune"])?;
        git_in(path, &["checkout", &version]).map_err(|_| Error::RefError(version.clone()))?;
        git_in(path, &["reset", "--hard", &version]).map_err(|_| Error::RefError(version))?;
        Ok(())
    }

    /// Create a fresh worktree with an initial empty commit, used when initialising a
    /// brand-new, still-remoteless dependency or package clone.
    pub fn initialize(&self, path: &Path, branch: &str) -> Result<()> {
        let commit = git_bare(
            self.bare_dir,
            &["commit-tree", "-m", "Initial commit", &empty_tree(self.bare_dir)?],
        )?;
        git_bare(
            self.bare_dir,
            &["worktree", "add", &path.to_string_lossy(), &commit, "-b", branch],
        )?;
        Ok(())
    }
}

fn empty_tree(bare_dir: &Path) -> Result<String> {
    git_bare(bare_dir, &["hash-object", "-t", "tree", "/dev/null"])
}

fn default_branch(bare_dir: &Path) -> Result<String> {
    match git_bare(bare_dir, &["symbolic-ref", "refs/remotes/origin/HEAD"]) {
        Ok(full) => Ok(full.trim_start_matches("refs/remotes/origin/").to_string()),
        Err(_) => {
            git_bare(bare_dir, &["remote", "set-head", "origin", "--auto"]).ok();
            match git_bare(bare_dir, &["symbolic-ref", "refs/remotes/origin/HEAD"]) {
                Ok(full) => Ok(full.trim_start_matches("refs/remotes/origin/").to_string()),
                Err(_) => Ok("master".to_string()),
            }
        }
    }
}
