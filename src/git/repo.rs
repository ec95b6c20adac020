//! Thin wrapper around [`git2::Repository`] for the operations the core needs on a
//! checked-out working tree: author resolution, staging, committing, and pushing.
//!
//! Cloning is handled separately by [`clone_with_progress`], which drives a
//! [`git2::build::RepoBuilder`] through an [`indicatif::ProgressBar`] and an
//! [`auth_git2::GitAuthenticator`] so credential prompts and transfer progress both
//! surface through the same bar.

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use auth_git2::GitAuthenticator;
use git2::{build::RepoBuilder, FetchOptions, RemoteCallbacks, Repository, RepositoryInitOptions, Signature};
use indicatif::ProgressBar;
use tracing::{debug, info, instrument};

use crate::{
    error::{Error, Result},
    git::diff::{ChangeKind, DiffFunc},
    url,
};

/// Clone `remote_url` into `path`, reporting transfer progress on `bar` and deferring to
/// `authenticator` for credentials. `bare` selects a bare clone (used for dependency and
/// package backing repos) versus a normal checkout (used for the catalog repo).
#[instrument(skip(authenticator, bar), level = "debug")]
pub fn clone_with_progress(remote_url: &str, path: &Path, bare: bool, authenticator: &GitAuthenticator, bar: &ProgressBar) -> Result<Repository> {
    let normalised = url::normalise(remote_url);
    bar.set_message(format!("cloning {normalised}"));
    bar.enable_steady_tick(Duration::from_millis(100));

    let config = git2::Config::open_default()?;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(authenticator.credentials(&config));

    let mut throttle = Instant::now();
    callbacks.transfer_progress(|progress| {
        if throttle.elapsed() > Duration::from_millis(50) {
            throttle = Instant::now();
            bar.set_length(progress.total_objects() as u64);
            bar.set_position(progress.received_objects() as u64);
        }
        true
    });

    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(callbacks);

    let repository = RepoBuilder::new().bare(bare).fetch_options(fetch_options).clone(&normalised, path)?;
    debug!("cloned {normalised} into {}", path.display());
    Ok(repository)
}

/// Initialise an empty repository at `path`, used when a remote has no commits yet and
/// cloning would fail.
pub fn init(path: &Path, bare: bool) -> Result<Repository> {
    let mut opts = RepositoryInitOptions::new();
    opts.bare(bare);
    Ok(Repository::init_opts(path, &opts)?)
}

/// Resolve the push URL derived from an `http(s)` fetch URL: `git@<host><path>` over
/// SSH, so pushing never requires an HTTPS token the caller may not have.
pub fn derive_push_url(fetch_url: &str) -> Result<String> {
    let normalised = url::normalise(fetch_url);
    if !normalised.starts_with("http://") && !normalised.starts_with("https://") {
        return Ok(normalised);
    }
    let parts = url::deconstruct(&normalised)?;
    Ok(format!("ssh://git@{}/{}", parts.host, parts.path))
}

/// A checked-out working tree the core stages, commits to, and pushes from.
pub struct WorkingRepo {
    repository: Repository,
    author_name: Option<String>,
    author_email: Option<String>,
}

impl WorkingRepo {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(WorkingRepo {
            repository: Repository::open(path)?,
            author_name: None,
            author_email: None,
        })
    }

    pub fn from_repository(repository: Repository) -> Self {
        WorkingRepo {
            repository,
            author_name: None,
            author_email: None,
        }
    }

    pub fn with_author(mut self, name: Option<String>, email: Option<String>) -> Self {
        self.author_name = name;
        self.author_email = email;
        self
    }

    pub fn path(&self) -> &Path {
        self.repository.path()
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.repository.workdir()
    }

    fn signature(&self) -> Result<Signature<'static>> {
        if let (Some(name), Some(email)) = (&self.author_name, &self.author_email) {
            return Ok(Signature::now(name, email)?);
        }
        match self.repository.signature() {
            Ok(sig) => Ok(sig),
            Err(_) => {
                info!("no git author configured, falling back to Commodore <commodore@syn.tools>");
                Ok(Signature::now("Commodore", "commodore@syn.tools")?)
            }
        }
    }

    /// Point `origin` at `remote_url`, creating the remote if it doesn't exist yet, and
    /// set a derived SSH push URL for `http(s)` fetch URLs.
    pub fn set_remote(&self, remote_url: &str) -> Result<()> {
        let normalised = url::normalise(remote_url);
        match self.repository.find_remote("origin") {
            Ok(mut remote) => {
                self.repository.remote_set_url("origin", &normalised)?;
                let _ = remote.disconnect();
            }
            Err(_) => {
                self.repository.remote("origin", &normalised)?;
            }
        }
        let push_url = derive_push_url(&normalised)?;
        self.repository.remote_set_pushurl("origin", Some(&push_url))?;
        Ok(())
    }

    /// Stage all working-tree changes (new, modified, deleted, untracked files),
    /// returning a human-readable coloured diff alongside whether anything changed.
    pub fn stage_all(&self, diff_func: &dyn DiffFunc) -> Result<(String, bool)> {
        let mut index = self.repository.index()?;
        index.add_all(["*"], git2::IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"], None)?;
        index.write()?;

        if index.has_conflicts() {
            let conflicts = index.conflicts()?;
            for conflict in conflicts.flatten() {
                if let Some(our) = conflict.our {
                    return Err(Error::MergeConflict(PathBuf::from(String::from_utf8_lossy(&our.path).into_owned())));
                }
            }
        }

        let new_tree_oid = index.write_tree()?;
        let new_tree = self.repository.find_tree(new_tree_oid)?;
        let old_tree = self.repository.head().ok().and_then(|h| h.peel_to_tree().ok());

        let diff = self.repository.diff_tree_to_tree(old_tree.as_ref(), Some(&new_tree), None)?;
        let mut changed = false;
        let mut rendered = Vec::new();
        diff.foreach(
            &mut |delta, _| {
                changed = true;
                let path = delta.new_file().path().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();
                let old_path = delta.old_file().path().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default();
                let kind = match delta.status() {
                    git2::Delta::Added => ChangeKind::Added { path },
                    git2::Delta::Deleted => ChangeKind::Deleted { path: old_path },
                    git2::Delta::Renamed => ChangeKind::Renamed { from: old_path, to: path },
                    _ => ChangeKind::Modified {
                        path: path.clone(),
                        before: String::new(),
                        after: String::new(),
                    },
                };
                if let Some(line) = crate::git::diff::render_change(&kind, diff_func) {
                    rendered.push(line);
                }
                true
            },
            None,
            None,
            None,
        )?;

        Ok((rendered.join("\n"), changed))
    }

    /// Commit the current index on top of `HEAD` (or as the repository's first commit).
    pub fn commit(&self, message: &str) -> Result<()> {
        let signature = self.signature()?;
        let mut index = self.repository.index()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repository.find_tree(tree_oid)?;

        let parents = match self.repository.head() {
            Ok(head) => vec![head.peel_to_commit()?],
            Err(_) => Vec::new(),
        };
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        self.repository.commit(Some("HEAD"), &signature, &signature, message, &tree, &parent_refs)?;
        Ok(())
    }

    /// Push `branch` (defaulting to the current branch) to `origin`, surfacing a
    /// rejected update as [`Error::PushRejected`] rather than a raw `git2` error.
    pub fn push(&self, branch: Option<&str>, authenticator: &GitAuthenticator) -> Result<()> {
        let branch = match branch {
            Some(b) => b.to_string(),
            None => self.current_branch()?,
        };
        let mut remote = self.repository.find_remote("origin")?;
        let config = self.repository.config()?;
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(authenticator.credentials(&config));

        let mut rejected: Option<String> = None;
        callbacks.push_update_reference(|refname, status| {
            if let Some(message) = status {
                rejected = Some(format!("{refname}: {message}"));
            }
            Ok(())
        });

        let mut push_options = git2::PushOptions::new();
        push_options.remote_callbacks(callbacks);
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        remote.push(&[refspec], Some(&mut push_options))?;

        match rejected {
            Some(message) => Err(Error::PushRejected(message)),
            None => Ok(()),
        }
    }

    pub fn current_branch(&self) -> Result<String> {
        let head = self.repository.head()?;
        Ok(head.shorthand().unwrap_or("HEAD").to_string())
    }
}
