//! Local Git repository fixtures used to exercise the dependency manager, worktree
//! checkout policy, and catalog writer against real `git2` operations instead of mocks.

use anyhow::Result;
use git2::{IndexEntry, IndexTime, Repository, RepositoryInitOptions};
use std::path::Path;

/// A disposable Git repository fixture, bare or checked-out.
pub struct GitFixture {
    repo: Repository,
}

impl GitFixture {
    pub fn new(path: impl AsRef<Path>, kind: GitKind) -> Result<Self> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        opts.bare(kind.is_bare());
        let repo = Repository::init_opts(path.as_ref(), &opts)?;

        let mut config = repo.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;

        Ok(Self { repo })
    }

    /// Stage and commit `contents` as `filename`, writing the blob directly into the
    /// tree rather than via a working-directory file (works for bare repos too).
    pub fn stage_and_commit(&self, filename: impl AsRef<Path>, contents: impl AsRef<str>) -> Result<()> {
        let entry = IndexEntry {
            ctime: IndexTime::new(0, 0),
            mtime: IndexTime::new(0, 0),
            dev: 0,
            ino: 0,
            mode: 0o100644,
            uid: 0,
            gid: 0,
            file_size: contents.as_ref().len() as u32,
            id: self.repo.blob(contents.as_ref().as_bytes())?,
            flags: 0,
            flags_extended: 0,
            path: filename.as_ref().as_os_str().to_string_lossy().into_owned().as_bytes().to_vec(),
        };

        let mut index = self.repo.index()?;
        index.add_frombuffer(&entry, contents.as_ref().as_bytes())?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;

        let signature = self.repo.signature()?;
        let mut parents = Vec::new();
        if let Some(parent) = self.repo.head().ok().map(|h| h.target().unwrap()) {
            parents.push(self.repo.find_commit(parent)?);
        }
        let parents = parents.iter().collect::<Vec<_>>();

        self.repo.commit(Some("HEAD"), &signature, &signature, &format!("Add {:?}", filename.as_ref()), &tree, &parents)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        self.repo.path()
    }
}

/// Git fixture variants.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum GitKind {
    #[default]
    Normal,
    Bare,
}

impl GitKind {
    fn is_bare(self) -> bool {
        matches!(self, GitKind::Bare)
    }
}
