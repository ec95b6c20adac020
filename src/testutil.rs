//! Shared Git fixtures for unit tests across the crate.

use std::path::Path;

use git2::{IndexEntry, IndexTime, Repository, RepositoryInitOptions};

use crate::error::Result;

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

/// A throwaway Git repository for tests, with a fixed author so commits are
/// deterministic.
pub struct GitFixture {
    pub repo: Repository,
}

impl GitFixture {
    pub fn new(path: impl AsRef<Path>, kind: GitKind) -> Result<Self> {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        opts.bare(kind.is_bare());
        let repo = Repository::init_opts(path.as_ref(), &opts)?;

        let mut config = repo.config()?;
        config.set_str("user.name", "Test Author")?;
        config.set_str("user.email", "test@example.com")?;

        if kind == GitKind::Bare {
            config.set_str("status.showUntrackedFiles", "no")?;
        }

        Ok(GitFixture { repo })
    }

    /// Stage and commit a single file directly against the tree, without writing it to
    /// disk first.
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
            path: filename.as_ref().as_os_str().to_string_lossy().into_owned().into_bytes(),
        };

        let mut index = self.repo.index()?;
        index.add_frombuffer(&entry, contents.as_ref().as_bytes())?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;

        let signature = self.repo.signature()?;
        let parent = self.repo.head().ok().and_then(|h| h.target()).and_then(|oid| self.repo.find_commit(oid).ok());
        let parents: Vec<_> = parent.iter().collect();

        self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            &format!("Add {}", filename.as_ref().display()),
            &tree,
            &parents,
        )?;
        Ok(())
    }
}
