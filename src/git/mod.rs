//! Git Dependency Manager: normalised remote URLs, one shared bare clone per remote,
//! per-alias worktrees, and the catalog repo's commit/push surface.

pub mod auth;
pub mod dependency;
pub mod diff;
pub mod repo;
pub mod worktree;

pub use dependency::{AliasKind, MultiDependency};
pub use diff::{ChangeKind, DiffFunc, UnifiedDiff};
pub use repo::{clone_with_progress, derive_push_url, WorkingRepo};
pub use worktree::WorktreeStore;
