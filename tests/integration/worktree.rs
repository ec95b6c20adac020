//! Worktree checkout policy exercised against real `git2`/`git` operations: a
//! non-worktree checkout with uncommitted changes is refused unless `force` is set.

use commodore::error::Error;
use commodore::git::WorktreeStore;
use git2::Repository;
use sealed_test::prelude::*;

use super::git_fixture::{GitFixture, GitKind};

#[sealed_test]
fn dirty_non_worktree_checkout_is_refused_without_force() {
    let work = std::env::current_dir().unwrap();
    let bare_dir = work.join("bare.git");
    let fixture = GitFixture::new(&bare_dir, GitKind::Bare).unwrap();
    fixture.stage_and_commit("README.md", "hello\n").unwrap();

    let checkout = work.join("checkout");
    Repository::clone(&bare_dir.to_string_lossy(), &checkout).unwrap();
    std::fs::write(checkout.join("README.md"), "modified without committing\n").unwrap();

    let store = WorktreeStore::new(&bare_dir);
    let err = store.checkout(&checkout, Some("main"), "irrelevant", "test-dep", false).unwrap_err();
    match err {
        Error::DirtyWorktree { name } => assert_eq!(name, "test-dep"),
        other => panic!("expected DirtyWorktree, got {other:?}"),
    }
    assert!(format!("{err}").contains("has uncommitted changes"));

    store.checkout(&checkout, Some("main"), "irrelevant", "test-dep", true).unwrap();
    let contents = std::fs::read_to_string(checkout.join("README.md")).unwrap();
    assert_eq!(contents, "hello\n");
}
