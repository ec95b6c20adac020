//! Integration test harness root. `tests/main.rs` is the actual test binary; this module
//! only groups the suites that exercise more than one core module at once, with fixtures
//! shared through [`git_fixture`].

pub mod git_fixture;
mod pipeline;
mod worktree;
