//! Interactive credential prompting for Git operations that hit authenticated remotes.
//!
//! Wraps an [`indicatif`] progress bar (or a [`MultiProgress`] when several dependencies
//! are being fetched concurrently) so a credential prompt suspends the bar instead of
//! fighting it for the terminal.

use std::path::Path;

use auth_git2::Prompter;
use indicatif::{MultiProgress, ProgressBar};
use inquire::{Password, Text};
use tracing::info;

#[derive(Clone)]
pub(crate) enum ProgressBarKind {
    Single(ProgressBar),
    Multi(MultiProgress),
}

#[derive(Clone)]
pub(crate) struct ProgressBarAuth {
    bar_kind: ProgressBarKind,
}

impl ProgressBarAuth {
    pub(crate) fn new(bar_kind: ProgressBarKind) -> Self {
        Self { bar_kind }
    }

    fn suspend<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.bar_kind {
            ProgressBarKind::Single(bar) => bar.suspend(f),
            ProgressBarKind::Multi(bar) => bar.suspend(f),
        }
    }
}

impl Prompter for ProgressBarAuth {
    fn prompt_username_password(
        &mut self,
        url: &str,
        _git_config: &git2::Config,
    ) -> Option<(String, String)> {
        self.suspend(|| {
            info!("authentication required for {url}");
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password").without_confirmation().prompt().ok()?;
            Some((username, password))
        })
    }

    fn prompt_password(&mut self, username: &str, url: &str, _git_config: &git2::Config) -> Option<String> {
        self.suspend(|| {
            info!("authentication required for {url} for user {username}");
            Password::new("password").without_confirmation().prompt().ok()
        })
    }

    fn prompt_ssh_key_passphrase(&mut self, private_key_path: &Path, _git_config: &git2::Config) -> Option<String> {
        self.suspend(|| {
            info!("passphrase required for {}", private_key_path.display());
            Password::new("passphrase").without_confirmation().prompt().ok()
        })
    }
}
