//! Git remote URL normalisation.
//!
//! Ported from the original's `normalize_url.py`/`gitrepo.py`: SSH shorthand
//! (`user@host:path`) is rewritten to `ssh://user@host/path`, `http(s)` URLs are run
//! through standard URL normalisation, and repeated path separators are collapsed. The
//! result is used everywhere a URL becomes a map key (dependency registry, bare-clone
//! directory name), so two spellings of the same remote must normalise identically.

use std::path::{Path, PathBuf};

use crate::error::Result;

/// Normalise a Git remote URL for use as a stable dependency key.
///
/// `normalise(normalise(u)) == normalise(u)` for every input form this function
/// recognises (SSH shorthand, `ssh://`, `http(s)://`, or a bare filesystem path).
pub fn normalise(url: &str) -> String {
    let url = collapse_repeated_slashes(url);
    if is_ssh_shorthand(&url) {
        normalise_ssh(&url)
    } else if url.starts_with("http://") || url.starts_with("https://") || url.starts_with("ssh://") {
        normalise_http_like(&url)
    } else {
        url
    }
}

fn is_ssh_shorthand(url: &str) -> bool {
    url.contains('@') && !url.contains("://")
}

/// Rewrite `user@host:path` to `ssh://user@host/path`.
fn normalise_ssh(url: &str) -> String {
    let Some((host_part, repo_path)) = url.split_once(':') else {
        return format!("ssh://{url}");
    };
    let repo_path = repo_path.trim_start_matches('/');
    format!("ssh://{host_part}/{repo_path}")
}

fn normalise_http_like(url: &str) -> String {
    let (scheme, rest) = url.split_once("://").unwrap_or(("https", url));
    let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
    let path = collapse_repeated_slashes(path);
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        format!("{scheme}://{authority}")
    } else {
        format!("{scheme}://{authority}/{path}")
    }
}

fn collapse_repeated_slashes(s: &str) -> String {
    // Leave the "scheme://" double-slash alone; only collapse runs after it.
    if let Some(idx) = s.find("://") {
        let (head, tail) = s.split_at(idx + 3);
        let mut out = head.to_string();
        out.push_str(&collapse_slash_run(tail));
        out
    } else {
        collapse_slash_run(s)
    }
}

fn collapse_slash_run(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_slash = false;
    for c in s.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    out
}

/// Host and url-path components of a normalised URL, used to build the bare-clone
/// directory `<work>/dependencies/.repos/<host>/<path>`.
pub struct UrlParts {
    pub host: String,
    pub path: String,
}

pub fn deconstruct(normalised_url: &str) -> Result<UrlParts> {
    let rest = normalised_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(normalised_url);
    let (authority, path) = rest.split_once('/').unwrap_or((rest, ""));
    let host = authority.rsplit_once('@').map(|(_, h)| h).unwrap_or(authority);
    Ok(UrlParts {
        host: host.to_string(),
        path: path.trim_end_matches(".git").to_string(),
    })
}

/// Compute the bare-clone directory for a (already normalised) remote URL under
/// `<work>/dependencies`.
pub fn bare_clone_dir(dependencies_dir: &Path, url: &str) -> Result<PathBuf> {
    let url = normalise(url);
    let parts = deconstruct(&url)?;
    Ok(dependencies_dir.join(".repos").join(parts.host).join(parts.path))
}
