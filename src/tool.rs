//! External binary discovery (`helm`, `kustomize`, the jsonnet bundler).
//!
//! These are resolved via `PATH`; absence is deferred to the stage that actually needs
//! the tool rather than checked eagerly at startup, and surfaces as exit code `127`
//! (see [`crate::error::Error::ToolMissing`]).

use std::path::PathBuf;

use crate::error::Tool;

/// Capability for locating external binaries. Injected so pipeline stages can be tested
/// against a fake provider without touching the real `PATH`.
pub trait ToolProvider: Send + Sync {
    fn locate(&self, tool: Tool) -> Option<PathBuf>;
}

/// Default provider: searches `PATH` the same way a shell would.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathToolProvider;

impl ToolProvider for PathToolProvider {
    fn locate(&self, tool: Tool) -> Option<PathBuf> {
        let name = tool.to_string();
        let path = std::env::var_os("PATH")?;
        std::env::split_paths(&path).find_map(|dir| {
            let candidate = dir.join(&name);
            candidate.is_file().then_some(candidate)
        })
    }
}
