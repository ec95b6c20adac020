//! Crate-wide error taxonomy.
//!
//! Every fallible operation in the core library returns [`Result<T>`], an alias over
//! [`std::result::Result`] with [`Error`] as the error type. The CLI front-end is the
//! only place that inspects [`Error::exit_code`] and prints [`Error`]'s `Display` text;
//! library code never formats its own error strings ad hoc.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The tool whose absence on `PATH` a [`Error::ToolMissing`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Helm,
    Kustomize,
    JsonnetBundler,
}

impl std::fmt::Display for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Tool::Helm => "helm",
            Tool::Kustomize => "kustomize",
            Tool::JsonnetBundler => "jb",
        };
        write!(f, "{name}")
    }
}

/// Single error type returned by every public entry point of the core library.
///
/// Variants are grouped by the taxonomy kinds of the error-handling design: each
/// `#[error("...")]` message is the literal single-line, user-facing text; no caller
/// reformats it further.
#[derive(Debug, Error)]
pub enum Error {
    // -- ConfigError --
    #[error("missing API URL or token; pass --api-url/--api-token or set COMMODORE_API_URL/COMMODORE_API_TOKEN, or run with --local")]
    MissingApiCredentials,

    #[error("--push cannot be combined with a revision override")]
    ConflictingFlags,

    // -- RegistryError --
    #[error("request to cluster registry failed: {0}")]
    Registry(#[from] reqwest::Error),

    #[error("cluster registry returned malformed JSON: {0}")]
    RegistryDecode(#[source] serde_json::Error),

    // -- DiscoveryError --
    #[error("duplicate component alias '{alias}': components {bases:?} are aliased to '{alias}'")]
    DuplicateAlias { alias: String, bases: Vec<String> },

    #[error("component '{base}' aliases existing component '{alias}'")]
    AliasShadowsComponent { alias: String, base: String },

    #[error("malformed applications entry '{0}'")]
    MalformedApplication(String),

    #[error("can't use reserved name '{0}' as package name")]
    ReservedPackageName(String),

    #[error("package names can't be prefixed with 't-'; this prefix is reserved for tenant configurations")]
    TenantPrefixedPackageName(String),

    // -- VersionBindingError --
    #[error("no url for component '{0}' configured")]
    MissingUrl(String),

    #[error("component '{0}' doesn't have a version specified")]
    MissingVersion(String),

    #[error("alias '{alias}' overrides parameters for unknown base component '{base}'")]
    UnknownBaseComponent { alias: String, base: String },

    // -- DependencyError --
    #[error("git operation failed: {0}")]
    Git2(#[from] git2::Error),

    #[error("failed to run '{program}': {message}")]
    Syscall { program: String, message: String },

    #[error("failed to checkout revision '{0}'")]
    RefError(String),

    #[error("dependency '{name}' has uncommitted changes. Please specify `force` to discard them")]
    DirtyWorktree { name: String },

    #[error("local mode requires an existing worktree for '{0}', none found")]
    LocalModeWorktreeMissing(String),

    #[error("dependency (kind={kind:?}, name='{name}') is already registered")]
    AlreadyRegistered { kind: &'static str, name: String },

    // -- InstantiationError --
    #[error("component {component} with alias {alias} does not support instantiation")]
    InstantiationNotSupported { component: String, alias: String },

    // -- LibraryAliasError --
    #[error("library alias '{alias}' begins with component name '{component}'")]
    LibraryAliasPrefixCollision { alias: String, component: String },

    #[error("library alias '{0}' is declared by more than one component")]
    DuplicateLibraryAlias(String),

    // -- TemplaterError --
    #[error("templater exited with a non-zero status for target '{0}'")]
    TemplaterFailed(String),

    // -- PostprocessError --
    #[error("unknown builtin filter '{0}'")]
    UnknownBuiltinFilter(String),

    #[error("jsonnet filter script '{0}' does not exist")]
    MissingFilterScript(PathBuf),

    #[error("filter output path '{0}' escapes the target's compiled tree")]
    FilterPathEscapesTree(PathBuf),

    // -- RefError (secret references) --
    #[error("unsupported secret reference type '{0}'")]
    UnsupportedRefType(String),

    // -- Git-surface errors --
    #[error("merge conflict in '{}'", .0.display())]
    MergeConflict(PathBuf),

    #[error("failed to push to the catalog repository: {0}")]
    PushRejected(String),

    // -- Evaluator / inventory --
    #[error("inventory evaluation failed: {0}")]
    Evaluation(String),

    #[error("key '{0}' not found in inventory")]
    NotFound(String),

    #[error("key '{key}' has type {actual}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    // -- Misc / ambient --
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("cannot determine path to {0}")]
    NoWayHome(&'static str),

    #[error("required external tool is missing: {0}")]
    ToolMissing(Tool),

    #[error("unknown subcommand or option combination: {0}")]
    Usage(String),
}

impl Error {
    /// Map this error to the process exit code the CLI front-end should use.
    ///
    /// `0` is never returned here; the CLI only calls this on the `Err` arm.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage(_) => 2,
            Error::ToolMissing(_) => 127,
            _ => 1,
        }
    }
}
