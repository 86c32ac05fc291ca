//! Error taxonomy for the function lifecycle
//!
//! Every distinguishable failure is its own variant so callers can match on
//! the kind instead of inspecting messages. Collaborator failures are
//! wrapped in [`FunctionError::Strategy`] with the phase and function name,
//! keeping the original error as the `source()`.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, FunctionError>;

/// Lifecycle phase a collaborator was called for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Build,
    Push,
    Deploy,
    Run,
    Remove,
    List,
    Describe,
    Pipeline,
    Invoke,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Build => "build",
            Phase::Push => "push",
            Phase::Deploy => "deploy",
            Phase::Run => "run",
            Phase::Remove => "remove",
            Phase::List => "list",
            Phase::Describe => "describe",
            Phase::Pipeline => "pipeline",
            Phase::Invoke => "invoke",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum FunctionError {
    // Configuration
    #[error("no {0} is configured for this client")]
    StrategyNotConfigured(&'static str),

    #[error("function runtime is required")]
    RuntimeRequired,

    #[error("\"{0}\" is not a known builder. Available builders are \"host\", \"pack\" and \"s2i\"")]
    UnknownBuilder(String),

    // Preconditions
    #[error("'{0}' does not contain an initialized function")]
    NotInitialized(PathBuf),

    #[error("function at '{0}' already initialized")]
    AlreadyInitialized(PathBuf),

    #[error(
        "the chosen directory '{path}' contains contentious files: {files:?}. \
         Has the function already been created? Try either using a different directory, \
         deleting the function if it exists, or manually removing the files"
    )]
    ContentiousFiles { path: PathBuf, files: Vec<String> },

    #[error("the directory '{0}' must be empty of visible files before it can be initialized")]
    DirectoryNotEmpty(PathBuf),

    #[error("function root path is required")]
    RootRequired,

    #[error("function name is required")]
    NameRequired,

    #[error("registry required to build function, please set with --registry or FUNC_REGISTRY")]
    RegistryRequired,

    #[error("registry '{0}' is invalid: expected at most three path segments")]
    RegistryInvalid(String),

    #[error("function not built")]
    NotBuilt,

    #[error("function is not running")]
    NotRunning,

    #[error("environment '{0}' not found; expected \"local\" or \"remote\"")]
    EnvironmentNotFound(String),

    // Resolution
    #[error("the '{0}' runtime is not available in any template repository")]
    RuntimeNotFound(String),

    #[error("template '{template}' not found for runtime '{runtime}'")]
    TemplateNotFound { runtime: String, template: String },

    #[error("repository '{0}' not found")]
    RepositoryNotFound(String),

    #[error("repository '{0}' already exists")]
    RepositoryExists(String),

    #[error("the '{runtime}' runtime defines no default '{builder}' builder image")]
    NoDefaultImage { builder: String, runtime: String },

    // Detection and scaffolding
    #[error("the {0} method signature detector is not yet available")]
    DetectorNotImplemented(String),

    #[error("the {0} runtime is not recognized by the signature detector")]
    RuntimeNotRecognized(String),

    #[error("function may not implement both the static and instanced method signatures simultaneously")]
    SignatureConflict,

    #[error("function does not implement any known method signatures or does not compile")]
    SignatureMissing,

    #[error("scaffolding not found")]
    ScaffoldingNotFound,

    #[error("{message}: {source}")]
    Scaffolding {
        message: String,
        #[source]
        source: BoxError,
    },

    #[error("no middleware version detector for runtime '{0}'")]
    UnsupportedRuntime(String),

    // Descriptor
    #[error("'{file}' contains errors:{}", format_problems(.problems))]
    Invalid { file: String, problems: Vec<String> },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("migration '{migration}' failed: {message}")]
    Migration {
        migration: &'static str,
        message: String,
    },

    #[error("expected environment variable '{0}' not found")]
    EnvNotFound(String),

    // Collaborators
    #[error("{phase} of function '{function}' failed: {source}")]
    Strategy {
        phase: Phase,
        function: String,
        #[source]
        source: BoxError,
    },

    #[error("{}", format_multiple(.0))]
    Multiple(Vec<FunctionError>),

    #[error("unable to invoke '{route}': {message}")]
    Invoke { route: String, message: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FunctionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FunctionError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn scaffolding(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        FunctionError::Scaffolding {
            message: message.into(),
            source: source.into(),
        }
    }

    pub(crate) fn strategy(phase: Phase, function: &str, source: anyhow::Error) -> Self {
        FunctionError::Strategy {
            phase,
            function: function.to_string(),
            source: source.into(),
        }
    }

    /// Whether this error (or any error it aggregates) is a cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            FunctionError::Cancelled => true,
            FunctionError::Multiple(errors) => errors.iter().any(|e| e.is_cancelled()),
            _ => false,
        }
    }
}

fn format_problems(problems: &[String]) -> String {
    problems
        .iter()
        .map(|p| format!("\n\t{}", p))
        .collect::<String>()
}

fn format_multiple(errors: &[FunctionError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
