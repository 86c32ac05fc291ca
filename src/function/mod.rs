//! Function descriptor: types, persistence, migrations and build stamp
//!
//! A function is a directory holding a `func.yaml` descriptor beside its
//! source. Local run-time state (build stamp, last built image, running
//! job directories) lives under `.func` and is never persisted in the
//! descriptor itself.

mod descriptor;
mod image;
mod layout;
pub mod migrations;
mod stamp;
mod validation;

pub use descriptor::{
    absolute, name_from_path, BuildSpec, DeploySpec, EmptyDir, Env, Function, Git,
    HealthEndpoints, Label, Options, PersistentVolumeClaim, ResourceLimits, ResourceRequests,
    ResourcesOptions, RunSpec, ScaleOptions, Volume,
};
pub use image::{image_name, with_digest};
pub use layout::{assert_empty_root, ensure_funcignore, ensure_run_data_dir, contentious_files};
pub use stamp::{built, fingerprint, write_stamp};
pub use validation::interpolate;

/// Descriptor file name at a function's root
pub const FUNCTION_FILE: &str = "func.yaml";

/// Directory for local run-time data
pub const RUN_DATA_DIR: &str = ".func";

/// Build stamp file inside the run-data directory
pub const BUILT_STAMP_FILE: &str = "built";

/// Image reference produced by the last build, inside the run-data directory
pub const BUILT_IMAGE_FILE: &str = "built-image";

/// Per-job directories of locally running instances
pub const RUNS_DIR: &str = "runs";

/// Ignore file consulted when fingerprinting the source tree
pub const IGNORE_FILE: &str = ".funcignore";

pub const DEFAULT_TEMPLATE: &str = "http";
pub const DEFAULT_REGISTRY: &str = "index.docker.io";
pub const DEFAULT_PVC_SIZE: &str = "256Mi";

/// Default invocation hint
pub const DEFAULT_INVOKE: &str = "http";
