//! Scaffolding: detect a function's signature and write the entrypoint
//! that adapts it to the runtime middleware
//!
//! Scaffolding is chosen per language and signature, not per template: a
//! template is only a starting point and its author may switch conventions
//! at any time. The signature is therefore detected fresh from the source
//! on every write.

pub mod detectors;
mod gomod;
mod middleware;
mod signature;
mod writer;

pub use detectors::{detector_for, Detector, GoDetector, PythonDetector};
pub use gomod::{GoMod, Replace, Require};
pub use middleware::{
    detect_version, middleware_version, middleware_versions, MIDDLEWARE_INVOKES,
    MIDDLEWARE_RUNTIMES,
};
pub use signature::Signature;
pub use writer::{
    detect_signature, relative_path, resolve_signature, write, write_with_policy,
    ScaffoldingPolicy,
};
