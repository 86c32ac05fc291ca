//! Per-runtime method signature detectors

mod go;
mod golex;

pub use go::{parse_top_level_funcs, FuncDecl, GoDetector};

use crate::error::{FunctionError, Result};
use std::path::Path;

/// Inspects a function's source and reports which conventions it
/// implements as `(static, instanced)`.
pub trait Detector: Send + Sync {
    fn detect(&self, dir: &Path) -> Result<(bool, bool)>;
}

/// Python middleware dispatches on the signature at runtime, so the
/// detector reports the instanced convention unconditionally.
#[derive(Debug, Default)]
pub struct PythonDetector;

impl Detector for PythonDetector {
    fn detect(&self, _dir: &Path) -> Result<(bool, bool)> {
        Ok((false, true))
    }
}

/// Detector for `runtime`.
///
/// Known runtimes without a detector yet fail with
/// [`FunctionError::DetectorNotImplemented`]; unknown runtimes with
/// [`FunctionError::RuntimeNotRecognized`].
pub fn detector_for(runtime: &str) -> Result<Box<dyn Detector>> {
    match runtime {
        "go" => Ok(Box::new(GoDetector)),
        "python" => Ok(Box::new(PythonDetector)),
        "rust" | "node" | "typescript" | "quarkus" | "java" => {
            Err(FunctionError::DetectorNotImplemented(runtime.to_string()))
        }
        _ => Err(FunctionError::RuntimeNotRecognized(runtime.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_lookup() {
        assert!(detector_for("go").is_ok());
        assert!(detector_for("python").is_ok());
        assert!(matches!(
            detector_for("node"),
            Err(FunctionError::DetectorNotImplemented(r)) if r == "node"
        ));
        assert!(matches!(
            detector_for("springboot"),
            Err(FunctionError::RuntimeNotRecognized(r)) if r == "springboot"
        ));
        assert!(matches!(
            detector_for("cobol"),
            Err(FunctionError::RuntimeNotRecognized(r)) if r == "cobol"
        ));
    }
}
