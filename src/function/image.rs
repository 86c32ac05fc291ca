use super::DEFAULT_REGISTRY;
use crate::error::{FunctionError, Result};

/// Derive a fully qualified image reference from a registry namespace and
/// a function name.
///
/// A single-segment registry (`alice`) is taken to be a Docker Hub
/// account; two or three segments are used as given.
pub fn image_name(registry: &str, name: &str) -> Result<String> {
    let registry = registry.trim_end_matches('/');
    if registry.is_empty() {
        return Err(FunctionError::RegistryRequired);
    }
    if name.is_empty() {
        return Err(FunctionError::NameRequired);
    }

    match registry.split('/').count() {
        1 => Ok(format!("{}/{}/{}:latest", DEFAULT_REGISTRY, registry, name)),
        2 | 3 => Ok(format!("{}/{}:latest", registry, name)),
        _ => Err(FunctionError::RegistryInvalid(registry.to_string())),
    }
}

/// Pin `image` to `digest`, replacing any digest it already carries
pub fn with_digest(image: &str, digest: &str) -> String {
    if digest.is_empty() {
        return image.to_string();
    }
    let base = image.split_once('@').map(|(base, _)| base).unwrap_or(image);
    format!("{}@{}", base, digest)
}
