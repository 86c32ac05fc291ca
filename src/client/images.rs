//! Default builder images per builder and runtime

use crate::error::{FunctionError, Result};
use crate::function::Function;

pub const PACK_BASE_BUILDER: &str = "ghcr.io/gauron99/builder-jammy-base:latest";
pub const PACK_TINY_BUILDER: &str = "ghcr.io/gauron99/builder-jammy-tiny:latest";

const PACK_IMAGES: &[(&str, &str)] = &[
    ("node", PACK_BASE_BUILDER),
    ("nodejs", PACK_BASE_BUILDER),
    ("typescript", PACK_BASE_BUILDER),
    ("python", PACK_BASE_BUILDER),
    ("rust", PACK_BASE_BUILDER),
    ("springboot", PACK_BASE_BUILDER),
    ("go", PACK_TINY_BUILDER),
    ("quarkus", PACK_TINY_BUILDER),
];

const S2I_IMAGES: &[(&str, &str)] = &[
    ("node", "registry.access.redhat.com/ubi8/nodejs-20-minimal"),
    ("nodejs", "registry.access.redhat.com/ubi8/nodejs-20-minimal"),
    ("typescript", "registry.access.redhat.com/ubi8/nodejs-20-minimal"),
    ("python", "registry.access.redhat.com/ubi8/python-39"),
    ("quarkus", "registry.access.redhat.com/ubi8/openjdk-21"),
    ("go", "registry.access.redhat.com/ubi8/go-toolset"),
];

pub const HOST_BUILDER: &str = "host";
pub const PACK_BUILDER: &str = "pack";
pub const S2I_BUILDER: &str = "s2i";

/// Builder image for `f` under the named builder.
///
/// An image named in the descriptor's `build.builderImages` wins; otherwise
/// the runtime's default for that builder is used. The host builder needs
/// no image and yields an empty string.
pub fn builder_image(f: &Function, builder: &str) -> Result<String> {
    let defaults = match builder {
        PACK_BUILDER => PACK_IMAGES,
        S2I_BUILDER => S2I_IMAGES,
        HOST_BUILDER => return Ok(String::new()),
        other => return Err(FunctionError::UnknownBuilder(other.to_string())),
    };

    if let Some(image) = f.build.builder_images.get(builder) {
        if !image.is_empty() {
            return Ok(image.clone());
        }
    }
    if f.runtime.is_empty() {
        return Err(FunctionError::RuntimeRequired);
    }

    defaults
        .iter()
        .find(|(runtime, _)| *runtime == f.runtime)
        .map(|(_, image)| image.to_string())
        .ok_or_else(|| FunctionError::NoDefaultImage {
            builder: builder.to_string(),
            runtime: f.runtime.clone(),
        })
}
