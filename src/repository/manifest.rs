use crate::fs::{is_not_found, join, Filesystem};
use crate::function::{Env, HealthEndpoints};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Manifest file name at repository, runtime and template level
pub const MANIFEST_FILE: &str = "manifest.yaml";

/// Defaults a repository, runtime or template contributes to functions
/// created from it. Deeper levels override shallower ones.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub builder_images: BTreeMap<String, String>,
    #[serde(default)]
    pub buildpacks: Vec<String>,
    #[serde(default)]
    pub health_endpoints: HealthEndpoints,
    #[serde(default)]
    pub build_envs: Vec<Env>,
    #[serde(default)]
    pub run_envs: Vec<Env>,
    #[serde(default)]
    pub invoke: String,
}

impl Manifest {
    /// This manifest with `other`'s non-empty values laid over it
    pub fn overlay(&self, other: &Manifest) -> Manifest {
        let mut merged = self.clone();
        if !other.builder_images.is_empty() {
            merged.builder_images = other.builder_images.clone();
        }
        if !other.buildpacks.is_empty() {
            merged.buildpacks = other.buildpacks.clone();
        }
        if !other.health_endpoints.liveness.is_empty() {
            merged.health_endpoints.liveness = other.health_endpoints.liveness.clone();
        }
        if !other.health_endpoints.readiness.is_empty() {
            merged.health_endpoints.readiness = other.health_endpoints.readiness.clone();
        }
        if !other.build_envs.is_empty() {
            merged.build_envs = other.build_envs.clone();
        }
        if !other.run_envs.is_empty() {
            merged.run_envs = other.run_envs.clone();
        }
        if !other.invoke.is_empty() {
            merged.invoke = other.invoke.clone();
        }
        merged
    }
}

/// Repository-level manifest: the shared defaults plus repository settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryManifest {
    #[serde(flatten)]
    pub defaults: Manifest,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Sub-path holding the runtimes; the repository root when empty
    #[serde(default)]
    pub templates: String,
}

/// Read `<dir>/manifest.yaml` from `fs`; a missing file yields the default
pub fn read_manifest<T>(fs: &dyn Filesystem, dir: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de> + Default,
{
    let path = join(dir, MANIFEST_FILE);
    match fs.read_to_string(&path) {
        Ok(content) if content.trim().is_empty() => Ok(T::default()),
        Ok(content) => serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse manifest '{}'", path)),
        Err(e) if is_not_found(&e) => Ok(T::default()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFilesystem;

    #[test]
    fn test_overlay_prefers_deeper_values() {
        let repo = Manifest {
            buildpacks: vec!["a".into()],
            invoke: "http".into(),
            health_endpoints: HealthEndpoints {
                liveness: "/live".into(),
                readiness: "/ready".into(),
            },
            ..Default::default()
        };
        let template = Manifest {
            invoke: "cloudevent".into(),
            health_endpoints: HealthEndpoints {
                liveness: "/alive".into(),
                readiness: String::new(),
            },
            ..Default::default()
        };
        let merged = repo.overlay(&template);
        assert_eq!(merged.invoke, "cloudevent");
        assert_eq!(merged.buildpacks, vec!["a"]);
        assert_eq!(merged.health_endpoints.liveness, "/alive");
        assert_eq!(merged.health_endpoints.readiness, "/ready");
    }

    #[test]
    fn test_read_manifest() {
        let fs = MemoryFilesystem::new();
        fs.add_file(
            "manifest.yaml",
            "name: custom\ntemplates: src\nbuildpacks: [x]\n",
        );
        let repo: RepositoryManifest = read_manifest(&fs, ".").unwrap();
        assert_eq!(repo.name, "custom");
        assert_eq!(repo.templates, "src");
        assert_eq!(repo.defaults.buildpacks, vec!["x"]);

        let missing: Manifest = read_manifest(&fs, "go").unwrap();
        assert_eq!(missing, Manifest::default());
    }

    #[test]
    fn test_malformed_manifest_is_error() {
        let fs = MemoryFilesystem::new();
        fs.add_file("go/manifest.yaml", "buildpacks: 12\n");
        assert!(read_manifest::<Manifest>(&fs, "go").is_err());
    }
}
