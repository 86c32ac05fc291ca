//! The persisted function descriptor (`func.yaml`)

use super::migrations;
use super::{BUILT_IMAGE_FILE, DEFAULT_PVC_SIZE, DEFAULT_TEMPLATE, FUNCTION_FILE, RUN_DATA_DIR};
use crate::error::{FunctionError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A function: one descriptor plus the source tree rooted beside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Function {
    /// Schema version; drives the migration chain on load
    #[serde(default)]
    pub spec_version: String,

    /// Absolute path of the project directory (not persisted)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub runtime: String,

    /// Template the function was created from (not persisted)
    #[serde(skip)]
    pub template: String,

    /// Registry namespace used to derive `image` when it is empty
    #[serde(default)]
    pub registry: String,

    /// Explicit image reference; always wins over the registry-derived one
    #[serde(default)]
    pub image: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_digest: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    /// Invocation hint: "http" (default) or "cloudevent"
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub invoke: String,

    #[serde(default, skip_serializing_if = "BuildSpec::is_empty")]
    pub build: BuildSpec,

    #[serde(default, skip_serializing_if = "RunSpec::is_empty")]
    pub run: RunSpec,

    #[serde(default, skip_serializing_if = "DeploySpec::is_empty")]
    pub deploy: DeploySpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSpec {
    #[serde(default, skip_serializing_if = "Git::is_empty")]
    pub git: Git,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub builder_images: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buildpacks: Vec<String>,

    /// Builder short name: "pack", "s2i" or "host"
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub builder: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_envs: Vec<Env>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pvc_size: String,

    /// Image produced by the last build, read from the run-data directory
    #[serde(skip)]
    pub image: String,
}

impl BuildSpec {
    pub fn is_empty(&self) -> bool {
        self.git.is_empty()
            && self.builder_images.is_empty()
            && self.buildpacks.is_empty()
            && self.builder.is_empty()
            && self.build_envs.is_empty()
            && self.pvc_size.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Git {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_dir: Option<String>,
}

impl Git {
    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.revision.is_none() && self.context_dir.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<Env>,

    /// Seconds to wait for a local run to become ready; 0 means client default
    #[serde(default, skip_serializing_if = "is_zero")]
    pub start_timeout: u64,
}

impl RunSpec {
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty() && self.envs.is_empty() && self.start_timeout == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploySpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Image reference most recently handed to the deployer
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Options::is_empty")]
    pub options: Options,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,

    #[serde(default, skip_serializing_if = "HealthEndpoints::is_empty")]
    pub health_endpoints: HealthEndpoints,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account_name: String,
}

impl DeploySpec {
    pub fn is_empty(&self) -> bool {
        self.namespace.is_empty()
            && self.image.is_empty()
            && self.annotations.is_empty()
            && self.options.is_empty()
            && self.labels.is_empty()
            && self.health_endpoints.is_empty()
            && self.service_account_name.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthEndpoints {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub liveness: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub readiness: String,
}

impl HealthEndpoints {
    pub fn is_empty(&self) -> bool {
        self.liveness.is_empty() && self.readiness.is_empty()
    }
}

/// An environment variable; `value` may reference `{{ env:NAME }}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Env {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Env {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            value: Some(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PersistentVolumeClaim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_dir: Option<EmptyDir>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaim {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_name: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmptyDir {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub medium: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_limit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Options {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesOptions>,
}

impl Options {
    pub fn is_empty(&self) -> bool {
        self.scale.is_none() && self.resources.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScaleOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilization: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcesOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<ResourceRequests>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceLimits>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequests {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<i64>,
}

fn is_zero(v: &u64) -> bool {
    *v == 0
}

impl Function {
    /// A fresh, unsaved descriptor with the defaults applied to `defaults`.
    pub fn new_with(mut defaults: Function) -> Function {
        if defaults.spec_version.is_empty() {
            defaults.spec_version = migrations::last_spec_version().to_string();
        }
        if defaults.template.is_empty() {
            defaults.template = DEFAULT_TEMPLATE.to_string();
        }
        if defaults.build.pvc_size.is_empty() {
            defaults.build.pvc_size = DEFAULT_PVC_SIZE.to_string();
        }
        defaults
    }

    /// Load the descriptor at `root`, applying pending migrations.
    ///
    /// Fails with [`FunctionError::NotInitialized`] when `root` holds no
    /// descriptor.
    pub fn load(root: impl AsRef<Path>) -> Result<Function> {
        let root = absolute(root.as_ref())?;
        let path = root.join(FUNCTION_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(FunctionError::NotInitialized(root))
            }
            Err(e) => return Err(FunctionError::io(&path, e)),
        };
        let mut f = Self::parse(&root, &content)?;
        f.build.image = read_run_data(&root, BUILT_IMAGE_FILE);
        Ok(f)
    }

    /// Load the descriptor at `root`, or an empty descriptor rooted there
    /// if the directory holds no function yet.
    pub fn load_or_default(root: impl AsRef<Path>) -> Result<Function> {
        match Self::load(root.as_ref()) {
            Err(FunctionError::NotInitialized(root)) => Ok(Function {
                root,
                ..Default::default()
            }),
            other => other,
        }
    }

    /// Parse descriptor text read from `root`, migrating it to the latest
    /// schema version.
    pub fn parse(root: &Path, content: &str) -> Result<Function> {
        let parse_error = |e: serde_yaml::Error| FunctionError::Parse {
            path: root.join(FUNCTION_FILE),
            message: e.to_string(),
        };
        let raw: serde_yaml::Value = serde_yaml::from_str(content).map_err(parse_error)?;
        let raw = match raw {
            serde_yaml::Value::Null => serde_yaml::Value::Mapping(Default::default()),
            other => other,
        };
        let mut f: Function = serde_yaml::from_value(raw.clone()).map_err(parse_error)?;
        f.root = root.to_path_buf();

        let (migrated, dirty) = migrations::migrate(f, &raw)?;
        if dirty {
            debug!(root = %root.display(), version = %migrated.spec_version, "descriptor migrated");
        }
        Ok(migrated)
    }

    /// Persist the descriptor to `<root>/func.yaml`.
    ///
    /// Writing a descriptor identical to the one on disk is a no-op so the
    /// file's modification time only moves on real changes.
    pub fn write(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(FunctionError::RootRequired);
        }
        self.validate()?;

        let path = self.root.join(FUNCTION_FILE);
        if let Ok(existing) = fs::read_to_string(&path) {
            if let Ok(on_disk) = Self::parse(&self.root, &existing) {
                if on_disk.persisted_eq(self) {
                    return Ok(());
                }
            }
        }

        let yaml = serde_yaml::to_string(self).map_err(|e| FunctionError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        fs::write(&path, yaml).map_err(|e| FunctionError::io(&path, e))
    }

    fn persisted_eq(&self, other: &Function) -> bool {
        let strip = |f: &Function| Function {
            root: PathBuf::new(),
            template: String::new(),
            build: BuildSpec {
                image: String::new(),
                ..f.build.clone()
            },
            ..f.clone()
        };
        strip(self) == strip(other)
    }

    /// A function is initialized once it has been stamped with a creation
    /// time, which happens exactly once at create.
    pub fn initialized(&self) -> bool {
        self.created.is_some()
    }

    /// Whether a descriptor file exists at the root
    pub fn exists(&self) -> bool {
        !self.root.as_os_str().is_empty() && self.root.join(FUNCTION_FILE).exists()
    }

    /// The image reference to build, push and deploy: `image` when set,
    /// otherwise derived from `registry` and `name`.
    pub fn effective_image(&self) -> Result<String> {
        if !self.image.is_empty() {
            return Ok(self.image.clone());
        }
        super::image::image_name(&self.registry, &self.name)
    }

    /// `image` pinned to `image_digest` when a digest is recorded
    pub fn image_with_digest(&self) -> String {
        super::image::with_digest(&self.image, &self.image_digest)
    }

    /// Directory for local run-time data (`<root>/.func`)
    pub fn run_data_dir(&self) -> PathBuf {
        self.root.join(RUN_DATA_DIR)
    }

    /// Record the image produced by the most recent build.
    pub fn write_built_image(&self, image: &str) -> Result<()> {
        let dir = self.run_data_dir();
        fs::create_dir_all(&dir).map_err(|e| FunctionError::io(&dir, e))?;
        let path = dir.join(BUILT_IMAGE_FILE);
        fs::write(&path, image).map_err(|e| FunctionError::io(&path, e))
    }
}

fn read_run_data(root: &Path, file: &str) -> String {
    fs::read_to_string(root.join(RUN_DATA_DIR).join(file))
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Make `path` absolute against the current directory without touching
/// the filesystem.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| FunctionError::io(path, e))?;
    let joined = if path.as_os_str().is_empty() || path == Path::new(".") {
        cwd
    } else {
        cwd.join(path)
    };
    Ok(normalize(&joined))
}

fn normalize(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Name derived from the final segment of a path
pub fn name_from_path(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(root: &Path) -> Function {
        Function::new_with(Function {
            root: root.to_path_buf(),
            name: "hello".to_string(),
            runtime: "go".to_string(),
            registry: "example.com/alice".to_string(),
            created: Some(Utc::now()),
            ..Default::default()
        })
    }

    #[test]
    fn test_load_missing_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        match Function::load(dir.path()) {
            Err(FunctionError::NotInitialized(path)) => assert_eq!(path, dir.path()),
            other => panic!("Expected NotInitialized, got {:?}", other),
        }
        let f = Function::load_or_default(dir.path()).unwrap();
        assert!(!f.initialized());
        assert_eq!(f.root, dir.path());
    }

    #[test]
    fn test_write_then_load_is_identity() {
        let dir = TempDir::new().unwrap();
        let f = sample(dir.path());
        f.write().unwrap();

        let loaded = Function::load(dir.path()).unwrap();
        assert_eq!(loaded.name, "hello");
        assert_eq!(loaded.spec_version, migrations::last_spec_version());
        assert!(loaded.persisted_eq(&f));
    }

    #[test]
    fn test_unchanged_write_does_not_touch_file() {
        let dir = TempDir::new().unwrap();
        let f = sample(dir.path());
        f.write().unwrap();
        let path = dir.path().join(FUNCTION_FILE);
        let past = filetime::FileTime::from_unix_time(1_000_000, 0);
        filetime::set_file_mtime(&path, past).unwrap();

        Function::load(dir.path()).unwrap().write().unwrap();
        let mtime = filetime::FileTime::from_last_modification_time(&fs::metadata(&path).unwrap());
        assert_eq!(mtime, past);
    }

    #[test]
    fn test_yaml_keys_are_camel_case() {
        let dir = TempDir::new().unwrap();
        let mut f = sample(dir.path());
        f.build.builder_images.insert("pack".into(), "example.com/builder".into());
        f.deploy.health_endpoints.readiness = "/ready".into();
        f.write().unwrap();

        let yaml = fs::read_to_string(dir.path().join(FUNCTION_FILE)).unwrap();
        assert!(yaml.contains("specVersion:"));
        assert!(yaml.contains("builderImages:"));
        assert!(yaml.contains("healthEndpoints:"));
        assert!(!yaml.contains("root"));
        assert!(!yaml.contains("template"));
    }

    #[test]
    fn test_effective_image_precedence() {
        let dir = TempDir::new().unwrap();
        let mut f = sample(dir.path());
        assert_eq!(f.effective_image().unwrap(), "example.com/alice/hello:latest");

        f.image = "registry2.example.com/bob/hello:v1".to_string();
        f.registry = "other.example.com/carol".to_string();
        assert_eq!(f.effective_image().unwrap(), "registry2.example.com/bob/hello:v1");
    }

    #[test]
    fn test_built_image_is_read_from_run_data() {
        let dir = TempDir::new().unwrap();
        let f = sample(dir.path());
        f.write().unwrap();
        f.write_built_image("example.com/alice/hello:latest").unwrap();

        let loaded = Function::load(dir.path()).unwrap();
        assert_eq!(loaded.build.image, "example.com/alice/hello:latest");
    }

    #[test]
    fn test_name_from_path() {
        assert_eq!(name_from_path(Path::new("/tmp/fns/foo")), "foo");
        assert_eq!(name_from_path(Path::new("/tmp/fns/foo/")), "foo");
    }

    #[test]
    fn test_absolute_normalizes() {
        let abs = absolute(Path::new("a/./b/../c")).unwrap();
        assert!(abs.is_absolute());
        assert!(abs.ends_with("a/c"));
    }
}
