//! Template repositories
//!
//! A repository is a [`Filesystem`] laid out as `<runtime>/<template>/...`,
//! optionally below a sub-path its `manifest.yaml` names. Repositories come
//! from the embedded archive, from directories under the repositories
//! path, or from a git URI.

mod embedded;
mod manifest;
mod repositories;
mod templates;

pub use embedded::embedded_filesystem;
pub use manifest::{read_manifest, Manifest, RepositoryManifest, MANIFEST_FILE};
pub use repositories::Repositories;
pub use templates::{split_template_name, Templates};

use crate::error::{FunctionError, Result};
use crate::fs::{
    copy_from_fs, join, DirEntry, Filesystem, GitFilesystem, MaskingFilesystem, OsFilesystem,
    SubFilesystem,
};
use crate::function::Function;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Name of the repository compiled into the binary
pub const DEFAULT_REPOSITORY: &str = "default";

/// Runtime directory reserved for the TLS trust bundle
const CERTS_DIR: &str = "certs";

/// Template directory reserved for scaffolding
const SCAFFOLDING_DIR: &str = "scaffolding";

/// A loaded template repository
#[derive(Clone)]
pub struct Repository {
    pub name: String,
    uri: Option<String>,
    fs: Arc<dyn Filesystem>,
    pub manifest: RepositoryManifest,
    pub runtimes: Vec<Runtime>,
}

/// A runtime within a repository
#[derive(Clone)]
pub struct Runtime {
    pub name: String,
    pub templates: Vec<Template>,
    pub manifest: Manifest,
}

/// A template: a directory of starter files plus its effective manifest
#[derive(Clone)]
pub struct Template {
    pub name: String,
    pub runtime: String,
    pub repository: String,
    fs: Arc<dyn Filesystem>,
    /// Repository, runtime and template manifests merged in that order
    pub manifest: Manifest,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("name", &self.name)
            .field("uri", &self.uri)
            .field(
                "runtimes",
                &self.runtimes.iter().map(|r| &r.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl std::fmt::Debug for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name)
            .field("runtime", &self.runtime)
            .field("repository", &self.repository)
            .finish()
    }
}

impl Repository {
    /// The repository compiled into the binary
    pub fn embedded() -> Result<Repository> {
        Self::from_filesystem(DEFAULT_REPOSITORY, None, embedded_filesystem()?)
    }

    /// Load a repository from a local directory, a `file://` URI, or a git
    /// URI (optionally `uri#ref`). An explicit `name` wins over the
    /// manifest's, which wins over one derived from the URI.
    pub fn from_uri(name: Option<&str>, uri: &str) -> Result<Repository> {
        let local = uri.strip_prefix("file://").unwrap_or(uri);
        let fs: Arc<dyn Filesystem> = if Path::new(local).is_dir() {
            Arc::new(OsFilesystem::new(local))
        } else {
            Arc::new(
                GitFilesystem::fetch(uri)
                    .with_context(|| format!("failed to get repository from URI ({:?})", uri))?,
            )
        };
        let derived = name_from_uri(uri);
        let mut repo = Self::from_filesystem(&derived, Some(uri.to_string()), fs)?;
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            repo.rename(name);
        }
        Ok(repo)
    }

    /// Load a repository over an arbitrary filesystem. `fallback_name` is
    /// used unless the manifest names the repository.
    pub fn from_filesystem(
        fallback_name: &str,
        uri: Option<String>,
        root: Arc<dyn Filesystem>,
    ) -> Result<Repository> {
        let manifest: RepositoryManifest = read_manifest(root.as_ref(), ".")?;
        let name = if manifest.name.is_empty() {
            fallback_name.to_string()
        } else {
            manifest.name.clone()
        };

        let fs: Arc<dyn Filesystem> = if manifest.templates.is_empty() || manifest.templates == "." {
            root
        } else {
            if !root.is_dir(&manifest.templates) {
                return Err(anyhow::anyhow!(
                    "templates path '{}' does not exist in repository '{}'",
                    manifest.templates,
                    name
                )
                .into());
            }
            Arc::new(SubFilesystem::new(root, &manifest.templates))
        };

        let runtimes = load_runtimes(&fs, &name, &manifest.defaults)?;
        debug!(repository = %name, runtimes = runtimes.len(), "loaded template repository");
        Ok(Repository {
            name,
            uri,
            fs,
            manifest,
            runtimes,
        })
    }

    fn rename(&mut self, name: &str) {
        self.name = name.to_string();
        for runtime in &mut self.runtimes {
            for template in &mut runtime.templates {
                template.repository = name.to_string();
            }
        }
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    /// Filesystem rooted at the repository's runtimes
    pub fn filesystem(&self) -> Arc<dyn Filesystem> {
        self.fs.clone()
    }

    pub fn runtime(&self, name: &str) -> Option<&Runtime> {
        self.runtimes.iter().find(|r| r.name == name)
    }

    /// The named template, distinguishing a missing runtime from a missing
    /// template
    pub fn template(&self, runtime: &str, name: &str) -> Result<&Template> {
        let rt = self
            .runtime(runtime)
            .ok_or_else(|| FunctionError::RuntimeNotFound(runtime.to_string()))?;
        rt.templates
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| FunctionError::TemplateNotFound {
                runtime: runtime.to_string(),
                template: name.to_string(),
            })
    }

    /// Templates of `runtime`; empty if the repository lacks it
    pub fn templates(&self, runtime: &str) -> Vec<&Template> {
        self.runtime(runtime)
            .map(|r| r.templates.iter().collect())
            .unwrap_or_default()
    }

    /// Copy the whole repository to `dest`
    pub fn write(&self, dest: &Path) -> Result<()> {
        copy_from_fs(".", dest, self.fs.as_ref()).map_err(FunctionError::Other)
    }
}

impl Template {
    /// `<repository>/<name>`
    pub fn fullname(&self) -> String {
        format!("{}/{}", self.repository, self.name)
    }

    /// Write the template's files into the function's root and apply the
    /// manifest's values wherever the function has none of its own.
    pub fn write(&self, f: &mut Function) -> Result<()> {
        let m = &self.manifest;
        if f.build.builder_images.is_empty() {
            f.build.builder_images = m.builder_images.clone();
        }
        if f.build.buildpacks.is_empty() {
            f.build.buildpacks = m.buildpacks.clone();
        }
        if f.build.build_envs.is_empty() {
            f.build.build_envs = m.build_envs.clone();
        }
        if f.run.envs.is_empty() {
            f.run.envs = m.run_envs.clone();
        }
        if f.deploy.health_endpoints.liveness.is_empty() {
            f.deploy.health_endpoints.liveness = m.health_endpoints.liveness.clone();
        }
        if f.deploy.health_endpoints.readiness.is_empty() {
            f.deploy.health_endpoints.readiness = m.health_endpoints.readiness.clone();
        }
        if f.invoke.is_empty() && m.invoke != "http" {
            f.invoke = m.invoke.clone();
        }

        let masked = MaskingFilesystem::new(self.fs.clone(), |path| {
            path == MANIFEST_FILE
        });
        copy_from_fs(".", &f.root, &masked).map_err(FunctionError::Other)?;
        debug!(template = %self.fullname(), root = %f.root.display(), "wrote template");
        Ok(())
    }
}

fn visible_dirs(fs: &dyn Filesystem, path: &str, reserved: &str) -> Result<Vec<DirEntry>> {
    Ok(fs
        .read_dir(path)?
        .into_iter()
        .filter(|e| e.is_dir() && !e.is_hidden() && e.name != reserved)
        .collect())
}

fn load_runtimes(fs: &Arc<dyn Filesystem>, repository: &str, defaults: &Manifest) -> Result<Vec<Runtime>> {
    let mut runtimes = Vec::new();
    for entry in visible_dirs(fs.as_ref(), ".", CERTS_DIR)? {
        let runtime_manifest = defaults.overlay(&read_manifest(fs.as_ref(), &entry.name)?);

        let mut templates = Vec::new();
        for tpl in visible_dirs(fs.as_ref(), &entry.name, SCAFFOLDING_DIR)? {
            let path = join(&entry.name, &tpl.name);
            let manifest = runtime_manifest.overlay(&read_manifest(fs.as_ref(), &path)?);
            templates.push(Template {
                name: tpl.name.clone(),
                runtime: entry.name.clone(),
                repository: repository.to_string(),
                fs: Arc::new(SubFilesystem::new(fs.clone(), &path)),
                manifest,
            });
        }

        runtimes.push(Runtime {
            name: entry.name.clone(),
            templates,
            manifest: runtime_manifest,
        });
    }
    Ok(runtimes)
}

/// Last path segment of a URI with any `.git` suffix or `#ref` removed
pub fn name_from_uri(uri: &str) -> String {
    let base = uri.split('#').next().unwrap_or(uri);
    let last = base
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(base);
    let name = last.trim_end_matches(".git");
    if name.is_empty() {
        DEFAULT_REPOSITORY.to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFilesystem;
    use tempfile::TempDir;

    fn fixture() -> Arc<dyn Filesystem> {
        let fs = MemoryFilesystem::new();
        fs.add_file("manifest.yaml", "healthEndpoints:\n  liveness: /live\n  readiness: /ready\n");
        fs.add_file("certs/ca.crt", "cert");
        fs.add_file(".hidden/x", "");
        fs.add_file("go/manifest.yaml", "buildpacks: [go-pack]\n");
        fs.add_file("go/http/handle.go", "package function\n");
        fs.add_file("go/http/manifest.yaml", "invoke: http\n");
        fs.add_file("go/events/handle.go", "package function\n");
        fs.add_file("go/events/manifest.yaml", "invoke: cloudevent\nhealthEndpoints:\n  readiness: /ok\n");
        fs.add_file("go/scaffolding/instanced-http/main.go", "package main\n");
        Arc::new(fs)
    }

    #[test]
    fn test_runtimes_and_templates_skip_reserved() {
        let repo = Repository::from_filesystem("custom", None, fixture()).unwrap();
        let runtimes: Vec<_> = repo.runtimes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(runtimes, vec!["go"]);
        let templates: Vec<_> = repo.templates("go").iter().map(|t| t.name.as_str()).collect();
        assert_eq!(templates, vec!["events", "http"]);
    }

    #[test]
    fn test_manifests_are_denormalized() {
        let repo = Repository::from_filesystem("custom", None, fixture()).unwrap();
        let events = repo.template("go", "events").unwrap();
        assert_eq!(events.manifest.invoke, "cloudevent");
        assert_eq!(events.manifest.buildpacks, vec!["go-pack"]);
        assert_eq!(events.manifest.health_endpoints.liveness, "/live");
        assert_eq!(events.manifest.health_endpoints.readiness, "/ok");
    }

    #[test]
    fn test_template_lookup_errors() {
        let repo = Repository::from_filesystem("custom", None, fixture()).unwrap();
        assert!(matches!(
            repo.template("rust", "http"),
            Err(FunctionError::RuntimeNotFound(_))
        ));
        assert!(matches!(
            repo.template("go", "grpc"),
            Err(FunctionError::TemplateNotFound { .. })
        ));
    }

    #[test]
    fn test_template_write_masks_manifest_and_applies_defaults() {
        let repo = Repository::from_filesystem("custom", None, fixture()).unwrap();
        let dir = TempDir::new().unwrap();
        let mut f = Function {
            root: dir.path().to_path_buf(),
            runtime: "go".into(),
            ..Default::default()
        };
        f.deploy.health_endpoints.readiness = "/mine".into();

        repo.template("go", "events").unwrap().write(&mut f).unwrap();
        assert!(dir.path().join("handle.go").exists());
        assert!(!dir.path().join("manifest.yaml").exists());
        assert_eq!(f.invoke, "cloudevent");
        assert_eq!(f.build.buildpacks, vec!["go-pack"]);
        assert_eq!(f.deploy.health_endpoints.liveness, "/live");
        assert_eq!(f.deploy.health_endpoints.readiness, "/mine");
    }

    #[test]
    fn test_templates_subpath() {
        let fs = MemoryFilesystem::new();
        fs.add_file("manifest.yaml", "name: nested\ntemplates: src\n");
        fs.add_file("src/node/http/index.js", "");
        let repo = Repository::from_filesystem("x", None, Arc::new(fs)).unwrap();
        assert_eq!(repo.name, "nested");
        assert!(repo.template("node", "http").is_ok());
    }

    #[test]
    fn test_embedded_repository() {
        let repo = Repository::embedded().unwrap();
        assert_eq!(repo.name, DEFAULT_REPOSITORY);
        assert!(repo.template("go", "http").is_ok());
        assert!(repo.runtime("certs").is_none());
        assert!(repo
            .templates("go")
            .iter()
            .all(|t| t.name != "scaffolding"));
    }

    #[test]
    fn test_name_from_uri() {
        assert_eq!(name_from_uri("https://example.com/org/templates.git"), "templates");
        assert_eq!(name_from_uri("https://example.com/org/templates.git#main"), "templates");
        assert_eq!(name_from_uri("git@example.com:org/extra.git"), "extra");
        assert_eq!(name_from_uri("file:///srv/repos/local/"), "local");
    }
}
