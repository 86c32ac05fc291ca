use super::{name_from_uri, Repository, DEFAULT_REPOSITORY};
use crate::error::{FunctionError, Result};
use crate::fs::clone_into;
use anyhow::anyhow;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// The set of template repositories a client searches
///
/// Without a remote URI this is the embedded repository followed by every
/// non-hidden directory under `path`, in name order. A remote URI puts the
/// set into single-repository mode: the remote is loaded under the name
/// `default` and is the only repository.
///
/// The set is loaded once and shared by clones; `add`, `rename` and
/// `remove` drop the loaded set so the next lookup sees the change.
#[derive(Clone, Default)]
pub struct Repositories {
    path: Option<PathBuf>,
    remote: Option<String>,
    loaded: Arc<Mutex<Option<Vec<Repository>>>>,
}

impl fmt::Debug for Repositories {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repositories")
            .field("path", &self.path)
            .field("remote", &self.remote)
            .finish()
    }
}

impl Repositories {
    pub fn new(path: Option<PathBuf>, remote: Option<String>) -> Self {
        Self {
            path,
            remote: remote.filter(|r| !r.is_empty()),
            loaded: Arc::default(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_single_repository(&self) -> bool {
        self.remote.is_some()
    }

    /// Every repository, the default one first
    pub fn all(&self) -> Result<Vec<Repository>> {
        let mut loaded = self
            .loaded
            .lock()
            .map_err(|_| anyhow!("repository set lock poisoned"))?;
        if let Some(repos) = loaded.as_ref() {
            return Ok(repos.clone());
        }
        let repos = self.load()?;
        *loaded = Some(repos.clone());
        Ok(repos)
    }

    fn invalidate(&self) {
        if let Ok(mut loaded) = self.loaded.lock() {
            *loaded = None;
        }
    }

    fn load(&self) -> Result<Vec<Repository>> {
        if let Some(uri) = &self.remote {
            return Ok(vec![Repository::from_uri(Some(DEFAULT_REPOSITORY), uri)?]);
        }

        let mut repos = vec![Repository::embedded()?];
        let Some(path) = self.path.as_deref() else {
            return Ok(repos);
        };
        if !path.is_dir() {
            debug!(path = %path.display(), "repositories path does not exist");
            return Ok(repos);
        }

        let mut dirs = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| FunctionError::io(path, e))? {
            let entry = entry.map_err(|e| FunctionError::io(path, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || !entry.path().is_dir() {
                continue;
            }
            dirs.push((name, entry.path()));
        }
        dirs.sort();

        for (name, dir) in dirs {
            repos.push(Repository::from_uri(Some(&name), &dir.to_string_lossy())?);
        }
        Ok(repos)
    }

    pub fn get(&self, name: &str) -> Result<Repository> {
        self.all()?
            .into_iter()
            .find(|r| r.name == name)
            .ok_or_else(|| FunctionError::RepositoryNotFound(name.to_string()))
    }

    /// Repository names, the default one first
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self.all()?.into_iter().map(|r| r.name).collect())
    }

    /// Sorted union of the runtimes of every repository
    pub fn runtimes(&self) -> Result<Vec<String>> {
        let mut runtimes = BTreeSet::new();
        for repo in self.all()? {
            runtimes.extend(repo.runtimes.into_iter().map(|r| r.name));
        }
        Ok(runtimes.into_iter().collect())
    }

    /// Clone `uri` into the repositories path. The name defaults to the
    /// last segment of the URI. Returns the name used.
    pub fn add(&self, name: Option<&str>, uri: &str) -> Result<String> {
        let base = self.managed_path()?;
        let name = match name.filter(|n| !n.is_empty()) {
            Some(n) => n.to_string(),
            None => name_from_uri(uri),
        };
        if name == DEFAULT_REPOSITORY {
            return Err(FunctionError::RepositoryExists(name));
        }

        let dest = base.join(&name);
        if dest.exists() {
            return Err(FunctionError::RepositoryExists(name));
        }
        fs::create_dir_all(base).map_err(|e| FunctionError::io(base, e))?;
        clone_into(uri, &dest)?;

        // A clone that does not load as a repository is not kept.
        if let Err(e) = Repository::from_uri(Some(&name), &dest.to_string_lossy()) {
            let _ = fs::remove_dir_all(&dest);
            return Err(e);
        }
        self.invalidate();
        info!(repository = %name, uri, "added template repository");
        Ok(name)
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        let base = self.managed_path()?;
        let src = base.join(from);
        let dest = base.join(to);
        if from == DEFAULT_REPOSITORY || !src.is_dir() {
            return Err(FunctionError::RepositoryNotFound(from.to_string()));
        }
        if to == DEFAULT_REPOSITORY || dest.exists() {
            return Err(FunctionError::RepositoryExists(to.to_string()));
        }
        fs::rename(&src, &dest).map_err(|e| FunctionError::io(&src, e))?;
        self.invalidate();
        info!(from, to, "renamed template repository");
        Ok(())
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        let base = self.managed_path()?;
        let dir = base.join(name);
        if name == DEFAULT_REPOSITORY || name.is_empty() || !dir.is_dir() {
            return Err(FunctionError::RepositoryNotFound(name.to_string()));
        }
        fs::remove_dir_all(&dir).map_err(|e| FunctionError::io(&dir, e))?;
        self.invalidate();
        info!(repository = %name, "removed template repository");
        Ok(())
    }

    fn managed_path(&self) -> Result<&Path> {
        if self.remote.is_some() {
            return Err(anyhow!("repositories cannot be managed in single-repository mode").into());
        }
        self.path
            .as_deref()
            .ok_or_else(|| anyhow!("repositories path is not defined").into())
    }
}
