//! Git-backed template filesystem.
//!
//! Repositories are fetched with the `git` executable into a private
//! temporary checkout which lives as long as the filesystem value.

use super::os::OsFilesystem;
use super::r#trait::{DirEntry, FileMetadata, Filesystem};
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;
use tracing::debug;

/// Split `uri#ref` into the clone URI and an optional branch or tag
pub fn split_reference(uri: &str) -> (&str, Option<&str>) {
    match uri.split_once('#') {
        Some((base, reference)) if !reference.is_empty() => (base, Some(reference)),
        Some((base, _)) => (base, None),
        None => (uri, None),
    }
}

/// Shallow clone `uri` (optionally `uri#ref`) into `dest`
pub fn clone_into(uri: &str, dest: &Path) -> Result<()> {
    let (base, reference) = split_reference(uri);
    let mut cmd = Command::new("git");
    cmd.arg("clone").arg("--quiet").arg("--depth").arg("1");
    if let Some(reference) = reference {
        cmd.arg("--branch").arg(reference);
    }
    cmd.arg(base).arg(dest);

    debug!(uri = base, dest = %dest.display(), "cloning template repository");
    let output = cmd
        .output()
        .context("Failed to execute git; is it installed and on PATH?")?;
    if !output.status.success() {
        bail!(
            "git clone of '{}' failed: {}",
            base,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

/// Filesystem over a shallow clone of a remote git repository
pub struct GitFilesystem {
    uri: String,
    inner: OsFilesystem,
    _checkout: TempDir,
}

impl GitFilesystem {
    pub fn fetch(uri: &str) -> Result<Self> {
        let checkout = tempfile::Builder::new()
            .prefix("funcbox-repo-")
            .tempdir()
            .context("Failed to create checkout directory")?;
        let dest = checkout.path().join("repo");
        clone_into(uri, &dest)?;
        Ok(Self {
            uri: uri.to_string(),
            inner: OsFilesystem::new(dest),
            _checkout: checkout,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl Filesystem for GitFilesystem {
    fn open(&self, path: &str) -> Result<Vec<u8>> {
        self.inner.open(path)
    }

    fn stat(&self, path: &str) -> Result<FileMetadata> {
        self.inner.stat(path)
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        Ok(self
            .inner
            .read_dir(path)?
            .into_iter()
            .filter(|e| e.name != ".git")
            .collect())
    }

    fn read_link(&self, path: &str) -> Result<String> {
        self.inner.read_link(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_reference() {
        assert_eq!(
            split_reference("https://example.com/repo.git#main"),
            ("https://example.com/repo.git", Some("main"))
        );
        assert_eq!(
            split_reference("https://example.com/repo.git#"),
            ("https://example.com/repo.git", None)
        );
        assert_eq!(split_reference("file:///tmp/repo"), ("file:///tmp/repo", None));
    }

    #[test]
    fn test_clone_failure_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = clone_into("file:///definitely/not/a/repository", &dir.path().join("x"));
        assert!(result.is_err());
    }
}
