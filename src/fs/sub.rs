use super::r#trait::{clean, join, DirEntry, FileMetadata, Filesystem};
use anyhow::Result;
use std::sync::Arc;

/// View of a subdirectory of another filesystem as its own root
#[derive(Clone)]
pub struct SubFilesystem {
    base: String,
    inner: Arc<dyn Filesystem>,
}

impl SubFilesystem {
    pub fn new(inner: Arc<dyn Filesystem>, base: &str) -> Self {
        Self {
            base: clean(base),
            inner,
        }
    }

    fn full(&self, path: &str) -> String {
        join(&self.base, path)
    }
}

impl Filesystem for SubFilesystem {
    fn open(&self, path: &str) -> Result<Vec<u8>> {
        self.inner.open(&self.full(path))
    }

    fn stat(&self, path: &str) -> Result<FileMetadata> {
        self.inner.stat(&self.full(path))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let rel = clean(path);
        Ok(self
            .inner
            .read_dir(&self.full(path))?
            .into_iter()
            .map(|e| DirEntry {
                path: join(&rel, &e.name),
                ..e
            })
            .collect())
    }

    fn read_link(&self, path: &str) -> Result<String> {
        self.inner.read_link(&self.full(path))
    }
}
