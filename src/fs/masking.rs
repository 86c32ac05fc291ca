use super::r#trait::{clean, not_found, DirEntry, FileMetadata, Filesystem};
use anyhow::Result;
use std::sync::Arc;

type Mask = dyn Fn(&str) -> bool + Send + Sync;

/// Filesystem that hides every path for which the mask returns true
pub struct MaskingFilesystem {
    inner: Arc<dyn Filesystem>,
    mask: Box<Mask>,
}

impl MaskingFilesystem {
    pub fn new(
        inner: Arc<dyn Filesystem>,
        mask: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner,
            mask: Box::new(mask),
        }
    }

    fn masked(&self, path: &str) -> bool {
        (self.mask)(&clean(path))
    }
}

impl Filesystem for MaskingFilesystem {
    fn open(&self, path: &str) -> Result<Vec<u8>> {
        if self.masked(path) {
            return Err(not_found(path));
        }
        self.inner.open(path)
    }

    fn stat(&self, path: &str) -> Result<FileMetadata> {
        if self.masked(path) {
            return Err(not_found(path));
        }
        self.inner.stat(path)
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        if self.masked(path) {
            return Err(not_found(path));
        }
        Ok(self
            .inner
            .read_dir(path)?
            .into_iter()
            .filter(|e| !self.masked(&e.path))
            .collect())
    }

    fn read_link(&self, path: &str) -> Result<String> {
        if self.masked(path) {
            return Err(not_found(path));
        }
        self.inner.read_link(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFilesystem;

    #[test]
    fn test_masked_entries_are_invisible() {
        let mem = MemoryFilesystem::new();
        mem.add_file("http/manifest.yaml", "invoke: http");
        mem.add_file("http/handle.go", "package function");

        let fs = MaskingFilesystem::new(Arc::new(mem), |p| p.ends_with("manifest.yaml"));
        assert!(!fs.exists("http/manifest.yaml"));
        assert!(fs.exists("http/handle.go"));

        let names: Vec<_> = fs
            .read_dir("http")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["handle.go"]);
    }
}
