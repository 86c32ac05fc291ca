use super::r#trait::{clean, not_found, DirEntry, FileMetadata, FileType, Filesystem};
use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone)]
pub enum MemoryEntry {
    File { data: Vec<u8>, mode: u32 },
    Dir { mode: u32 },
    Symlink { target: String },
}

impl MemoryEntry {
    fn file_type(&self) -> FileType {
        match self {
            MemoryEntry::File { .. } => FileType::File,
            MemoryEntry::Dir { .. } => FileType::Directory,
            MemoryEntry::Symlink { .. } => FileType::Symlink,
        }
    }
}

/// In-memory filesystem.
///
/// Backs the embedded template archive and serves as a fake in tests.
/// Parent directories are created implicitly.
#[derive(Debug)]
pub struct MemoryFilesystem {
    entries: RwLock<BTreeMap<String, MemoryEntry>>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(String::new(), MemoryEntry::Dir { mode: 0o755 });
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn add_file(&self, path: &str, content: impl AsRef<[u8]>) {
        self.add_file_with_mode(path, content, 0o644);
    }

    pub fn add_file_with_mode(&self, path: &str, content: impl AsRef<[u8]>, mode: u32) {
        self.insert(
            path,
            MemoryEntry::File {
                data: content.as_ref().to_vec(),
                mode,
            },
        );
    }

    pub fn add_dir(&self, path: &str) {
        self.add_dir_with_mode(path, 0o755);
    }

    pub fn add_dir_with_mode(&self, path: &str, mode: u32) {
        self.insert(path, MemoryEntry::Dir { mode });
    }

    pub fn add_symlink(&self, path: &str, target: &str) {
        self.insert(
            path,
            MemoryEntry::Symlink {
                target: target.to_string(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    fn insert(&self, path: &str, entry: MemoryEntry) {
        let path = clean(path);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Self::ensure_parents(&mut entries, &path);
        entries.insert(path, entry);
    }

    fn ensure_parents(entries: &mut BTreeMap<String, MemoryEntry>, path: &str) {
        let mut current = String::new();
        let parts: Vec<&str> = path.split('/').collect();
        for part in parts.iter().take(parts.len().saturating_sub(1)) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            entries
                .entry(current.clone())
                .or_insert(MemoryEntry::Dir { mode: 0o755 });
        }
    }

    fn get(&self, path: &str) -> Result<MemoryEntry> {
        let path = clean(path);
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&path)
            .cloned()
            .ok_or_else(|| not_found(&path))
    }
}

impl Default for MemoryFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

impl Filesystem for MemoryFilesystem {
    fn open(&self, path: &str) -> Result<Vec<u8>> {
        match self.get(path)? {
            MemoryEntry::File { data, .. } => Ok(data),
            _ => Err(anyhow!("Not a file: {}", path)),
        }
    }

    fn stat(&self, path: &str) -> Result<FileMetadata> {
        let entry = self.get(path)?;
        let (size, mode) = match &entry {
            MemoryEntry::File { data, mode } => (data.len() as u64, *mode),
            MemoryEntry::Dir { mode } => (0, *mode),
            MemoryEntry::Symlink { target } => (target.len() as u64, 0o777),
        };
        Ok(FileMetadata {
            size,
            file_type: entry.file_type(),
            mode,
        })
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let dir = clean(path);
        match self.get(&dir)? {
            MemoryEntry::Dir { .. } => {}
            _ => return Err(anyhow!("Not a directory: {}", path)),
        }

        let prefix = if dir.is_empty() {
            String::new()
        } else {
            format!("{}/", dir)
        };

        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .iter()
            .filter(|(p, _)| !p.is_empty() && p.starts_with(&prefix))
            .filter(|(p, _)| !p[prefix.len()..].contains('/'))
            .map(|(p, e)| DirEntry {
                path: p.clone(),
                name: p[prefix.len()..].to_string(),
                file_type: e.file_type(),
            })
            .collect())
    }

    fn read_link(&self, path: &str) -> Result<String> {
        match self.get(path)? {
            MemoryEntry::Symlink { target } => Ok(target),
            _ => Err(anyhow!("Not a symlink: {}", path)),
        }
    }
}
