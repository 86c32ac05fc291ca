//! Filesystem trait definition

use anyhow::Result;
use std::io;

/// Metadata about a filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    pub file_type: FileType,
    /// Unix permission bits (e.g. `0o755`)
    pub mode: u32,
}

/// Type of filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
    Symlink,
}

impl FileMetadata {
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.file_type == FileType::Symlink
    }

    pub fn is_executable(&self) -> bool {
        self.mode & 0o111 != 0
    }

    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// A directory entry returned by read_dir
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Slash-separated path relative to the filesystem root
    pub path: String,
    pub name: String,
    pub file_type: FileType,
}

impl DirEntry {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.name
    }

    pub fn file_type(&self) -> FileType {
        self.file_type
    }

    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Directory
    }

    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

/// Minimal read-only filesystem capability used for template sources.
///
/// Paths are slash-separated and relative to the filesystem root on every
/// platform. `""`, `"."` and `"/"` all name the root. `stat` does not
/// follow symlinks.
pub trait Filesystem: Send + Sync {
    /// Read the full contents of a regular file
    fn open(&self, path: &str) -> Result<Vec<u8>>;

    /// Metadata for the entry at `path`
    fn stat(&self, path: &str) -> Result<FileMetadata>;

    /// Entries of the directory at `path`, sorted by name
    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>>;

    /// Target of the symlink at `path`
    fn read_link(&self, path: &str) -> Result<String>;

    fn read_to_string(&self, path: &str) -> Result<String> {
        let bytes = self.open(path)?;
        Ok(String::from_utf8(bytes)?)
    }

    fn exists(&self, path: &str) -> bool {
        self.stat(path).is_ok()
    }

    fn is_dir(&self, path: &str) -> bool {
        self.stat(path).map(|m| m.is_dir()).unwrap_or(false)
    }
}

/// Normalize a template path: strip leading `./` and `/`, trailing `/`,
/// and collapse `.` to the root (`""`).
pub fn clean(path: &str) -> String {
    let parts: Vec<&str> = path
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    parts.join("/")
}

/// Join two template paths
pub fn join(base: &str, name: &str) -> String {
    let base = clean(base);
    let name = clean(name);
    match (base.is_empty(), name.is_empty()) {
        (true, _) => name,
        (_, true) => base,
        _ => format!("{}/{}", base, name),
    }
}

/// The error every adapter returns for a missing path
pub fn not_found(path: &str) -> anyhow::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("path not found: {}", path)).into()
}

/// Whether an adapter error means the path does not exist
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<io::Error>()
            .map(|e| e.kind() == io::ErrorKind::NotFound)
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_metadata_is_file() {
        let meta = FileMetadata {
            size: 100,
            file_type: FileType::File,
            mode: 0o644,
        };
        assert!(meta.is_file());
        assert!(!meta.is_dir());
        assert!(!meta.is_executable());
    }

    #[test]
    fn test_file_metadata_executable() {
        let meta = FileMetadata {
            size: 0,
            file_type: FileType::File,
            mode: 0o755,
        };
        assert!(meta.is_executable());
    }

    #[test]
    fn test_dir_entry() {
        let entry = DirEntry {
            path: "go/.hidden".to_string(),
            name: ".hidden".to_string(),
            file_type: FileType::Directory,
        };
        assert_eq!(entry.path(), "go/.hidden");
        assert!(entry.is_dir());
        assert!(entry.is_hidden());
    }

    #[test]
    fn test_clean_and_join() {
        assert_eq!(clean("./go/scaffolding/"), "go/scaffolding");
        assert_eq!(clean("/"), "");
        assert_eq!(clean("."), "");
        assert_eq!(join("", "certs"), "certs");
        assert_eq!(join("go", "http/"), "go/http");
        assert_eq!(join("go", ""), "go");
    }

    #[test]
    fn test_not_found_is_detectable() {
        let err = not_found("missing").context("while loading");
        assert!(is_not_found(&err));
        assert!(!is_not_found(&anyhow::anyhow!("other")));
    }
}
