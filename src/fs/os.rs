use super::r#trait::{clean, not_found, DirEntry, FileMetadata, FileType, Filesystem};
use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Filesystem rooted at a directory on disk
#[derive(Debug, Clone)]
pub struct OsFilesystem {
    root: PathBuf,
}

impl OsFilesystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let cleaned = clean(path);
        if cleaned.is_empty() {
            self.root.clone()
        } else {
            self.root.join(cleaned)
        }
    }
}

fn file_type_of(meta: &fs::Metadata) -> FileType {
    let ft = meta.file_type();
    if ft.is_symlink() {
        FileType::Symlink
    } else if ft.is_dir() {
        FileType::Directory
    } else {
        FileType::File
    }
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(meta: &fs::Metadata) -> u32 {
    if meta.is_dir() {
        0o755
    } else {
        0o644
    }
}

impl Filesystem for OsFilesystem {
    fn open(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path);
        match fs::read(&full) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(not_found(path)),
            Err(e) => Err(e).with_context(|| format!("Failed to read file {:?}", full)),
        }
    }

    fn stat(&self, path: &str) -> Result<FileMetadata> {
        let full = self.resolve(path);
        let meta = match fs::symlink_metadata(&full) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found(path)),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to get metadata for {:?}", full))
            }
        };
        Ok(FileMetadata {
            size: meta.len(),
            file_type: file_type_of(&meta),
            mode: mode_of(&meta),
        })
    }

    fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        let full = self.resolve(path);
        let entries = match fs::read_dir(&full) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found(path)),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read directory {:?}", full))
            }
        };

        let base = clean(path);
        let mut result = Vec::new();
        for entry in entries {
            let entry = entry.context("Failed to read directory entry")?;
            let name = entry.file_name().to_string_lossy().to_string();
            let meta = fs::symlink_metadata(entry.path())
                .with_context(|| format!("Failed to get metadata for {:?}", entry.path()))?;
            result.push(DirEntry {
                path: super::r#trait::join(&base, &name),
                name,
                file_type: file_type_of(&meta),
            });
        }
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    fn read_link(&self, path: &str) -> Result<String> {
        let full = self.resolve(path);
        let target = fs::read_link(&full).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                not_found(path)
            } else {
                anyhow::Error::new(e).context(format!("Failed to read link {:?}", full))
            }
        })?;
        Ok(target.to_string_lossy().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::is_not_found;
    use tempfile::TempDir;

    #[test]
    fn test_stat_and_open() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("go/http")).unwrap();
        fs::write(dir.path().join("go/http/handle.go"), "package function").unwrap();

        let ofs = OsFilesystem::new(dir.path());
        assert!(ofs.stat("go").unwrap().is_dir());
        assert!(ofs.stat("./go/http/handle.go").unwrap().is_file());
        assert_eq!(ofs.read_to_string("go/http/handle.go").unwrap(), "package function");
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let dir = TempDir::new().unwrap();
        let ofs = OsFilesystem::new(dir.path());
        assert!(is_not_found(&ofs.stat("nope").unwrap_err()));
        assert!(is_not_found(&ofs.open("nope").unwrap_err()));
    }

    #[test]
    fn test_read_dir_sorted_with_relative_paths() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("root/b")).unwrap();
        fs::write(dir.path().join("root/a.txt"), "a").unwrap();

        let ofs = OsFilesystem::new(dir.path());
        let entries = ofs.read_dir("root").unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.path().to_string()).collect();
        assert_eq!(names, vec!["root/a.txt", "root/b"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_is_not_followed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("target.txt"), "x").unwrap();
        std::os::unix::fs::symlink("target.txt", dir.path().join("link")).unwrap();

        let ofs = OsFilesystem::new(dir.path());
        assert!(ofs.stat("link").unwrap().is_symlink());
        assert_eq!(ofs.read_link("link").unwrap(), "target.txt");
    }
}
