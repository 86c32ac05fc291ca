use super::r#trait::{join, Filesystem};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Recursively copy `src` from `source` onto disk at `dest`.
///
/// Directories are merged into existing ones, regular files overwritten,
/// symlinks recreated (not followed) and permission bits kept.
pub fn copy_from_fs(src: &str, dest: &Path, source: &dyn Filesystem) -> Result<()> {
    let meta = source
        .stat(src)
        .with_context(|| format!("Failed to stat template path '{}'", src))?;

    if meta.is_dir() {
        fs::create_dir_all(dest)
            .with_context(|| format!("Failed to create directory {:?}", dest))?;
        set_mode(dest, meta.mode)?;
        for entry in source.read_dir(src)? {
            copy_from_fs(&join(src, &entry.name), &dest.join(&entry.name), source)?;
        }
    } else if meta.is_symlink() {
        let target = source.read_link(src)?;
        symlink(&target, dest)?;
    } else {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        let data = source.open(src)?;
        fs::write(dest, data).with_context(|| format!("Failed to write {:?}", dest))?;
        set_mode(dest, meta.mode)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if mode == 0 {
        return Ok(());
    }
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("Failed to set permissions on {:?}", path))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn symlink(target: &str, link: &Path) -> Result<()> {
    if fs::symlink_metadata(link).is_ok() {
        fs::remove_file(link).with_context(|| format!("Failed to replace {:?}", link))?;
    }
    std::os::unix::fs::symlink(target, link)
        .with_context(|| format!("Failed to create symlink {:?} -> {}", link, target))
}

#[cfg(windows)]
fn symlink(target: &str, link: &Path) -> Result<()> {
    if fs::symlink_metadata(link).is_ok() {
        fs::remove_file(link).with_context(|| format!("Failed to replace {:?}", link))?;
    }
    std::os::windows::fs::symlink_file(target, link)
        .with_context(|| format!("Failed to create symlink {:?} -> {}", link, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFilesystem;
    use tempfile::TempDir;

    #[test]
    fn test_copy_tree() {
        let mem = MemoryFilesystem::new();
        mem.add_file("go/http/handle.go", "package function");
        mem.add_file("go/http/go.mod", "module function");

        let dir = TempDir::new().unwrap();
        copy_from_fs("go/http", dir.path(), &mem).unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("handle.go")).unwrap(),
            "package function"
        );
        assert!(dir.path().join("go.mod").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_preserves_symlinks_and_modes() {
        use std::os::unix::fs::PermissionsExt;

        let mem = MemoryFilesystem::new();
        mem.add_file_with_mode("s/run.sh", "#!/bin/sh", 0o755);
        mem.add_symlink("s/alias.sh", "run.sh");

        let dir = TempDir::new().unwrap();
        copy_from_fs("s", dir.path(), &mem).unwrap();

        let mode = fs::metadata(dir.path().join("run.sh"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o755);
        assert_eq!(
            fs::read_link(dir.path().join("alias.sh")).unwrap(),
            Path::new("run.sh")
        );
    }
}
