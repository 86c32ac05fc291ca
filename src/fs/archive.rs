//! Loading a gzipped tarball into a [`MemoryFilesystem`]

use super::memory::MemoryFilesystem;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::io::Read;
use tar::{Archive, EntryType};

/// Unpack a `.tar.gz` byte slice into memory, keeping modes and symlinks.
pub fn from_tar_gz(bytes: &[u8]) -> Result<MemoryFilesystem> {
    let fs = MemoryFilesystem::new();
    let mut archive = Archive::new(GzDecoder::new(bytes));

    for entry in archive.entries().context("Failed to read archive entries")? {
        let mut entry = entry.context("Failed to read archive entry")?;
        let path = entry
            .path()
            .context("Archive entry has an invalid path")?
            .to_string_lossy()
            .replace('\\', "/");
        let mode = entry.header().mode().unwrap_or(0o644);

        match entry.header().entry_type() {
            EntryType::Directory => fs.add_dir_with_mode(&path, mode),
            EntryType::Symlink => {
                let target = entry
                    .link_name()
                    .context("Failed to read symlink target")?
                    .map(|t| t.to_string_lossy().to_string())
                    .unwrap_or_default();
                fs.add_symlink(&path, &target);
            }
            EntryType::Regular | EntryType::Continuous => {
                let mut data = Vec::with_capacity(entry.size() as usize);
                entry
                    .read_to_end(&mut data)
                    .with_context(|| format!("Failed to read archive file {}", path))?;
                fs.add_file_with_mode(&path, data, mode);
            }
            _ => {}
        }
    }

    Ok(fs)
}
