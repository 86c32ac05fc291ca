//! Build stamp: a fingerprint of the source tree captured after a build
//!
//! The fingerprint hashes every entry's absolute path, size and
//! modification time, so touching, adding or removing any tracked file
//! changes it. Run data and VCS metadata are excluded, as is anything
//! matched by `.funcignore`.

use super::{BUILT_IMAGE_FILE, BUILT_STAMP_FILE, FUNCTION_FILE, IGNORE_FILE, RUN_DATA_DIR};
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::{debug, trace};

/// Hex SHA-256 over `"<path>:<size>:<mtime nanos>:"` for each tracked entry
pub fn fingerprint(root: &Path) -> Result<String> {
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .add_custom_ignore_filename(IGNORE_FILE)
        .filter_entry(|entry| {
            let name = entry.file_name();
            name != RUN_DATA_DIR && name != ".git"
        })
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut hasher = Sha256::new();
    let mut entries = 0usize;
    for entry in walker {
        let entry = entry.context("Failed to read directory entry")?;
        let path = entry.path();
        if path == root {
            continue;
        }

        let metadata = fs::symlink_metadata(path)
            .with_context(|| format!("Failed to read metadata of {:?}", path))?;
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        trace!(path = %path.display(), size = metadata.len(), mtime, "fingerprint entry");
        hasher.update(format!("{}:{}:{}:", path.display(), metadata.len(), mtime).as_bytes());
        entries += 1;
    }

    debug!(root = %root.display(), entries, "computed fingerprint");
    Ok(hex::encode(hasher.finalize()))
}

/// Record the current fingerprint as the build stamp
pub fn write_stamp(root: &Path) -> Result<()> {
    let hash = fingerprint(root)?;
    let dir = root.join(RUN_DATA_DIR);
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
    let path = dir.join(BUILT_STAMP_FILE);
    fs::write(&path, &hash).with_context(|| format!("Failed to write {:?}", path))?;
    debug!(root = %root.display(), stamp = %hash, "wrote build stamp");
    Ok(())
}

/// Whether the function at `root` has a build that is still current.
///
/// Requires a descriptor, a stamp, and a recorded built image, and that
/// the tree's fingerprint still equals the stamp.
pub fn built(root: &Path) -> bool {
    if !root.join(FUNCTION_FILE).exists() {
        return false;
    }
    let run_data = root.join(RUN_DATA_DIR);
    let Ok(stamp) = fs::read_to_string(run_data.join(BUILT_STAMP_FILE)) else {
        return false;
    };
    let has_image = fs::read_to_string(run_data.join(BUILT_IMAGE_FILE))
        .map(|s| !s.trim().is_empty())
        .unwrap_or(false);
    if !has_image {
        return false;
    }

    match fingerprint(root) {
        Ok(current) => current == stamp.trim(),
        Err(e) => {
            debug!(root = %root.display(), error = %e, "fingerprint failed; treating as unbuilt");
            false
        }
    }
}
