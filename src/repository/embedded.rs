//! The template repository compiled into the binary

use crate::error::Result;
use crate::fs::{from_tar_gz, Filesystem, MemoryFilesystem};
use std::sync::{Arc, OnceLock};
use tracing::debug;

static ARCHIVE: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/templates.tar.gz"));

static EMBEDDED: OnceLock<Arc<dyn Filesystem>> = OnceLock::new();

/// Filesystem over the embedded templates, unpacked once per process
pub fn embedded_filesystem() -> Result<Arc<dyn Filesystem>> {
    if let Some(fs) = EMBEDDED.get() {
        return Ok(fs.clone());
    }
    let unpacked: MemoryFilesystem = from_tar_gz(ARCHIVE)?;
    debug!(entries = unpacked.len(), "unpacked embedded templates");
    let fs: Arc<dyn Filesystem> = Arc::new(unpacked);
    Ok(EMBEDDED.get_or_init(|| fs).clone())
}
