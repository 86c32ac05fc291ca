//! Packs the `templates/` directory into a gzipped tarball that the library
//! embeds as its default template repository.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::env;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

fn main() -> io::Result<()> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").map_err(env_error)?);
    let templates = manifest_dir.join("templates");
    let out_dir = PathBuf::from(env::var("OUT_DIR").map_err(env_error)?);

    println!("cargo:rerun-if-changed=templates");

    let archive = File::create(out_dir.join("templates.tar.gz"))?;
    let encoder = GzEncoder::new(archive, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    append_tree(&mut builder, &templates, Path::new(""))?;

    builder.into_inner()?.finish()?;
    Ok(())
}

fn env_error(e: env::VarError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

fn append_tree<W: io::Write>(
    builder: &mut tar::Builder<W>,
    root: &Path,
    relative: &Path,
) -> io::Result<()> {
    let dir = root.join(relative);
    let mut entries = std::fs::read_dir(&dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let name = relative.join(entry.file_name());
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            builder.append_dir(&name, &path)?;
            append_tree(builder, root, &name)?;
        } else {
            builder.append_path_with_name(&path, &name)?;
        }
    }
    Ok(())
}
