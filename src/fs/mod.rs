//! Filesystem abstraction for template sources
//!
//! Templates and scaffolding are read through [`Filesystem`] so the same
//! logic works against the embedded archive, an on-disk repository, or a
//! cloned git repository.

mod archive;
mod copy;
mod git;
mod masking;
mod memory;
mod os;
mod sub;
mod r#trait;

pub use archive::from_tar_gz;
pub use copy::copy_from_fs;
pub use git::{clone_into, split_reference, GitFilesystem};
pub use masking::MaskingFilesystem;
pub use memory::{MemoryEntry, MemoryFilesystem};
pub use os::OsFilesystem;
pub use r#trait::{
    clean, is_not_found, join, not_found, DirEntry, FileMetadata, FileType, Filesystem,
};
pub use sub::SubFilesystem;
