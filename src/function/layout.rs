//! On-disk layout of a function root at creation time

use super::{FUNCTION_FILE, IGNORE_FILE, RUN_DATA_DIR};
use crate::error::{FunctionError, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Files which, if present, mean a function may already live here
const CONTENTIOUS_FILES: &[&str] = &[FUNCTION_FILE];

const FUNCIGNORE_CONTENT: &str = "
# Use the .funcignore file to exclude files which should not be
# tracked in the image build. To instruct the system not to track
# files in the image build, add the gitignore-style pattern or file
# information to this file.
";

/// Contentious files found directly in `root`
pub fn contentious_files(root: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(root).map_err(|e| FunctionError::io(root, e))?;
    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| FunctionError::io(root, e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if CONTENTIOUS_FILES.contains(&name.as_str()) {
            found.push(name);
        }
    }
    found.sort();
    Ok(found)
}

/// Refuse to initialize unless `root` is free of contentious files and of
/// visible entries. Hidden entries (`.git`, `.gitignore`) are permitted.
pub fn assert_empty_root(root: &Path) -> Result<()> {
    let files = contentious_files(root)?;
    if !files.is_empty() {
        return Err(FunctionError::ContentiousFiles {
            path: root.to_path_buf(),
            files,
        });
    }

    let entries = fs::read_dir(root).map_err(|e| FunctionError::io(root, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| FunctionError::io(root, e))?;
        if !entry.file_name().to_string_lossy().starts_with('.') {
            return Err(FunctionError::DirectoryNotEmpty(root.to_path_buf()));
        }
    }
    Ok(())
}

/// Create `.func` and make sure `.gitignore` excludes it.
///
/// An existing `/.func` line, or a commented-out one, is left alone.
pub fn ensure_run_data_dir(root: &Path) -> Result<()> {
    let run_data = root.join(RUN_DATA_DIR);
    fs::create_dir_all(&run_data).map_err(|e| FunctionError::io(&run_data, e))?;

    let gitignore = root.join(".gitignore");
    let directive = format!("/{}", RUN_DATA_DIR);
    if let Ok(content) = fs::read_to_string(&gitignore) {
        let present = content.lines().any(|line| {
            line.starts_with(&directive)
                || line.starts_with(&format!("# {}", directive))
                || line.starts_with(&format!("#{}", directive))
        });
        if present {
            return Ok(());
        }
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&gitignore)
        .map_err(|e| FunctionError::io(&gitignore, e))?;
    writeln!(
        file,
        "\n# Functions keep local runtime data in {} which should generally not\n# be tracked in source control. Comment out the following line to track it:\n{}",
        RUN_DATA_DIR, directive
    )
    .map_err(|e| FunctionError::io(&gitignore, e))
}

/// Create `.funcignore` with an explanatory comment unless it exists
pub fn ensure_funcignore(root: &Path) -> Result<()> {
    let path = root.join(IGNORE_FILE);
    if path.exists() {
        return Ok(());
    }
    fs::write(&path, FUNCIGNORE_CONTENT).map_err(|e| FunctionError::io(&path, e))
}
