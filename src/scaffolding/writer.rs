use super::detectors::detector_for;
use super::gomod::GoMod;
use super::signature::Signature;
use crate::error::{FunctionError, Result};
use crate::fs::{copy_from_fs, Filesystem};
use crate::function::absolute;
use anyhow::Context;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Version required of the user's module from the generated entrypoint
const PSEUDO_VERSION: &str = "v0.0.0-00010101000000-000000000000";

/// Module path the scaffolding templates use as a stand-in for the user's
const PLACEHOLDER_MODULE: &str = "function";

/// Choices made when a runtime's source cannot be analysed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaffoldingPolicy {
    /// Convention assumed when the runtime has no detector yet
    pub default_instanced: bool,
}

impl Default for ScaffoldingPolicy {
    fn default() -> Self {
        Self {
            default_instanced: true,
        }
    }
}

/// Detect the signature of the source at `src`.
///
/// Exactly one of the two conventions must be implemented.
pub fn detect_signature(src: &Path, runtime: &str, invoke: &str) -> Result<Signature> {
    let detector = detector_for(runtime)?;
    let (is_static, instanced) = detector.detect(src)?;
    match (is_static, instanced) {
        (true, true) => Err(FunctionError::SignatureConflict),
        (false, false) => Err(FunctionError::SignatureMissing),
        _ => Ok(Signature::from_parts(instanced, invoke)),
    }
}

/// Signature for `src`, substituting the policy default when the runtime
/// has no detector.
pub fn resolve_signature(
    src: &Path,
    runtime: &str,
    invoke: &str,
    policy: ScaffoldingPolicy,
) -> Result<Signature> {
    match detect_signature(src, runtime, invoke) {
        Err(FunctionError::DetectorNotImplemented(runtime)) => {
            debug!(runtime = %runtime, "no signature detector; using default");
            Ok(Signature::from_parts(policy.default_instanced, invoke))
        }
        other => other,
    }
}

/// Write scaffolding for the function source at `src` into `out` using
/// the default policy.
pub fn write(out: &Path, src: &Path, runtime: &str, invoke: &str, fs: &dyn Filesystem) -> Result<()> {
    write_with_policy(out, src, runtime, invoke, fs, ScaffoldingPolicy::default())
}

/// Write scaffolding for the function source at `src` into `out`.
///
/// Copies `<runtime>/scaffolding/<signature>` from `fs`, patches Go
/// module metadata to reference the user's module, copies `certs`, and
/// links `out/f` to the source directory.
pub fn write_with_policy(
    out: &Path,
    src: &Path,
    runtime: &str,
    invoke: &str,
    fs: &dyn Filesystem,
    policy: ScaffoldingPolicy,
) -> Result<()> {
    let signature = resolve_signature(src, runtime, invoke, policy)?;

    let dir = format!("{}/scaffolding/{}", runtime, signature);
    if fs.stat(&dir).is_err() {
        return Err(FunctionError::ScaffoldingNotFound);
    }

    copy_from_fs(&dir, out, fs)
        .map_err(|e| FunctionError::scaffolding("filesystem copy failed", e))?;

    if runtime == "go" {
        patch_go(src, out).map_err(|e| FunctionError::scaffolding("failed to patch scaffolding", e))?;
    }

    if let Err(e) = fs.stat("certs") {
        return Err(FunctionError::scaffolding(
            "certs directory not found in filesystem",
            e,
        ));
    }
    copy_from_fs("certs", out, fs).map_err(|e| FunctionError::scaffolding("certs copy failed", e))?;

    link_source(out, src)?;
    info!(
        out = %out.display(),
        runtime,
        signature = %signature,
        "wrote scaffolding"
    );
    Ok(())
}

fn patch_go(src: &Path, out: &Path) -> anyhow::Result<()> {
    let user_mod_path = src.join("go.mod");
    let user_mod = fs::read_to_string(&user_mod_path)
        .with_context(|| format!("cannot read function go.mod at {:?}", user_mod_path))?;
    let user_mod = GoMod::parse(&user_mod).context("cannot parse function go.mod")?;
    let module = user_mod.module().to_string();

    let scaffold_mod_path = out.join("go.mod");
    let content = fs::read_to_string(&scaffold_mod_path).context("cannot read scaffolding go.mod")?;
    let mut scaffold_mod = GoMod::parse(&content).context("cannot parse scaffolding go.mod")?;
    if let Some(go) = user_mod.go_version().filter(|v| !v.is_empty()) {
        scaffold_mod.set_go(go);
    }
    scaffold_mod.drop_replace(PLACEHOLDER_MODULE);
    scaffold_mod.add_replace(&module, "./f");
    scaffold_mod.drop_require(PLACEHOLDER_MODULE);
    scaffold_mod.add_require(&module, PSEUDO_VERSION);
    fs::write(&scaffold_mod_path, scaffold_mod.format())
        .context("cannot write scaffolding go.mod")?;

    let main_path = out.join("main.go");
    let main = fs::read_to_string(&main_path).context("cannot read scaffolding main")?;
    fs::write(&main_path, main.replace(PLACEHOLDER_MODULE, &module))
        .context("cannot write scaffolding main")?;

    debug!(module = %module, "patched go scaffolding");
    Ok(())
}

fn link_source(out: &Path, src: &Path) -> Result<()> {
    let out_abs = absolute(out)?;
    let src_abs = absolute(src)?;
    let target = relative_path(&out_abs, &src_abs);
    let link = out.join("f");
    if fs::symlink_metadata(&link).is_ok() {
        fs::remove_file(&link).map_err(|e| FunctionError::io(&link, e))?;
    }
    symlink(&target, &link)
        .map_err(|e| FunctionError::scaffolding("error linking scaffolding to source", e))
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

/// Path of `to` relative to the directory `from`; both must be absolute
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..from.len() {
        rel.push("..");
    }
    for component in &to[common..] {
        rel.push(component.as_os_str());
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    rel
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/a/b/.func/build"), Path::new("/a/b")),
            PathBuf::from("../..")
        );
        assert_eq!(
            relative_path(Path::new("/tmp/out"), Path::new("/src/fn")),
            PathBuf::from("../../src/fn")
        );
        assert_eq!(relative_path(Path::new("/a"), Path::new("/a")), PathBuf::from("."));
    }

    #[test]
    fn test_policy_default_is_instanced() {
        assert!(ScaffoldingPolicy::default().default_instanced);
    }
}
