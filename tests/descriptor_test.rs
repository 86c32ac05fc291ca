//! Descriptor persistence tests
//!
//! Legacy descriptors on disk are migrated on load and written back in the
//! current schema.

use funcbox::function::{migrations, FUNCTION_FILE};
use funcbox::{Function, FunctionError};
use std::fs;
use tempfile::TempDir;

const LEGACY: &str = r#"
version: 0.20.0
name: hello
runtime: node
registry: quay.io/alice
namespace: prod
builder: example.com/custom/builder:v1
envs:
  - name: GREETING
    value: hi
"#;

#[test]
fn test_legacy_descriptor_is_upgraded_on_write() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(FUNCTION_FILE), LEGACY).unwrap();

    let f = Function::load(dir.path()).unwrap();
    assert!(f.initialized());
    assert_eq!(f.spec_version, migrations::last_spec_version());
    assert_eq!(f.deploy.namespace, "prod");
    assert_eq!(
        f.build.builder_images.get("pack").map(String::as_str),
        Some("example.com/custom/builder:v1")
    );
    f.write().unwrap();

    let written = fs::read_to_string(dir.path().join(FUNCTION_FILE)).unwrap();
    assert!(written.contains(&format!("specVersion: {}", migrations::last_spec_version())));
    assert!(!written.contains("\nnamespace: prod"));
    assert!(!written.contains("\nversion:"));

    let reloaded = Function::load(dir.path()).unwrap();
    assert_eq!(reloaded.deploy.namespace, "prod");
    assert_eq!(reloaded.run.envs, f.run.envs);
    assert_eq!(reloaded.created, f.created);
}

#[test]
fn test_unchanged_descriptor_is_not_rewritten() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(FUNCTION_FILE), LEGACY).unwrap();
    let f = Function::load(dir.path()).unwrap();
    f.write().unwrap();

    let path = dir.path().join(FUNCTION_FILE);
    let before = fs::metadata(&path).unwrap().modified().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(20));
    Function::load(dir.path()).unwrap().write().unwrap();
    assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), before);
}

#[test]
fn test_missing_descriptor_is_not_initialized() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        Function::load(dir.path()),
        Err(FunctionError::NotInitialized(_))
    ));

    let f = Function::load_or_default(dir.path()).unwrap();
    assert!(!f.initialized());
    assert_eq!(f.root, dir.path());
}

#[test]
fn test_malformed_descriptor_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(FUNCTION_FILE), "name: [unterminated\n").unwrap();
    assert!(matches!(
        Function::load(dir.path()),
        Err(FunctionError::Parse { .. })
    ));
}
