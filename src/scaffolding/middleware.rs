//! Middleware version reporting
//!
//! Each runtime binds its scaffolding to a middleware library; the version
//! is read from that runtime's own manifest format.

use super::gomod::GoMod;
use super::signature::Signature;
use super::writer::{resolve_signature, ScaffoldingPolicy};
use crate::error::{FunctionError, Result};
use crate::fs::Filesystem;
use anyhow::{anyhow, Context};
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Runtimes reported by [`middleware_versions`]
pub const MIDDLEWARE_RUNTIMES: &[&str] = &["go", "python", "node", "typescript", "quarkus", "java"];

/// Invocation hints reported by [`middleware_versions`]
pub const MIDDLEWARE_INVOKES: &[&str] = &["http", "cloudevent"];

const FUNC_GO_MODULE: &str = "knative.dev/func-go";
const FUNC_JS_RUNTIME: &str = "faas-js-runtime";

const FUNC_PYTHON_PATTERN: &str = r"func-python[~^=><!]*([0-9]+\.[0-9]+\.[0-9]+)?";
const SEMVER_PATTERN: &str = r"\d+\.\d+\.\d+";

fn compiled(pattern: &str) -> anyhow::Result<Regex> {
    Regex::new(pattern).with_context(|| format!("invalid version pattern {}", pattern))
}

/// Middleware version the function at `src` would bind to
pub fn middleware_version(
    src: &Path,
    runtime: &str,
    invoke: &str,
    fs: &dyn Filesystem,
) -> Result<String> {
    let signature = resolve_signature(src, runtime, invoke, ScaffoldingPolicy::default())?;
    detect_version(fs, runtime, signature)
}

/// `runtime -> invoke -> version` for every supported combination,
/// assuming the instanced convention
pub fn middleware_versions(
    fs: &dyn Filesystem,
) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
    let mut out: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for runtime in MIDDLEWARE_RUNTIMES {
        for invoke in MIDDLEWARE_INVOKES {
            let signature = Signature::from_parts(true, invoke);
            let version = detect_version(fs, runtime, signature)?;
            out.entry(runtime.to_string())
                .or_default()
                .insert(invoke.to_string(), version);
        }
    }
    Ok(out)
}

/// Read the middleware version for `runtime` from the scaffolding or
/// template snapshot in `fs`
pub fn detect_version(fs: &dyn Filesystem, runtime: &str, signature: Signature) -> Result<String> {
    let template_dir = if signature.is_cloudevents() {
        "cloudevents"
    } else {
        "http"
    };
    let version = match runtime {
        "go" => go_version(fs, &format!("go/scaffolding/{}/go.mod", signature)),
        "python" => python_version(fs, &format!("python/scaffolding/{}/pyproject.toml", signature)),
        "node" | "typescript" => {
            package_json_version(fs, &format!("{}/{}/package.json", runtime, template_dir))
        }
        "quarkus" => pom_property(
            fs,
            &format!("quarkus/{}/pom.xml", template_dir),
            "quarkus.platform.version",
        ),
        "java" => pom_property(
            fs,
            &format!("springboot/{}/pom.xml", template_dir),
            "spring-cloud.version",
        ),
        "rust" => Ok(String::new()),
        other => return Err(FunctionError::UnsupportedRuntime(other.to_string())),
    };
    version.map_err(FunctionError::Other)
}

fn go_version(fs: &dyn Filesystem, path: &str) -> anyhow::Result<String> {
    let content = fs
        .read_to_string(path)
        .with_context(|| format!("failed to read scaffolding go.mod at {}", path))?;
    let gomod = GoMod::parse(&content).context("failed to parse scaffolding go.mod")?;
    gomod
        .require_version(FUNC_GO_MODULE)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{} dependency not found in {}", FUNC_GO_MODULE, path))
}

#[derive(Deserialize)]
struct PyProject {
    #[serde(default)]
    project: PyProjectSection,
}

#[derive(Deserialize, Default)]
struct PyProjectSection {
    #[serde(default)]
    dependencies: Vec<String>,
}

fn python_version(fs: &dyn Filesystem, path: &str) -> anyhow::Result<String> {
    let content = fs
        .read_to_string(path)
        .with_context(|| format!("failed to read scaffolding pyproject.toml at {}", path))?;
    let pyproject: PyProject =
        toml::from_str(&content).context("failed to parse scaffolding pyproject.toml")?;

    let func_python = compiled(FUNC_PYTHON_PATTERN)?;
    for dependency in &pyproject.project.dependencies {
        if let Some(caps) = func_python.captures(dependency) {
            return Ok(caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default());
        }
    }
    Err(anyhow!("func-python not found in {}", path))
}

#[derive(Deserialize)]
struct PackageJson {
    #[serde(default)]
    dependencies: HashMap<String, String>,
}

fn package_json_version(fs: &dyn Filesystem, path: &str) -> anyhow::Result<String> {
    let content = fs
        .read_to_string(path)
        .with_context(|| format!("failed to read package.json at {}", path))?;
    let package: PackageJson =
        serde_json::from_str(&content).context("failed to parse package.json")?;
    let constraint = package
        .dependencies
        .get(FUNC_JS_RUNTIME)
        .ok_or_else(|| anyhow!("{} not found in {}", FUNC_JS_RUNTIME, path))?;
    Ok(compiled(SEMVER_PATTERN)?
        .find(constraint)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default())
}

/// Value of `<project><properties><name>` in a Maven POM
fn pom_property(fs: &dyn Filesystem, path: &str, name: &str) -> anyhow::Result<String> {
    let content = fs
        .read_to_string(path)
        .with_context(|| format!("failed to read pom.xml at {}", path))?;
    let doc = roxmltree::Document::parse(&content).context("failed to parse pom.xml")?;

    doc.root_element()
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "properties")
        .flat_map(|props| props.children())
        .find(|n| n.is_element() && n.tag_name().name() == name)
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .ok_or_else(|| anyhow!("dependency property {} not found in {}", name, path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFilesystem;

    fn snapshot() -> MemoryFilesystem {
        let fs = MemoryFilesystem::new();
        for sig in ["instanced-http", "instanced-cloudevents"] {
            fs.add_file(
                &format!("go/scaffolding/{}/go.mod", sig),
                "module s\n\ngo 1.21\n\nrequire knative.dev/func-go v0.21.3\n",
            );
            fs.add_file(
                &format!("python/scaffolding/{}/pyproject.toml", sig),
                "[project]\nname = \"s\"\ndependencies = [\"httpx\", \"func-python~=0.5.1\"]\n",
            );
        }
        for rt in ["node", "typescript"] {
            for inv in ["http", "cloudevents"] {
                fs.add_file(
                    &format!("{}/{}/package.json", rt, inv),
                    r#"{"dependencies": {"faas-js-runtime": "^2.4.1"}}"#,
                );
            }
        }
        for inv in ["http", "cloudevents"] {
            fs.add_file(
                &format!("quarkus/{}/pom.xml", inv),
                r#"<project xmlns="http://maven.apache.org/POM/4.0.0"><properties><quarkus.platform.version>3.8.4</quarkus.platform.version></properties></project>"#,
            );
            fs.add_file(
                &format!("springboot/{}/pom.xml", inv),
                r#"<project><properties><spring-cloud.version>2023.0.1</spring-cloud.version></properties></project>"#,
            );
        }
        fs
    }

    #[test]
    fn test_versions_for_every_runtime() {
        let versions = middleware_versions(&snapshot()).unwrap();
        assert_eq!(versions["go"]["http"], "v0.21.3");
        assert_eq!(versions["python"]["cloudevent"], "0.5.1");
        assert_eq!(versions["node"]["http"], "2.4.1");
        assert_eq!(versions["typescript"]["cloudevent"], "2.4.1");
        assert_eq!(versions["quarkus"]["http"], "3.8.4");
        assert_eq!(versions["java"]["cloudevent"], "2023.0.1");
        assert_eq!(versions.len(), 6);
    }

    #[test]
    fn test_version_patterns() {
        let func_python = compiled(FUNC_PYTHON_PATTERN).unwrap();
        let caps = func_python.captures("func-python>=1.2.3").unwrap();
        assert_eq!(caps.get(1).map(|m| m.as_str()), Some("1.2.3"));
        assert!(func_python.captures("func-python").unwrap().get(1).is_none());

        let semver = compiled(SEMVER_PATTERN).unwrap();
        assert_eq!(semver.find("~2.4.1-rc.1").map(|m| m.as_str()), Some("2.4.1"));
        assert!(compiled("(unclosed").is_err());
    }

    #[test]
    fn test_rust_has_no_middleware() {
        let fs = MemoryFilesystem::new();
        assert_eq!(
            detect_version(&fs, "rust", Signature::InstancedHttp).unwrap(),
            ""
        );
    }

    #[test]
    fn test_unsupported_runtime() {
        let fs = MemoryFilesystem::new();
        assert!(matches!(
            detect_version(&fs, "cobol", Signature::InstancedHttp),
            Err(FunctionError::UnsupportedRuntime(_))
        ));
    }

    #[test]
    fn test_unpinned_python_dependency() {
        let fs = MemoryFilesystem::new();
        fs.add_file(
            "python/scaffolding/instanced-http/pyproject.toml",
            "[project]\ndependencies = [\"func-python\"]\n",
        );
        assert_eq!(
            detect_version(&fs, "python", Signature::InstancedHttp).unwrap(),
            ""
        );
    }

    #[test]
    fn test_missing_dependency_is_error() {
        let fs = MemoryFilesystem::new();
        fs.add_file("node/http/package.json", r#"{"dependencies": {}}"#);
        assert!(detect_version(&fs, "node", Signature::StaticHttp).is_err());
    }
}
