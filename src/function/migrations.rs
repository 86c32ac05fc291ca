//! Forward migrations of the descriptor schema
//!
//! Each step is a pure function of the typed descriptor and the raw YAML
//! document it was parsed from; the raw document is needed because older
//! schemas carry keys the current types no longer model. Steps run in
//! order for every version older than the descriptor's own.

use super::descriptor::{Env, Function, Git, HealthEndpoints, Label, Options, Volume};
use crate::error::{FunctionError, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

type MigrationFn = fn(Function, &Value) -> Result<Function>;

struct Migration {
    version: &'static str,
    name: &'static str,
    apply: MigrationFn,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0.19.0",
        name: "creation stamp",
        apply: migrate_creation_stamp,
    },
    Migration {
        version: "0.23.0",
        name: "builder images",
        apply: migrate_builder_images,
    },
    Migration {
        version: "0.25.0",
        name: "spec version",
        apply: migrate_spec_version,
    },
    Migration {
        version: "0.34.0",
        name: "specs structure",
        apply: migrate_specs_structure,
    },
];

/// Builder image that was the implicit default before per-builder images
const LEGACY_DEFAULT_BUILDER: &str = "gcr.io/paketo-buildpacks/builder:base";

/// The version every freshly created descriptor carries
pub fn last_spec_version() -> &'static str {
    MIGRATIONS
        .last()
        .map(|m| m.version)
        .unwrap_or("0.0.0")
}

/// Apply every pending step; the flag reports whether any ran
pub fn migrate(mut f: Function, raw: &Value) -> Result<(Function, bool)> {
    let mut dirty = false;
    for migration in MIGRATIONS {
        if !needs(&f.spec_version, migration.version) {
            continue;
        }
        f = (migration.apply)(f, raw)?;
        f.spec_version = migration.version.to_string();
        dirty = true;
    }
    Ok((f, dirty))
}

fn needs(current: &str, target: &str) -> bool {
    current.is_empty() || compare_versions(current, target) == Ordering::Less
}

/// Compare dotted numeric versions; a leading `v` and pre-release suffixes
/// are ignored and missing components count as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    parse_version(a).cmp(&parse_version(b))
}

fn parse_version(v: &str) -> [u64; 3] {
    let v = v.trim().trim_start_matches('v');
    let core = v.split(['-', '+']).next().unwrap_or_default();
    let mut out = [0u64; 3];
    for (slot, part) in out.iter_mut().zip(core.split('.')) {
        *slot = part.parse().unwrap_or(0);
    }
    out
}

fn migrate_creation_stamp(mut f: Function, _raw: &Value) -> Result<Function> {
    if f.created.is_none() && !f.name.is_empty() && !f.runtime.is_empty() {
        f.created = Some(Utc::now());
    }
    Ok(f)
}

fn migrate_builder_images(mut f: Function, raw: &Value) -> Result<Function> {
    if let Some(builder) = raw.get("builder").and_then(Value::as_str) {
        if !builder.is_empty()
            && builder != LEGACY_DEFAULT_BUILDER
            && !f.build.builder_images.contains_key("pack")
        {
            f.build
                .builder_images
                .insert("pack".to_string(), builder.to_string());
        }
    }
    Ok(f)
}

fn migrate_spec_version(mut f: Function, raw: &Value) -> Result<Function> {
    if f.spec_version.is_empty() {
        if let Some(version) = raw.get("version").and_then(Value::as_str) {
            f.spec_version = version.to_string();
        }
    }
    Ok(f)
}

fn migrate_specs_structure(mut f: Function, raw: &Value) -> Result<Function> {
    const MIGRATION: &str = "specs structure";

    if let Some(namespace) = field::<String>(raw, "namespace", MIGRATION)? {
        if f.deploy.namespace.is_empty() {
            f.deploy.namespace = namespace;
        }
    }
    if let Some(git) = field::<Git>(raw, "git", MIGRATION)? {
        if f.build.git.is_empty() {
            f.build.git = git;
        }
    }
    if let Some(images) = field::<BTreeMap<String, String>>(raw, "builderImages", MIGRATION)? {
        for (builder, image) in images {
            f.build.builder_images.entry(builder).or_insert(image);
        }
    }
    if let Some(buildpacks) = field::<Vec<String>>(raw, "buildpacks", MIGRATION)? {
        if f.build.buildpacks.is_empty() {
            f.build.buildpacks = buildpacks;
        }
    }
    // The 0.23 step already captured a custom image; what remains of the
    // flat key is the builder's short name when it is not an image.
    if let Some(builder) = field::<String>(raw, "builder", MIGRATION)? {
        if f.build.builder.is_empty() && !builder.contains('/') {
            f.build.builder = builder;
        }
    }
    if let Some(envs) = field::<Vec<Env>>(raw, "buildEnvs", MIGRATION)? {
        if f.build.build_envs.is_empty() {
            f.build.build_envs = envs;
        }
    }
    if let Some(volumes) = field::<Vec<Volume>>(raw, "volumes", MIGRATION)? {
        if f.run.volumes.is_empty() {
            f.run.volumes = volumes;
        }
    }
    if let Some(envs) = field::<Vec<Env>>(raw, "envs", MIGRATION)? {
        if f.run.envs.is_empty() {
            f.run.envs = envs;
        }
    }
    if let Some(annotations) = field::<BTreeMap<String, String>>(raw, "annotations", MIGRATION)? {
        for (key, value) in annotations {
            f.deploy.annotations.entry(key).or_insert(value);
        }
    }
    if let Some(options) = field::<Options>(raw, "options", MIGRATION)? {
        if f.deploy.options.is_empty() {
            f.deploy.options = options;
        }
    }
    if let Some(labels) = field::<Vec<Label>>(raw, "labels", MIGRATION)? {
        if f.deploy.labels.is_empty() {
            f.deploy.labels = labels;
        }
    }
    if let Some(health) = field::<HealthEndpoints>(raw, "healthEndpoints", MIGRATION)? {
        if f.deploy.health_endpoints.is_empty() {
            f.deploy.health_endpoints = health;
        }
    }
    Ok(f)
}

fn field<T: DeserializeOwned>(
    raw: &Value,
    key: &str,
    migration: &'static str,
) -> Result<Option<T>> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_yaml::from_value(value.clone())
            .map(Some)
            .map_err(|e| FunctionError::Migration {
                migration,
                message: format!("field '{}': {}", key, e),
            }),
    }
}

/// Names of every migration step, oldest first
pub fn names() -> Vec<&'static str> {
    MIGRATIONS.iter().map(|m| m.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn load(yaml: &str) -> (Function, bool) {
        let raw: Value = serde_yaml::from_str(yaml).unwrap();
        let mut f: Function = serde_yaml::from_value(raw.clone()).unwrap();
        f.root = Path::new("/tmp/fn").to_path_buf();
        migrate(f, &raw).unwrap()
    }

    #[test]
    fn test_version_ordering() {
        assert_eq!(compare_versions("0.9.0", "0.19.0"), Ordering::Less);
        assert_eq!(compare_versions("v0.34.0", "0.34.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0", "0.34.0"), Ordering::Greater);
        assert_eq!(compare_versions("0.34.0-rc1", "0.34.0"), Ordering::Equal);
    }

    #[test]
    fn test_current_descriptor_is_untouched() {
        let yaml = format!(
            "specVersion: {}\nname: hello\nruntime: go\ncreated: 2024-01-02T03:04:05Z\n",
            last_spec_version()
        );
        let (f, dirty) = load(&yaml);
        assert!(!dirty);
        assert_eq!(f.name, "hello");
    }

    #[test]
    fn test_unversioned_descriptor_runs_every_step() {
        let (f, dirty) = load("name: hello\nruntime: go\n");
        assert!(dirty);
        assert!(f.created.is_some());
        assert_eq!(f.spec_version, last_spec_version());
    }

    #[test]
    fn test_creation_stamp_needs_name_and_runtime() {
        let (f, _) = load("name: hello\n");
        assert!(f.created.is_none());
    }

    #[test]
    fn test_builder_moves_to_builder_images() {
        let (f, _) = load("name: hello\nruntime: go\nbuilder: example.com/custom/builder:v1\n");
        assert_eq!(
            f.build.builder_images.get("pack").map(String::as_str),
            Some("example.com/custom/builder:v1")
        );

        let (f, _) = load(&format!(
            "name: hello\nruntime: go\nbuilder: {}\n",
            LEGACY_DEFAULT_BUILDER
        ));
        assert!(f.build.builder_images.is_empty());
    }

    #[test]
    fn test_flat_fields_move_into_sections() {
        let yaml = r#"
specVersion: 0.25.0
name: hello
runtime: node
created: 2024-01-02T03:04:05Z
namespace: prod
buildpacks: [paketo-buildpacks/nodejs]
buildEnvs:
  - name: NPM_CONFIG_LOGLEVEL
    value: silent
envs:
  - name: GREETING
    value: hi
volumes:
  - secret: creds
    path: /creds
annotations:
  team: web
labels:
  - key: tier
    value: frontend
healthEndpoints:
  liveness: /live
"#;
        let (f, dirty) = load(yaml);
        assert!(dirty);
        assert_eq!(f.deploy.namespace, "prod");
        assert_eq!(f.build.buildpacks, vec!["paketo-buildpacks/nodejs"]);
        assert_eq!(f.build.build_envs.len(), 1);
        assert_eq!(f.run.envs[0].value.as_deref(), Some("hi"));
        assert_eq!(f.run.volumes[0].secret.as_deref(), Some("creds"));
        assert_eq!(f.deploy.annotations["team"], "web");
        assert_eq!(f.deploy.labels[0].key.as_deref(), Some("tier"));
        assert_eq!(f.deploy.health_endpoints.liveness, "/live");
        assert_eq!(f.spec_version, "0.34.0");
    }

    #[test]
    fn test_legacy_version_key() {
        let (f, _) = load("version: 0.20.0\nname: hello\nruntime: go\n");
        assert_eq!(f.spec_version, last_spec_version());
    }

    #[test]
    fn test_malformed_flat_field_is_reported() {
        let raw: Value = serde_yaml::from_str("name: x\nenvs: 12\n").unwrap();
        let f: Function = serde_yaml::from_value(raw.clone()).unwrap();
        match migrate(f, &raw) {
            Err(FunctionError::Migration { migration, .. }) => {
                assert_eq!(migration, "specs structure")
            }
            other => panic!("Expected migration error, got {:?}", other),
        }
    }

    #[test]
    fn test_names_in_order() {
        assert_eq!(
            names(),
            vec!["creation stamp", "builder images", "spec version", "specs structure"]
        );
    }
}
