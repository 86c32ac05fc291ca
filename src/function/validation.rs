//! Descriptor validation and `{{ env:NAME }}` interpolation

use super::descriptor::{Env, Function, Git, Label, Volume};
use super::FUNCTION_FILE;
use crate::error::{FunctionError, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

const NAME_PART: &str = r"(?:\w|['-]\w)+";

fn local_env() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\{\{\s*env:(\w+)\s*\}\}$").expect("valid regex"))
}

fn whole_secret() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"^\{{\{{\s*secret:({})\s*\}}\}}$", NAME_PART)).expect("valid regex")
    })
}

fn key_from_secret() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"^\{{\{{\s*secret:({}):([-._a-zA-Z0-9]+)\s*\}}\}}$",
            NAME_PART
        ))
        .expect("valid regex")
    })
}

fn whole_config_map() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"^\{{\{{\s*configMap:({})\s*\}}\}}$", NAME_PART))
            .expect("valid regex")
    })
}

fn key_from_config_map() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"^\{{\{{\s*configMap:({}):([-._a-zA-Z0-9]+)\s*\}}\}}$",
            NAME_PART
        ))
        .expect("valid regex")
    })
}

fn env_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-._a-zA-Z][-._a-zA-Z0-9]*$").expect("valid regex"))
}

fn label_key() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^([a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*/)?([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]$",
        )
        .expect("valid regex")
    })
}

fn label_value() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9])?$").expect("valid regex")
    })
}

/// Resolve a list of envs to `NAME -> value`.
///
/// Plain values pass through, as do `{{ ... }}` references that are not
/// local env references (secrets and config maps are resolved by the
/// deployer). `{{ env:NAME }}` is substituted from the process environment
/// and fails if `NAME` is unset. Entries without a value are skipped.
pub fn interpolate(envs: &[Env]) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for env in envs {
        let Some(name) = env.name.as_deref() else {
            return Err(FunctionError::Invalid {
                file: FUNCTION_FILE.to_string(),
                problems: vec!["env name may not be empty".to_string()],
            });
        };
        let Some(value) = env.value.as_deref() else {
            continue;
        };

        match local_env().captures(value) {
            Some(caps) => {
                let local = &caps[1];
                let resolved = std::env::var(local)
                    .map_err(|_| FunctionError::EnvNotFound(local.to_string()))?;
                out.insert(name.to_string(), resolved);
            }
            None => {
                out.insert(name.to_string(), value.to_string());
            }
        }
    }
    Ok(out)
}

impl Function {
    /// Check the descriptor for structural problems, reporting all of them
    /// at once.
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(FunctionError::RootRequired);
        }

        let problems: Vec<String> = [
            validate_volumes(&self.run.volumes),
            validate_build_envs(&self.build.build_envs),
            validate_envs(&self.run.envs),
            validate_labels(&self.deploy.labels),
            validate_git(&self.build.git),
        ]
        .into_iter()
        .flatten()
        .collect();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(FunctionError::Invalid {
                file: FUNCTION_FILE.to_string(),
                problems,
            })
        }
    }
}

fn validate_volumes(volumes: &[Volume]) -> Vec<String> {
    let mut problems = Vec::new();
    for (i, vol) in volumes.iter().enumerate() {
        let mut kinds = 0;
        if vol.secret.is_some() {
            kinds += 1;
        }
        if vol.config_map.is_some() {
            kinds += 1;
        }
        if let Some(pvc) = &vol.persistent_volume_claim {
            kinds += 1;
            if pvc.claim_name.is_none() {
                problems.push(format!("volume entry #{} is missing claim name", i));
            }
        }
        if let Some(empty_dir) = &vol.empty_dir {
            kinds += 1;
            if !empty_dir.medium.is_empty() && empty_dir.medium != "Memory" {
                problems.push(format!(
                    "volume entry #{} has invalid storage medium ({})",
                    i, empty_dir.medium
                ));
            }
        }
        match kinds {
            0 => problems.push(format!("volume entry #{} is missing a volume type", i)),
            1 => {}
            _ => problems.push(format!(
                "volume entry #{} may not specify more than one volume type",
                i
            )),
        }
        if vol.path.is_none() {
            problems.push(format!("volume entry #{} is missing path field", i));
        }
    }
    problems
}

fn check_env_name(i: usize, name: &str, problems: &mut Vec<String>) {
    if !env_name().is_match(name) {
        problems.push(format!(
            "env entry #{} has invalid name set: {:?}; a valid environment variable name must consist of alphabetic characters, digits, '_', '-', or '.', and must not start with a digit",
            i, name
        ));
    }
}

fn validate_envs(envs: &[Env]) -> Vec<String> {
    let mut problems = Vec::new();
    for (i, env) in envs.iter().enumerate() {
        match (env.name.as_deref(), env.value.as_deref()) {
            (None, None) => problems.push(format!("env entry #{} is not properly set", i)),
            (Some(name), None) => problems.push(format!(
                "env entry #{} is missing value field, only name '{}' is set",
                i, name
            )),
            (None, Some(value)) => {
                if !whole_secret().is_match(value) && !whole_config_map().is_match(value) {
                    problems.push(format!(
                        "env entry #{} has invalid value field set, it has '{}', but allowed is only '{{{{ secret:secretName }}}}' or '{{{{ configMap:configMapName }}}}'",
                        i, value
                    ));
                }
            }
            (Some(name), Some(value)) => {
                check_env_name(i, name, &mut problems);
                if value.starts_with("{{")
                    && !local_env().is_match(value)
                    && !key_from_secret().is_match(value)
                    && !key_from_config_map().is_match(value)
                {
                    problems.push(format!(
                        "env entry #{} with name '{}' has invalid value field set, it has '{}', but allowed is only '{{{{ env:MY_ENV }}}}', '{{{{ secret:secretName:key }}}}' or '{{{{ configMap:configMapName:key }}}}'",
                        i, name, value
                    ));
                }
            }
        }
    }
    problems
}

fn validate_build_envs(envs: &[Env]) -> Vec<String> {
    let mut problems = Vec::new();
    for (i, env) in envs.iter().enumerate() {
        match (env.name.as_deref(), env.value.as_deref()) {
            (None, None) | (None, Some(_)) => {
                problems.push(format!("env entry #{} is not properly set", i))
            }
            (Some(name), None) => problems.push(format!(
                "env entry #{} is missing value field, only name '{}' is set",
                i, name
            )),
            (Some(name), Some(value)) => {
                check_env_name(i, name, &mut problems);
                if value.starts_with("{{") && !local_env().is_match(value) {
                    problems.push(format!(
                        "env entry #{} with name '{}' has invalid value field set, it has '{}', but allowed is only '{{{{ env:MY_ENV }}}}'",
                        i, name, value
                    ));
                }
            }
        }
    }
    problems
}

fn validate_labels(labels: &[Label]) -> Vec<String> {
    let mut problems = Vec::new();
    for (i, label) in labels.iter().enumerate() {
        let (key, value) = match (label.key.as_deref(), label.value.as_deref()) {
            (None, None) => {
                problems.push(format!("label entry #{} is not properly set", i));
                continue;
            }
            (None, Some(value)) => {
                problems.push(format!(
                    "label entry #{} is missing key field, only value '{}' is set",
                    i, value
                ));
                continue;
            }
            (Some(key), value) => (key, value),
        };

        if key.len() > 316 || !label_key().is_match(key) {
            problems.push(format!("label entry #{} has invalid key set: {:?}", i, key));
        }
        let Some(value) = value else { continue };

        if value.starts_with("{{") {
            match local_env().captures(value) {
                None => problems.push(format!(
                    "label entry #{} with key '{}' has invalid value field set, it has '{}', but allowed is only '{{{{ env:MY_ENV }}}}'",
                    i, key, value
                )),
                Some(caps) => {
                    let resolved = std::env::var(&caps[1]).unwrap_or_default();
                    if !valid_label_value(&resolved) {
                        problems.push(format!(
                            "label entry #{} with key '{}' has invalid value when the environment is evaluated: '{}'",
                            i, key, resolved
                        ));
                    }
                }
            }
        } else if !valid_label_value(value) {
            problems.push(format!("label entry #{} has invalid value set: {:?}", i, value));
        }
    }
    problems
}

fn valid_label_value(value: &str) -> bool {
    value.len() <= 63 && label_value().is_match(value)
}

fn validate_git(git: &Git) -> Vec<String> {
    let Some(url) = git.url.as_deref() else {
        return Vec::new();
    };
    let scp_like = url.contains('@') && url.contains(':');
    let with_scheme = url
        .split_once("://")
        .map(|(scheme, rest)| !scheme.is_empty() && !rest.is_empty())
        .unwrap_or(false);
    if scp_like || with_scheme {
        Vec::new()
    } else {
        vec![format!("specified git URL '{}' is not valid", url)]
    }
}
