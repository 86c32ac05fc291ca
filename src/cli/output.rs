//! Output formatting for multiple formats
//!
//! Every command result renders as JSON, YAML or human-readable text. The
//! structured formats serialize the library's own types; the human format
//! lays them out for a terminal.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::ClientConfig;
use crate::function::Function;
use crate::invoke::InvokeResponse;
use crate::strategy::{DeployResult, DeployStatus, Instance, ListItem};

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format (human-friendly, version-control friendly)
    Yaml,
    /// Human-readable formatted text
    Human,
}

/// Output formatter for command results
pub struct OutputFormatter {
    format: OutputFormat,
}

/// Middleware versions keyed by runtime, then invocation format
pub type MiddlewareVersions = BTreeMap<String, BTreeMap<String, String>>;

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// A function descriptor after create or build
    pub fn format_function(&self, f: &Function) -> Result<String> {
        self.structured_or(f, "function", || {
            let mut output = String::new();
            output.push_str(&format!("Function: {}\n", f.name));
            output.push_str(&format!("{}\n", RULE));
            output.push_str(&format!("Root:     {}\n", f.root.display()));
            output.push_str(&format!("Runtime:  {}\n", f.runtime));
            if !f.invoke.is_empty() {
                output.push_str(&format!("Invoke:   {}\n", f.invoke));
            }
            if !f.build.image.is_empty() {
                output.push_str(&format!("Image:    {}\n", f.build.image));
            } else if !f.image.is_empty() {
                output.push_str(&format!("Image:    {}\n", f.image));
            }
            if !f.image_digest.is_empty() {
                output.push_str(&format!("Digest:   {}\n", f.image_digest));
            }
            if let Some(created) = f.created {
                output.push_str(&format!("Created:  {}\n", created.to_rfc3339()));
            }
            output
        })
    }

    pub fn format_deploy(&self, f: &Function, result: &DeployResult) -> Result<String> {
        self.structured_or(result, "deploy result", || {
            let verb = match result.status {
                DeployStatus::Deployed => "deployed",
                DeployStatus::Updated => "updated",
                DeployStatus::Failed => "failed to deploy",
            };
            let mut output = format!(
                "\u{2713} Function {} in namespace \"{}\"\n",
                verb, result.namespace
            );
            output.push_str(&format!("\u{251C}\u{2500} Name:  {}\n", f.name));
            output.push_str(&format!("\u{251C}\u{2500} Image: {}\n", f.deploy.image));
            output.push_str(&format!("\u{2514}\u{2500} URL:   {}\n", result.url));
            output
        })
    }

    pub fn format_list(&self, items: &[ListItem]) -> Result<String> {
        self.structured_or(items, "function list", || {
            if items.is_empty() {
                return "No functions found\n".to_string();
            }
            let width = items.iter().map(|i| i.name.len()).max().unwrap_or(4).max(4);
            let ns_width = items
                .iter()
                .map(|i| i.namespace.len())
                .max()
                .unwrap_or(9)
                .max(9);
            let mut output = format!(
                "{:<width$}  {:<ns_width$}  {:<10}  {:<5}  URL\n",
                "NAME",
                "NAMESPACE",
                "RUNTIME",
                "READY",
                width = width,
                ns_width = ns_width
            );
            for item in items {
                output.push_str(&format!(
                    "{:<width$}  {:<ns_width$}  {:<10}  {:<5}  {}\n",
                    item.name,
                    item.namespace,
                    item.runtime,
                    item.ready,
                    item.url,
                    width = width,
                    ns_width = ns_width
                ));
            }
            output
        })
    }

    pub fn format_instance(&self, instance: &Instance) -> Result<String> {
        self.structured_or(instance, "instance", || {
            let mut output = format!("Function: {}\n{}\n", instance.name, RULE);
            if !instance.namespace.is_empty() {
                output.push_str(&format!("Namespace: {}\n", instance.namespace));
            }
            if !instance.image.is_empty() {
                output.push_str(&format!("Image:     {}\n", instance.image));
            }
            output.push_str("\nRoutes:\n");
            if instance.routes.is_empty() {
                output.push_str("  (none)\n");
            }
            for route in &instance.routes {
                output.push_str(&format!("  {}\n", route));
            }
            if !instance.subscriptions.is_empty() {
                output.push_str("\nSubscriptions (Source, Type, Broker):\n");
                for s in &instance.subscriptions {
                    output.push_str(&format!("  {} {} {}\n", s.source, s.kind, s.broker));
                }
            }
            output
        })
    }

    pub fn format_invoke(&self, response: &InvokeResponse) -> Result<String> {
        self.structured_or(response, "invoke response", || {
            let mut output = String::new();
            for (name, values) in &response.headers {
                for value in values {
                    output.push_str(&format!("{}: {}\n", name, value));
                }
            }
            if !response.headers.is_empty() {
                output.push('\n');
            }
            output.push_str(&response.body);
            if !response.body.ends_with('\n') {
                output.push('\n');
            }
            output
        })
    }

    /// A plain list of names (runtimes, templates, repositories)
    pub fn format_names(&self, title: &str, names: &[String]) -> Result<String> {
        self.structured_or(names, title, || {
            let mut output = format!("{}:\n", title);
            for name in names {
                output.push_str(&format!("  {}\n", name));
            }
            output
        })
    }

    /// Template names per runtime
    pub fn format_templates(&self, templates: &BTreeMap<String, Vec<String>>) -> Result<String> {
        self.structured_or(templates, "templates", || {
            let mut output = String::from("LANGUAGE     TEMPLATE\n");
            for (runtime, names) in templates {
                for name in names {
                    output.push_str(&format!("{:<12} {}\n", runtime, name));
                }
            }
            output
        })
    }

    pub fn format_middleware(&self, versions: &MiddlewareVersions) -> Result<String> {
        self.structured_or(versions, "middleware versions", || {
            let mut output = String::from("Middleware Versions\n");
            output.push_str(&format!("{}\n", RULE));
            for (runtime, invokes) in versions {
                output.push_str(&format!("{}:\n", runtime));
                for (invoke, version) in invokes {
                    let version = if version.is_empty() { "(unversioned)" } else { version };
                    output.push_str(&format!("  {:<11} {}\n", invoke, version));
                }
            }
            output
        })
    }

    pub fn format_config(&self, config: &ClientConfig) -> Result<String> {
        let map = config.to_display_map();
        self.structured_or(&map, "config", || {
            let mut output = String::from("Configuration\n");
            output.push_str(&format!("{}\n", RULE));
            for (key, value) in &map {
                output.push_str(&format!("{:<18} {}\n", key, value));
            }
            output
        })
    }

    fn structured_or<T, H>(&self, value: &T, what: &str, human: H) -> Result<String>
    where
        T: Serialize + ?Sized,
        H: FnOnce() -> String,
    {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(value)
                .with_context(|| format!("Failed to serialize {} to JSON", what)),
            OutputFormat::Yaml => serde_yaml::to_string(value)
                .with_context(|| format!("Failed to serialize {} to YAML", what)),
            OutputFormat::Human => Ok(human()),
        }
    }
}
