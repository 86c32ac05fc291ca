//! Remote build-and-deploy pipelines backed by cluster resources
//!
//! [`ResourcePipelinesProvider`] implements [`PipelinesProvider`] over a
//! [`ClusterResources`] collaborator that knows how to apply, start and
//! delete the actual resources. Removal deletes every kind of resource a
//! function's pipeline owns concurrently and reports all real failures
//! together once every deletion has finished.

use crate::function::Function;
use crate::strategy::PipelinesProvider;
use anyhow::anyhow;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Label carried by every resource created for a function
pub const FUNCTION_NAME_LABEL: &str = "function.knative.dev/name";

/// Resource kinds owned by a function's pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Pipelines,
    PipelineRuns,
    Secrets,
    PersistentVolumeClaims,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Pipelines,
        ResourceKind::PipelineRuns,
        ResourceKind::Secrets,
        ResourceKind::PersistentVolumeClaims,
    ];
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Pipelines => "pipelines",
            ResourceKind::PipelineRuns => "pipelineruns",
            ResourceKind::Secrets => "secrets",
            ResourceKind::PersistentVolumeClaims => "persistentvolumeclaims",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0} not found")]
    NotFound(ResourceKind),

    #[error("access to {0} is forbidden")]
    Forbidden(ResourceKind),

    #[error("failed to delete {kind}: {source}")]
    Delete {
        kind: ResourceKind,
        #[source]
        source: anyhow::Error,
    },

    #[error("error deleting resources:{}", .0.iter().map(|e| format!("\n {}", e)).collect::<String>())]
    Aggregate(Vec<PipelineError>),
}

impl PipelineError {
    /// Outcomes that count as a successful deletion
    pub fn is_benign(&self) -> bool {
        matches!(self, PipelineError::NotFound(_) | PipelineError::Forbidden(_))
    }
}

/// The cluster operations a pipeline needs
#[async_trait]
pub trait ClusterResources: Send + Sync {
    /// Create or update the pipeline definition for `f`
    async fn apply_pipeline(&self, f: &Function, namespace: &str) -> anyhow::Result<()>;

    /// Start a run of the pipeline; returns the deployed function's URL
    async fn start_run(&self, f: &Function, namespace: &str) -> anyhow::Result<String>;

    /// Delete every resource of `kind` matching the label `selector`
    async fn delete(
        &self,
        kind: ResourceKind,
        namespace: &str,
        selector: &str,
    ) -> Result<(), PipelineError>;
}

/// [`PipelinesProvider`] over [`ClusterResources`]
pub struct ResourcePipelinesProvider {
    resources: Arc<dyn ClusterResources>,
    namespace: String,
}

impl ResourcePipelinesProvider {
    /// `namespace` applies to functions that do not name their own
    pub fn new(resources: Arc<dyn ClusterResources>, namespace: impl Into<String>) -> Self {
        Self {
            resources,
            namespace: namespace.into(),
        }
    }

    fn namespace_for(&self, f: &Function) -> anyhow::Result<String> {
        let namespace = if f.deploy.namespace.is_empty() {
            &self.namespace
        } else {
            &f.deploy.namespace
        };
        if namespace.is_empty() {
            return Err(anyhow!("a namespace is required to run pipelines"));
        }
        Ok(namespace.clone())
    }

    /// Delete all pipeline resources of the function named `name`.
    ///
    /// Every kind is attempted even when another fails; not-found and
    /// forbidden outcomes are ignored.
    pub async fn remove_resources(&self, name: &str, namespace: &str) -> Result<(), PipelineError> {
        let selector = format!("{}={}", FUNCTION_NAME_LABEL, name);
        let (tx, mut rx) = mpsc::channel(ResourceKind::ALL.len());

        for kind in ResourceKind::ALL {
            let resources = self.resources.clone();
            let namespace = namespace.to_string();
            let selector = selector.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = resources.delete(kind, &namespace, &selector).await;
                let _ = tx.send((kind, result)).await;
            });
        }
        drop(tx);

        let mut failures = Vec::new();
        while let Some((kind, result)) = rx.recv().await {
            match result {
                Ok(()) => debug!(%kind, function = name, "deleted pipeline resources"),
                Err(e) if e.is_benign() => debug!(%kind, error = %e, "ignoring deletion outcome"),
                Err(e) => {
                    warn!(%kind, error = %e, "failed to delete pipeline resources");
                    failures.push(e);
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Aggregate(failures))
        }
    }
}

#[async_trait]
impl PipelinesProvider for ResourcePipelinesProvider {
    async fn run(&self, f: &Function) -> anyhow::Result<(String, String)> {
        let namespace = self.namespace_for(f)?;
        self.resources.apply_pipeline(f, &namespace).await?;
        let url = self.resources.start_run(f, &namespace).await?;
        info!(function = %f.name, namespace = %namespace, "pipeline run completed");
        Ok((url, namespace))
    }

    async fn remove(&self, f: &Function) -> anyhow::Result<()> {
        if f.name.is_empty() {
            return Err(anyhow!("function name is required to remove pipelines"));
        }
        let namespace = self.namespace_for(f)?;
        self.remove_resources(&f.name, &namespace).await?;
        Ok(())
    }
}
