//! Pluggable lifecycle strategies
//!
//! The client drives a function through build, push, deploy and friends by
//! delegating to these collaborators. Every one of them is optional on a
//! client; calling an operation whose strategy is absent fails with
//! [`FunctionError::StrategyNotConfigured`].
//!
//! Collaborators report failures as `anyhow::Error`; the client wraps them
//! in [`FunctionError::Strategy`] with the phase and function name.

use crate::error::{FunctionError, Phase, Result};
use crate::function::Function;
use crate::job::Job;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Builds a function's source into a container image tagged per the
/// descriptor
#[async_trait]
pub trait Builder: Send + Sync {
    async fn build(&self, f: &Function) -> anyhow::Result<()>;
}

/// Pushes a built image to its registry
#[async_trait]
pub trait Pusher: Send + Sync {
    /// Returns the digest of the pushed image; empty if unknown
    async fn push(&self, f: &Function) -> anyhow::Result<String>;
}

/// Deploys (or updates) a function from its image
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(&self, f: &Function) -> anyhow::Result<DeployResult>;
}

/// Runs a function locally
///
/// The returned [`Job`] owns the running instance until its `stop()` is
/// called; nothing reaps it automatically.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, f: &Function, start_timeout: Duration) -> anyhow::Result<Job>;
}

/// Removes a deployed function
#[async_trait]
pub trait Remover: Send + Sync {
    async fn remove(&self, name: &str, namespace: &str) -> anyhow::Result<()>;
}

/// Lists deployed functions
#[async_trait]
pub trait Lister: Send + Sync {
    /// An empty namespace lists every namespace the lister can see
    async fn list(&self, namespace: &str) -> anyhow::Result<Vec<ListItem>>;
}

/// Describes the remote instance of a function
#[async_trait]
pub trait Describer: Send + Sync {
    async fn describe(&self, name: &str, namespace: &str) -> anyhow::Result<Instance>;
}

/// Remote build-and-deploy pipelines
#[async_trait]
pub trait PipelinesProvider: Send + Sync {
    /// Start a pipeline run; returns the function's URL and the namespace
    /// it was deployed to
    async fn run(&self, f: &Function) -> anyhow::Result<(String, String)>;

    /// Remove every pipeline resource belonging to the function
    async fn remove(&self, f: &Function) -> anyhow::Result<()>;
}

/// Outcome reported by a [`Deployer`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStatus {
    #[default]
    Failed,
    Deployed,
    Updated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployResult {
    pub status: DeployStatus,
    pub url: String,
    pub namespace: String,
}

/// One deployed function as reported by a [`Lister`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListItem {
    pub name: String,
    pub namespace: String,
    pub runtime: String,
    pub url: String,
    pub ready: String,
}

/// Point-in-time view of a function running in some environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Primary route
    #[serde(default)]
    pub route: String,
    /// The primary route plus any other route the function answers on
    #[serde(default)]
    pub routes: Vec<String>,
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

/// An active event subscription
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub broker: String,
}

/// Await a strategy call unless `cancel` fires first.
///
/// Collaborator errors become [`FunctionError::Strategy`]; cancellation
/// drops the in-flight future and yields [`FunctionError::Cancelled`].
pub(crate) async fn call<T, F>(
    cancel: &CancellationToken,
    phase: Phase,
    function: &str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FunctionError::Cancelled),
        result = fut => result.map_err(|e| FunctionError::strategy(phase, function, e)),
    }
}
