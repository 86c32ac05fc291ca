//! Recording strategy doubles
//!
//! Each mock records that it was invoked and the arguments of every call,
//! then answers through a behaviour closure that tests may replace with
//! [`with_behaviour`](MockBuilder::with_behaviour).

use crate::function::Function;
use crate::job::Job;
use crate::strategy::{
    Builder, DeployResult, DeployStatus, Deployer, Describer, Instance, ListItem, Lister,
    PipelinesProvider, Pusher, Remover, Runner,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Behaviour<Req, Resp> = Box<dyn Fn(&Req) -> Result<Resp> + Send + Sync>;

/// Invocation flag, call log and behaviour shared by every mock
struct Recorder<Req, Resp> {
    invoked: AtomicBool,
    calls: Mutex<Vec<Req>>,
    behaviour: Behaviour<Req, Resp>,
}

impl<Req: Clone, Resp> Recorder<Req, Resp> {
    fn new(behaviour: impl Fn(&Req) -> Result<Resp> + Send + Sync + 'static) -> Self {
        Self {
            invoked: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            behaviour: Box::new(behaviour),
        }
    }

    fn record(&self, request: Req) -> Result<Resp> {
        self.invoked.store(true, Ordering::SeqCst);
        let result = (self.behaviour)(&request);
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request);
        }
        result
    }

    fn invoked(&self) -> bool {
        self.invoked.load(Ordering::SeqCst)
    }

    fn calls(&self) -> Vec<Req> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn last(&self) -> Option<Req> {
        self.calls().pop()
    }
}

macro_rules! recorder_accessors {
    ($mock:ident, $req:ty, $resp:ty) => {
        impl $mock {
            /// Replace the mock's answer
            pub fn with_behaviour(
                behaviour: impl Fn(&$req) -> Result<$resp> + Send + Sync + 'static,
            ) -> Self {
                Self {
                    recorder: Recorder::new(behaviour),
                }
            }

            pub fn invoked(&self) -> bool {
                self.recorder.invoked()
            }

            /// Arguments of every call, oldest first
            pub fn calls(&self) -> Vec<$req> {
                self.recorder.calls()
            }
        }
    };
}

pub struct MockBuilder {
    recorder: Recorder<Function, ()>,
}

impl MockBuilder {
    pub fn new() -> Self {
        Self::with_behaviour(|_| Ok(()))
    }

    pub fn last_function(&self) -> Option<Function> {
        self.recorder.last()
    }
}

recorder_accessors!(MockBuilder, Function, ());

#[async_trait]
impl Builder for MockBuilder {
    async fn build(&self, f: &Function) -> Result<()> {
        self.recorder.record(f.clone())
    }
}

pub struct MockPusher {
    recorder: Recorder<Function, String>,
}

impl MockPusher {
    /// Pushes nothing and reports no digest
    pub fn new() -> Self {
        Self::with_behaviour(|_| Ok(String::new()))
    }

    pub fn last_function(&self) -> Option<Function> {
        self.recorder.last()
    }
}

recorder_accessors!(MockPusher, Function, String);

#[async_trait]
impl Pusher for MockPusher {
    async fn push(&self, f: &Function) -> Result<String> {
        self.recorder.record(f.clone())
    }
}

pub struct MockDeployer {
    recorder: Recorder<Function, DeployResult>,
}

impl MockDeployer {
    /// Reports a fresh deployment to the function's namespace, or
    /// `default`
    pub fn new() -> Self {
        Self::with_behaviour(|f| {
            let namespace = if f.deploy.namespace.is_empty() {
                "default".to_string()
            } else {
                f.deploy.namespace.clone()
            };
            Ok(DeployResult {
                status: DeployStatus::Deployed,
                url: format!("http://{}.{}.example.com", f.name, namespace),
                namespace,
            })
        })
    }

    pub fn last_function(&self) -> Option<Function> {
        self.recorder.last()
    }
}

recorder_accessors!(MockDeployer, Function, DeployResult);

#[async_trait]
impl Deployer for MockDeployer {
    async fn deploy(&self, f: &Function) -> Result<DeployResult> {
        self.recorder.record(f.clone())
    }
}

pub struct MockRunner {
    recorder: Recorder<(Function, Duration), Job>,
}

impl MockRunner {
    /// Records a job on port 8080 without starting anything
    pub fn new() -> Self {
        Self::with_behaviour(|(f, _)| {
            Job::new(f.clone(), "127.0.0.1", 8080, || Ok(())).map_err(anyhow::Error::from)
        })
    }

    /// Start timeout passed to the most recent run
    pub fn last_timeout(&self) -> Option<Duration> {
        self.recorder.last().map(|(_, timeout)| timeout)
    }
}

recorder_accessors!(MockRunner, (Function, Duration), Job);

#[async_trait]
impl Runner for MockRunner {
    async fn run(&self, f: &Function, start_timeout: Duration) -> Result<Job> {
        self.recorder.record((f.clone(), start_timeout))
    }
}

pub struct MockRemover {
    recorder: Recorder<(String, String), ()>,
}

impl MockRemover {
    pub fn new() -> Self {
        Self::with_behaviour(|_| Ok(()))
    }

    /// `(name, namespace)` of the most recent removal
    pub fn last_request(&self) -> Option<(String, String)> {
        self.recorder.last()
    }
}

recorder_accessors!(MockRemover, (String, String), ());

#[async_trait]
impl Remover for MockRemover {
    async fn remove(&self, name: &str, namespace: &str) -> Result<()> {
        self.recorder.record((name.to_string(), namespace.to_string()))
    }
}

pub struct MockLister {
    recorder: Recorder<String, Vec<ListItem>>,
}

impl MockLister {
    pub fn new() -> Self {
        Self::with_behaviour(|_| Ok(Vec::new()))
    }
}

recorder_accessors!(MockLister, String, Vec<ListItem>);

#[async_trait]
impl Lister for MockLister {
    async fn list(&self, namespace: &str) -> Result<Vec<ListItem>> {
        self.recorder.record(namespace.to_string())
    }
}

pub struct MockDescriber {
    recorder: Recorder<(String, String), Instance>,
}

impl MockDescriber {
    pub fn new() -> Self {
        Self::with_behaviour(|(name, namespace)| {
            Ok(Instance {
                name: name.clone(),
                namespace: namespace.clone(),
                ..Default::default()
            })
        })
    }

    /// `(name, namespace)` of the most recent lookup
    pub fn last_request(&self) -> Option<(String, String)> {
        self.recorder.last()
    }
}

recorder_accessors!(MockDescriber, (String, String), Instance);

#[async_trait]
impl Describer for MockDescriber {
    async fn describe(&self, name: &str, namespace: &str) -> Result<Instance> {
        self.recorder.record((name.to_string(), namespace.to_string()))
    }
}

pub struct MockPipelinesProvider {
    run: Recorder<Function, (String, String)>,
    remove: Recorder<Function, ()>,
}

impl MockPipelinesProvider {
    /// Runs succeed into the function's namespace; a function without one
    /// is refused
    pub fn new() -> Self {
        Self::with_behaviours(
            |f| {
                if f.deploy.namespace.is_empty() {
                    return Err(anyhow!("namespace required for initial deployment"));
                }
                Ok((String::new(), f.deploy.namespace.clone()))
            },
            |_| Ok(()),
        )
    }

    pub fn with_behaviours(
        run: impl Fn(&Function) -> Result<(String, String)> + Send + Sync + 'static,
        remove: impl Fn(&Function) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            run: Recorder::new(run),
            remove: Recorder::new(remove),
        }
    }

    pub fn run_invoked(&self) -> bool {
        self.run.invoked()
    }

    pub fn remove_invoked(&self) -> bool {
        self.remove.invoked()
    }

    pub fn last_run(&self) -> Option<Function> {
        self.run.last()
    }
}

#[async_trait]
impl PipelinesProvider for MockPipelinesProvider {
    async fn run(&self, f: &Function) -> Result<(String, String)> {
        self.run.record(f.clone())
    }

    async fn remove(&self, f: &Function) -> Result<()> {
        self.remove.record(f.clone())
    }
}

macro_rules! impl_default {
    ($($mock:ident),*) => {
        $(impl Default for $mock {
            fn default() -> Self {
                Self::new()
            }
        })*
    };
}

impl_default!(
    MockBuilder,
    MockPusher,
    MockDeployer,
    MockRunner,
    MockRemover,
    MockLister,
    MockDescriber,
    MockPipelinesProvider
);

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_calls() {
        let remover = MockRemover::new();
        assert!(!remover.invoked());
        remover.remove("hello", "prod").await.unwrap();
        assert!(remover.invoked());
        assert_eq!(
            remover.last_request(),
            Some(("hello".to_string(), "prod".to_string()))
        );
    }

    #[tokio::test]
    async fn test_behaviour_can_be_replaced() {
        let pusher = MockPusher::with_behaviour(|_| Ok("sha256:abc".to_string()));
        let digest = pusher.push(&Function::default()).await.unwrap();
        assert_eq!(digest, "sha256:abc");
        assert_eq!(pusher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_pipelines_provider_requires_namespace() {
        let provider = MockPipelinesProvider::new();
        assert!(provider.run(&Function::default()).await.is_err());
        assert!(provider.run_invoked());
        assert!(!provider.remove_invoked());
    }
}
