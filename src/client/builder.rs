use super::images::PACK_BUILDER;
use super::Client;
use crate::config::ClientConfig;
use crate::invoke::DEFAULT_INVOKE_TIMEOUT;
use crate::progress::{LoggingHandler, ProgressHandler};
use crate::repository::Repositories;
use crate::strategy::{
    Builder, Deployer, Describer, Lister, PipelinesProvider, Pusher, Remover, Runner,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(60);

/// Assembles a [`Client`] from configuration and strategies.
///
/// Strategies left unset make the operations that need them fail with
/// [`crate::FunctionError::StrategyNotConfigured`].
#[derive(Default)]
pub struct ClientBuilder {
    registry: String,
    namespace: String,
    builder_name: Option<String>,
    verbose: bool,
    start_timeout: Option<Duration>,
    invoke_timeout: Option<Duration>,
    repositories_path: Option<PathBuf>,
    repository_uri: Option<String>,
    progress: Option<Arc<dyn ProgressHandler>>,
    http: Option<reqwest::Client>,
    builder: Option<Arc<dyn Builder>>,
    pusher: Option<Arc<dyn Pusher>>,
    deployer: Option<Arc<dyn Deployer>>,
    runner: Option<Arc<dyn Runner>>,
    remover: Option<Arc<dyn Remover>>,
    lister: Option<Arc<dyn Lister>>,
    describer: Option<Arc<dyn Describer>>,
    pipelines_provider: Option<Arc<dyn PipelinesProvider>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply registry, namespace, builder, repositories, verbosity and
    /// start timeout from `config`
    pub fn from_config(mut self, config: &ClientConfig) -> Self {
        self.registry = config.registry.clone();
        self.namespace = config.namespace.clone().unwrap_or_default();
        self.builder_name = Some(config.builder.clone());
        self.verbose = config.verbose;
        self.start_timeout = Some(Duration::from_secs(config.start_timeout));
        self.repositories_path = config.repositories_path.clone();
        self.repository_uri = config.repository_uri.clone();
        self
    }

    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = registry.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Builder used for functions whose descriptor names none
    pub fn with_builder_name(mut self, name: impl Into<String>) -> Self {
        self.builder_name = Some(name.into());
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = Some(timeout);
        self
    }

    /// How long [`Client::invoke`] waits for the function to answer
    pub fn with_invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = Some(timeout);
        self
    }

    pub fn with_repositories_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.repositories_path = Some(path.into());
        self
    }

    /// Use a single template repository in place of the embedded and
    /// extensible ones
    pub fn with_repository(mut self, uri: impl Into<String>) -> Self {
        self.repository_uri = Some(uri.into());
        self
    }

    pub fn with_progress(mut self, handler: Arc<dyn ProgressHandler>) -> Self {
        self.progress = Some(handler);
        self
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_builder(mut self, builder: Arc<dyn Builder>) -> Self {
        self.builder = Some(builder);
        self
    }

    pub fn with_pusher(mut self, pusher: Arc<dyn Pusher>) -> Self {
        self.pusher = Some(pusher);
        self
    }

    pub fn with_deployer(mut self, deployer: Arc<dyn Deployer>) -> Self {
        self.deployer = Some(deployer);
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn with_remover(mut self, remover: Arc<dyn Remover>) -> Self {
        self.remover = Some(remover);
        self
    }

    pub fn with_lister(mut self, lister: Arc<dyn Lister>) -> Self {
        self.lister = Some(lister);
        self
    }

    pub fn with_describer(mut self, describer: Arc<dyn Describer>) -> Self {
        self.describer = Some(describer);
        self
    }

    pub fn with_pipelines_provider(mut self, provider: Arc<dyn PipelinesProvider>) -> Self {
        self.pipelines_provider = Some(provider);
        self
    }

    pub fn build(self) -> Client {
        Client {
            registry: self.registry,
            namespace: self.namespace,
            builder_name: self
                .builder_name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| PACK_BUILDER.to_string()),
            verbose: self.verbose,
            start_timeout: self.start_timeout.unwrap_or(DEFAULT_START_TIMEOUT),
            invoke_timeout: self.invoke_timeout.unwrap_or(DEFAULT_INVOKE_TIMEOUT),
            repositories: Repositories::new(self.repositories_path, self.repository_uri),
            progress: self.progress.unwrap_or_else(|| Arc::new(LoggingHandler)),
            http: self.http.unwrap_or_default(),
            builder: self.builder,
            pusher: self.pusher,
            deployer: self.deployer,
            runner: self.runner,
            remover: self.remover,
            lister: self.lister,
            describer: self.describer,
            pipelines_provider: self.pipelines_provider,
        }
    }
}
