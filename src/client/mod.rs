//! The function lifecycle orchestrator
//!
//! [`Client`] creates functions from templates and drives them through
//! build, push, deploy, run and removal by delegating to the strategies it
//! was built with. Each operation reads the descriptor fresh, calls its
//! collaborators in sequence and writes the descriptor back once.
//!
//! # Example
//!
//! ```no_run
//! use funcbox::{Client, ClientConfig, Function};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> funcbox::Result<()> {
//! let config = ClientConfig::default();
//! let client = Client::builder().from_config(&config).build();
//!
//! let f = client.create(Function {
//!     root: "hello".into(),
//!     runtime: "go".into(),
//!     ..Default::default()
//! })?;
//! let f = client.build(&CancellationToken::new(), &f.root).await?;
//! println!("built {}", f.build.image);
//! # Ok(())
//! # }
//! ```

mod builder;
mod images;

pub use builder::{ClientBuilder, DEFAULT_START_TIMEOUT};
pub use images::{builder_image, HOST_BUILDER, PACK_BUILDER, S2I_BUILDER};

use crate::error::{FunctionError, Phase, Result};
use crate::function::{
    absolute, assert_empty_root, built, ensure_funcignore, ensure_run_data_dir, name_from_path,
    with_digest, write_stamp, Function,
};
use crate::instances::Instances;
use crate::invoke::{self, InvokeMessage, InvokeResponse};
use crate::job::Job;
use crate::progress::{ProgressEvent, ProgressHandler};
use crate::repository::{embedded_filesystem, Repositories, Templates};
use crate::scaffolding;
use crate::strategy::{
    self, Builder, DeployResult, DeployStatus, Deployer, Describer, Instance, ListItem, Lister,
    PipelinesProvider, Pusher, Remover, Runner,
};
use chrono::Utc;
use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

const ACTIVITY_INTERVAL: Duration = Duration::from_secs(10);

const BUILD_ACTIVITY: &[&str] = &[
    "Still building",
    "Still building",
    "Yes, still building",
    "Don't give up on me",
    "Still building",
    "This is taking a while",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Deploy even when the function has no current build
    pub skip_built_check: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Overrides the descriptor's and the client's start timeout
    pub start_timeout: Option<Duration>,
}

/// Function lifecycle client
pub struct Client {
    registry: String,
    namespace: String,
    builder_name: String,
    verbose: bool,
    start_timeout: Duration,
    invoke_timeout: Duration,
    repositories: Repositories,
    progress: Arc<dyn ProgressHandler>,
    http: reqwest::Client,
    builder: Option<Arc<dyn Builder>>,
    pusher: Option<Arc<dyn Pusher>>,
    deployer: Option<Arc<dyn Deployer>>,
    runner: Option<Arc<dyn Runner>>,
    remover: Option<Arc<dyn Remover>>,
    lister: Option<Arc<dyn Lister>>,
    describer: Option<Arc<dyn Describer>>,
    pipelines_provider: Option<Arc<dyn PipelinesProvider>>,
}

fn required<'a, T: ?Sized>(strategy: &'a Option<Arc<T>>, name: &'static str) -> Result<&'a T> {
    strategy
        .as_deref()
        .ok_or(FunctionError::StrategyNotConfigured(name))
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repositories
    }

    pub fn templates(&self) -> Templates {
        Templates::new(self.repositories.clone())
    }

    /// Runtimes offered by any configured repository, sorted
    pub fn runtimes(&self) -> Result<Vec<String>> {
        self.repositories.runtimes()
    }

    pub fn instances(&self) -> Instances {
        Instances::new(self.describer.clone(), self.namespace.clone())
    }

    /// Initialize a new function from its runtime's template.
    ///
    /// The root is created if missing and must not already hold a function
    /// or any visible file. The template is resolved before anything is
    /// written, so an unknown runtime or template leaves the root as it was.
    pub fn create(&self, cfg: Function) -> Result<Function> {
        let root = absolute(&cfg.root)?;
        fs::create_dir_all(&root).map_err(|e| FunctionError::io(&root, e))?;

        if Function::load_or_default(&root)?.initialized() {
            return Err(FunctionError::AlreadyInitialized(root));
        }

        let mut f = Function::new_with(Function {
            root: root.clone(),
            ..cfg
        });
        if f.name.is_empty() {
            f.name = name_from_path(&root);
        }
        if f.registry.is_empty() {
            f.registry = self.registry.clone();
        }

        assert_empty_root(&root)?;
        if f.runtime.is_empty() {
            return Err(FunctionError::RuntimeRequired);
        }
        let template = self.templates().get(&f.runtime, &f.template)?;

        ensure_run_data_dir(&root)?;
        ensure_funcignore(&root)?;
        template.write(&mut f)?;

        f.created = Some(Utc::now());
        f.write()?;

        self.progress.on_progress(&ProgressEvent::Created {
            root: root.clone(),
            runtime: f.runtime.clone(),
            template: template.fullname(),
        });
        Function::load(&root)
    }

    /// Create, build, push and deploy a brand-new function.
    ///
    /// Stops at the first failing phase; earlier phases are not undone.
    pub async fn new_function(
        &self,
        cancel: &CancellationToken,
        cfg: Function,
    ) -> Result<(Function, DeployResult)> {
        let f = self.create(cfg)?;
        let f = self.build_function(cancel, f).await?;
        let f = self.push_function(cancel, f).await?;
        self.deploy_function(cancel, f, DeployOptions::default()).await
    }

    /// Build the function at `root`
    pub async fn build(&self, cancel: &CancellationToken, root: impl AsRef<Path>) -> Result<Function> {
        let f = Function::load(root)?;
        self.build_function(cancel, f).await
    }

    /// Build `f` into the image its descriptor names, then save it and
    /// record the build stamp.
    pub async fn build_function(&self, cancel: &CancellationToken, mut f: Function) -> Result<Function> {
        let builder = required(&self.builder, "builder")?;
        f.root = absolute(&f.root)?;
        if !f.initialized() {
            return Err(FunctionError::NotInitialized(f.root));
        }
        if f.registry.is_empty() {
            f.registry = self.registry.clone();
        }
        let image = f.effective_image()?;
        f.build.image = image.clone();

        // The resolved builder image is handed to the builder only.
        let builder_name = if f.build.builder.is_empty() {
            self.builder_name.clone()
        } else {
            f.build.builder.clone()
        };
        let mut building = f.clone();
        let builder_image = builder_image(&f, &builder_name)?;
        if !builder_image.is_empty() {
            building
                .build
                .builder_images
                .insert(builder_name.clone(), builder_image);
        }
        building.build.builder = builder_name;

        info!(function = %f.name, image = %image, "Building function image");
        {
            let _activity = self.activity(Phase::Build);
            self.delegate(cancel, Phase::Build, &f.name, builder.build(&building))
                .await?;
        }

        f.write_built_image(&image)?;
        f.write()?;
        write_stamp(&f.root)?;
        info!(function = %f.name, image = %image, "Function built");
        Ok(f)
    }

    /// Push the built image of the function at `root`
    pub async fn push(&self, cancel: &CancellationToken, root: impl AsRef<Path>) -> Result<Function> {
        let f = Function::load(root)?;
        self.push_function(cancel, f).await
    }

    /// Push the built image of `f`, recording the digest the registry
    /// reports.
    pub async fn push_function(&self, cancel: &CancellationToken, mut f: Function) -> Result<Function> {
        let pusher = required(&self.pusher, "pusher")?;
        f.root = absolute(&f.root)?;
        if !built(&f.root) {
            return Err(FunctionError::NotBuilt);
        }

        let digest = self
            .delegate(cancel, Phase::Push, &f.name, pusher.push(&f))
            .await?;
        if !digest.is_empty() {
            debug!(function = %f.name, digest = %digest, "pushed image digest");
            f.image_digest = digest;
        }
        self.save_keeping_build(&f)?;
        Ok(f)
    }

    /// Deploy the function at `root`
    pub async fn deploy(
        &self,
        cancel: &CancellationToken,
        root: impl AsRef<Path>,
        options: DeployOptions,
    ) -> Result<(Function, DeployResult)> {
        let f = Function::load(root)?;
        self.deploy_function(cancel, f, options).await
    }

    /// Deploy `f` from its effective image, recording the namespace the
    /// deployer reports.
    pub async fn deploy_function(
        &self,
        cancel: &CancellationToken,
        mut f: Function,
        options: DeployOptions,
    ) -> Result<(Function, DeployResult)> {
        let deployer = required(&self.deployer, "deployer")?;
        f.root = absolute(&f.root)?;
        if !options.skip_built_check && !built(&f.root) {
            return Err(FunctionError::NotBuilt);
        }
        if f.name.is_empty() {
            return Err(FunctionError::NameRequired);
        }
        if f.registry.is_empty() {
            f.registry = self.registry.clone();
        }
        f.deploy.image = with_digest(&f.effective_image()?, &f.image_digest);
        if f.deploy.namespace.is_empty() {
            f.deploy.namespace = self.namespace.clone();
        }

        let result = self
            .delegate(cancel, Phase::Deploy, &f.name, deployer.deploy(&f))
            .await?;
        if !result.namespace.is_empty() {
            f.deploy.namespace = result.namespace.clone();
        }
        match result.status {
            DeployStatus::Deployed => {
                info!(function = %f.name, namespace = %f.deploy.namespace, url = %result.url, "Function deployed")
            }
            DeployStatus::Updated => {
                info!(function = %f.name, namespace = %f.deploy.namespace, url = %result.url, "Function updated")
            }
            DeployStatus::Failed => {
                warn!(function = %f.name, namespace = %f.deploy.namespace, "Deployer reported a failed deployment")
            }
        }

        if f.initialized() {
            self.save_keeping_build(&f)?;
        }
        Ok((f, result))
    }

    /// Run the function at `root` locally. The returned [`Job`] keeps the
    /// instance alive until its `stop()` is called.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        root: impl AsRef<Path>,
        options: RunOptions,
    ) -> Result<Job> {
        let runner = required(&self.runner, "runner")?;
        let f = Function::load(root)?;
        if !f.initialized() {
            return Err(FunctionError::NotInitialized(f.root));
        }

        let timeout = options.start_timeout.unwrap_or_else(|| {
            if f.run.start_timeout > 0 {
                Duration::from_secs(f.run.start_timeout)
            } else {
                self.start_timeout
            }
        });
        debug!(function = %f.name, timeout_secs = timeout.as_secs(), "running function");
        self.delegate(cancel, Phase::Run, &f.name, runner.run(&f, timeout))
            .await
    }

    /// Remove a deployed function.
    ///
    /// An explicit `target.name` is used as given. Otherwise the function
    /// at `target.root` is loaded and must be initialized. With
    /// `delete_all`, the function's pipeline resources are removed
    /// alongside it and failures of both are reported together.
    pub async fn remove(&self, cancel: &CancellationToken, target: &Function, delete_all: bool) -> Result<()> {
        let remover = required(&self.remover, "remover")?;
        let pipelines = if delete_all {
            Some(required(&self.pipelines_provider, "pipelines provider")?)
        } else {
            None
        };

        let f = if !target.name.is_empty() {
            target.clone()
        } else {
            if target.root.as_os_str().is_empty() {
                return Err(FunctionError::NameRequired);
            }
            let f = Function::load(&target.root)?;
            if !f.initialized() {
                return Err(FunctionError::NotInitialized(f.root));
            }
            f
        };
        if f.name.is_empty() {
            return Err(FunctionError::NameRequired);
        }
        let namespace = if f.deploy.namespace.is_empty() {
            self.namespace.clone()
        } else {
            f.deploy.namespace.clone()
        };
        let mut pipeline_target = f.clone();
        pipeline_target.deploy.namespace = namespace.clone();

        info!(function = %f.name, namespace = %namespace, delete_all, "Removing function");
        let remove_service = self.delegate(
            cancel,
            Phase::Remove,
            &f.name,
            remover.remove(&f.name, &namespace),
        );
        let remove_pipelines = async {
            match pipelines {
                Some(provider) => {
                    self.delegate(cancel, Phase::Pipeline, &f.name, provider.remove(&pipeline_target))
                        .await
                }
                None => Ok(()),
            }
        };

        match tokio::join!(remove_service, remove_pipelines) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(service), Err(pipelines)) => Err(FunctionError::Multiple(vec![service, pipelines])),
        }
    }

    /// Describe the deployed function named `name`, or else the one at
    /// `root`
    pub async fn describe(&self, cancel: &CancellationToken, name: &str, root: Option<&Path>) -> Result<Instance> {
        if !name.is_empty() {
            return self.instances().remote(cancel, name, None).await;
        }
        let root = root.ok_or(FunctionError::NameRequired)?;
        let f = Function::load(root)?;
        if !f.initialized() {
            return Err(FunctionError::NotInitialized(f.root));
        }
        self.instances().remote(cancel, "", Some(&f.root)).await
    }

    /// Deployed functions in the client's namespace
    pub async fn list(&self, cancel: &CancellationToken) -> Result<Vec<ListItem>> {
        let lister = required(&self.lister, "lister")?;
        self.delegate(cancel, Phase::List, "", lister.list(&self.namespace))
            .await
    }

    /// Build and deploy `f` remotely through the pipelines provider
    pub async fn run_pipeline(&self, cancel: &CancellationToken, mut f: Function) -> Result<(Function, String)> {
        let provider = required(&self.pipelines_provider, "pipelines provider")?;
        f.root = absolute(&f.root)?;
        if f.registry.is_empty() {
            f.registry = self.registry.clone();
        }
        f.deploy.image = f.effective_image()?;
        if f.deploy.namespace.is_empty() {
            f.deploy.namespace = self.namespace.clone();
        }

        let (url, namespace) = self
            .delegate(cancel, Phase::Pipeline, &f.name, provider.run(&f))
            .await?;
        if !namespace.is_empty() {
            f.deploy.namespace = namespace;
        }
        info!(function = %f.name, namespace = %f.deploy.namespace, url = %url, "Pipeline run completed");

        if f.initialized() {
            f.write()?;
        }
        Ok((f, url))
    }

    /// Send `message` to the function at `root`.
    ///
    /// `target` is `local`, `remote`, a URL, or empty to prefer a local
    /// instance.
    pub async fn invoke(
        &self,
        cancel: &CancellationToken,
        root: impl AsRef<Path>,
        target: &str,
        message: &InvokeMessage,
    ) -> Result<InvokeResponse> {
        let f = Function::load(root)?;
        if !f.initialized() {
            return Err(FunctionError::NotInitialized(f.root));
        }
        let route = invoke::route(cancel, &self.instances(), &f, target).await?;
        let format = invoke::format_for(&f, message);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FunctionError::Cancelled),
            response = invoke::send(&self.http, &route, format, message, self.invoke_timeout) => response,
        }
    }

    /// Write the scaffolding for the function at `root` into `dest`
    pub fn scaffold(&self, root: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<()> {
        let f = Function::load(root)?;
        if !f.initialized() {
            return Err(FunctionError::NotInitialized(f.root));
        }
        let fs = embedded_filesystem()?;
        let dest = absolute(dest.as_ref())?;
        scaffolding::write(&dest, &f.root, &f.runtime, &f.invoke, fs.as_ref())
    }

    /// Save `f`, re-stamping the build when it was current before so that
    /// descriptor-only changes do not invalidate it.
    fn save_keeping_build(&self, f: &Function) -> Result<()> {
        let was_built = built(&f.root);
        f.write()?;
        if was_built {
            write_stamp(&f.root)?;
        }
        Ok(())
    }

    /// Run a strategy call, reporting its progress and racing it against
    /// `cancel`
    async fn delegate<T, F>(&self, cancel: &CancellationToken, phase: Phase, function: &str, fut: F) -> Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        self.progress.on_progress(&ProgressEvent::PhaseStarted {
            phase,
            function: function.to_string(),
        });
        let start = Instant::now();
        let result = strategy::call(cancel, phase, function, fut).await;
        match &result {
            Ok(_) => self.progress.on_progress(&ProgressEvent::PhaseComplete {
                phase,
                function: function.to_string(),
                duration: start.elapsed(),
            }),
            Err(e) => self.progress.on_progress(&ProgressEvent::Failed {
                phase,
                error: e.to_string(),
            }),
        }
        result
    }

    /// Periodic reassurance while a long strategy call runs; stops when
    /// the returned guard is dropped. Verbose clients get the collaborator's
    /// own output instead.
    fn activity(&self, phase: Phase) -> Option<DropGuard> {
        if self.verbose {
            return None;
        }
        let stop = CancellationToken::new();
        let stopped = stop.clone();
        let progress = self.progress.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(ACTIVITY_INTERVAL);
            ticker.tick().await;
            let mut messages = BUILD_ACTIVITY.iter().cycle();
            loop {
                tokio::select! {
                    _ = stopped.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Some(message) = messages.next() {
                            progress.on_progress(&ProgressEvent::Activity {
                                phase,
                                message: message.to_string(),
                            });
                        }
                    }
                }
            }
        });
        Some(stop.drop_guard())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBuilder, MockPusher};
    use crate::progress::NoOpHandler;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingHandler {
        events: Mutex<Vec<String>>,
    }

    impl ProgressHandler for RecordingHandler {
        fn on_progress(&self, event: &ProgressEvent) {
            let label = match event {
                ProgressEvent::Created { .. } => "created".to_string(),
                ProgressEvent::PhaseStarted { phase, .. } => format!("{}:started", phase),
                ProgressEvent::Activity { phase, .. } => format!("{}:activity", phase),
                ProgressEvent::PhaseComplete { phase, .. } => format!("{}:complete", phase),
                ProgressEvent::Failed { phase, .. } => format!("{}:failed", phase),
            };
            self.events.lock().unwrap().push(label);
        }
    }

    fn create_go(client: &Client, dir: &TempDir) -> Function {
        client
            .create(Function {
                root: dir.path().join("hello"),
                runtime: "go".into(),
                ..Default::default()
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_strategy_fails_fast() {
        let dir = TempDir::new().unwrap();
        let client = Client::builder()
            .with_registry("example.com/alice")
            .with_progress(Arc::new(NoOpHandler))
            .build();
        let f = create_go(&client, &dir);

        let result = client.build(&CancellationToken::new(), &f.root).await;
        assert!(matches!(result, Err(FunctionError::StrategyNotConfigured("builder"))));
        let result = client.list(&CancellationToken::new()).await;
        assert!(matches!(result, Err(FunctionError::StrategyNotConfigured("lister"))));
    }

    #[tokio::test]
    async fn test_progress_events_for_build() {
        let dir = TempDir::new().unwrap();
        let handler = Arc::new(RecordingHandler::default());
        let client = Client::builder()
            .with_registry("example.com/alice")
            .with_builder(Arc::new(MockBuilder::new()))
            .with_progress(handler.clone())
            .build();
        let f = create_go(&client, &dir);
        client.build(&CancellationToken::new(), &f.root).await.unwrap();

        let events = handler.events.lock().unwrap().clone();
        assert_eq!(events, vec!["created", "build:started", "build:complete"]);
    }

    #[tokio::test]
    async fn test_failed_phase_is_reported() {
        let dir = TempDir::new().unwrap();
        let handler = Arc::new(RecordingHandler::default());
        let client = Client::builder()
            .with_registry("example.com/alice")
            .with_builder(Arc::new(MockBuilder::with_behaviour(|_| {
                Err(anyhow::anyhow!("no space left"))
            })))
            .with_progress(handler.clone())
            .build();
        let f = create_go(&client, &dir);

        let err = client
            .build(&CancellationToken::new(), &f.root)
            .await
            .unwrap_err();
        assert!(matches!(err, FunctionError::Strategy { phase: Phase::Build, .. }));
        assert!(handler.events.lock().unwrap().contains(&"build:failed".to_string()));
        assert!(!built(&f.root));
    }

    #[tokio::test]
    async fn test_push_keeps_build_current() {
        let dir = TempDir::new().unwrap();
        let client = Client::builder()
            .with_registry("example.com/alice")
            .with_builder(Arc::new(MockBuilder::new()))
            .with_pusher(Arc::new(MockPusher::with_behaviour(|_| {
                Ok("sha256:1234".to_string())
            })))
            .with_progress(Arc::new(NoOpHandler))
            .build();
        let f = create_go(&client, &dir);
        let cancel = CancellationToken::new();

        client.build(&cancel, &f.root).await.unwrap();
        let pushed = client.push(&cancel, &f.root).await.unwrap();

        assert_eq!(pushed.image_digest, "sha256:1234");
        assert_eq!(Function::load(&f.root).unwrap().image_digest, "sha256:1234");
        assert!(built(&f.root));
    }

    #[tokio::test]
    async fn test_builder_receives_resolved_builder_image() {
        let dir = TempDir::new().unwrap();
        let builder = Arc::new(MockBuilder::new());
        let client = Client::builder()
            .with_registry("example.com/alice")
            .with_builder_name("s2i")
            .with_builder(builder.clone())
            .with_progress(Arc::new(NoOpHandler))
            .build();
        let f = create_go(&client, &dir);
        client.build(&CancellationToken::new(), &f.root).await.unwrap();

        let seen = builder.last_function().unwrap();
        assert_eq!(seen.build.builder, "s2i");
        assert_eq!(
            seen.build.builder_images.get("s2i").map(String::as_str),
            Some("registry.access.redhat.com/ubi8/go-toolset")
        );
        let saved = Function::load(&f.root).unwrap();
        assert!(!saved.build.builder_images.contains_key("s2i"));
    }
}
