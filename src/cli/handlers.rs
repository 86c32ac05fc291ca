//! Command handlers: each builds a [`Client`] from the environment and the
//! global flags, runs one operation and renders its result.

use super::commands::{
    BuildArgs, CliArgs, Commands, CreateArgs, DeleteArgs, DeployArgs, DescribeArgs, InvokeArgs,
    MiddlewareArgs, OutputFormatArg, RepositoryCommands, RunArgs, ScaffoldArgs, TemplatesArgs,
};
use super::output::{MiddlewareVersions, OutputFormatter};
use super::progress::SpinnerHandler;
use crate::client::{Client, DeployOptions, RunOptions};
use crate::config::ClientConfig;
use crate::error::FunctionError;
use crate::function::{built, Function};
use crate::invoke::InvokeMessage;
use crate::repository::embedded_filesystem;
use crate::scaffolding::{middleware_version, middleware_versions};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Run the parsed command; returns the process exit code
pub async fn dispatch(args: &CliArgs) -> i32 {
    let config = ClientConfig::default();
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        eprintln!("\nPlease check your FUNC_* environment variables.");
        return 1;
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    let formatter = OutputFormatter::new(args.output.into());
    let result = match &args.command {
        Commands::Create(create) => handle_create(args, &config, create, &formatter),
        Commands::Build(build) => handle_build(args, &config, build, &cancel, &formatter).await,
        Commands::Deploy(deploy) => handle_deploy(args, &config, deploy, &cancel, &formatter).await,
        Commands::Run(run) => handle_run(args, &config, run, &cancel).await,
        Commands::Delete(delete) => handle_delete(args, &config, delete, &cancel).await,
        Commands::List(_) => {
            let items = client(args, &config).list(&cancel).await;
            items
                .map_err(anyhow::Error::from)
                .and_then(|items| formatter.format_list(&items))
        }
        Commands::Describe(describe) => {
            handle_describe(args, &config, describe, &cancel, &formatter).await
        }
        Commands::Invoke(invoke) => handle_invoke(args, &config, invoke, &cancel, &formatter).await,
        Commands::Runtimes => client(args, &config)
            .runtimes()
            .map_err(anyhow::Error::from)
            .and_then(|runtimes| formatter.format_names("Runtimes", &runtimes)),
        Commands::Templates(templates) => handle_templates(args, &config, templates, &formatter),
        Commands::Scaffold(scaffold) => handle_scaffold(args, &config, scaffold),
        Commands::Middleware(middleware) => handle_middleware(middleware, &formatter),
        Commands::Config => formatter.format_config(&config),
        Commands::Repository(command) => handle_repository(args, &config, command, &formatter),
    };

    match result {
        Ok(output) => {
            if !output.is_empty() {
                print!("{}", output);
            }
            0
        }
        Err(e) => report(&e),
    }
}

fn report(e: &anyhow::Error) -> i32 {
    if let Some(FunctionError::Cancelled) = e.downcast_ref::<FunctionError>() {
        eprintln!("Cancelled");
        return 130;
    }
    error!("{:#}", e);
    if let Some(FunctionError::StrategyNotConfigured(strategy)) = e.downcast_ref::<FunctionError>()
    {
        eprintln!(
            "\nThis build of funcbox has no {} available; embed the library with your own strategy to use this command.",
            strategy
        );
    }
    1
}

fn client_with(args: &CliArgs, config: &ClientConfig, repository: Option<&str>) -> Client {
    let progress = if args.quiet || args.output != OutputFormatArg::Human {
        SpinnerHandler::hidden()
    } else {
        SpinnerHandler::new()
    };
    let mut builder = Client::builder()
        .from_config(config)
        .with_verbose(args.verbose || config.verbose)
        .with_progress(Arc::new(progress));
    if let Some(uri) = repository {
        builder = builder.with_repository(uri);
    }
    builder.build()
}

fn client(args: &CliArgs, config: &ClientConfig) -> Client {
    client_with(args, config, None)
}

fn handle_create(
    args: &CliArgs,
    config: &ClientConfig,
    create: &CreateArgs,
    formatter: &OutputFormatter,
) -> Result<String> {
    let client = client_with(args, config, create.repository.as_deref());
    let f = client.create(Function {
        root: create.path.clone(),
        name: create.name.clone().unwrap_or_default(),
        runtime: create.language.clone(),
        template: create.template.clone().unwrap_or_default(),
        ..Default::default()
    })?;
    info!(function = %f.name, root = %f.root.display(), "Function created");
    formatter.format_function(&f)
}

/// Apply image overrides from the command line and persist them
fn load_with_overrides(
    path: &std::path::Path,
    registry: Option<&String>,
    image: Option<&String>,
) -> Result<Function> {
    let mut f = Function::load(path)?;
    if let Some(registry) = registry {
        f.registry = registry.clone();
    }
    if let Some(image) = image {
        f.image = image.clone();
    }
    f.write()?;
    Ok(f)
}

async fn handle_build(
    args: &CliArgs,
    config: &ClientConfig,
    build: &BuildArgs,
    cancel: &CancellationToken,
    formatter: &OutputFormatter,
) -> Result<String> {
    let mut f = load_with_overrides(&build.path.path, build.registry.as_ref(), build.image.as_ref())?;
    if let Some(builder) = &build.builder {
        f.build.builder = builder.clone();
    }
    if let Some(image) = &build.builder_image {
        let builder = if f.build.builder.is_empty() {
            config.builder.clone()
        } else {
            f.build.builder.clone()
        };
        f.build.builder_images.insert(builder, image.clone());
    }

    let client = client(args, config);
    let mut f = client.build_function(cancel, f).await?;
    if build.push {
        f = client.push_function(cancel, f).await?;
    }
    formatter.format_function(&f)
}

async fn handle_deploy(
    args: &CliArgs,
    config: &ClientConfig,
    deploy: &DeployArgs,
    cancel: &CancellationToken,
    formatter: &OutputFormatter,
) -> Result<String> {
    let mut f = load_with_overrides(&deploy.path.path, deploy.registry.as_ref(), deploy.image.as_ref())?;
    if let Some(namespace) = &deploy.namespace {
        f.deploy.namespace = namespace.clone();
    }
    let client = client(args, config);

    if deploy.remote {
        let (f, url) = client.run_pipeline(cancel, f).await?;
        info!(function = %f.name, url = %url, "Remote deployment complete");
        return formatter.format_function(&f);
    }

    if !deploy.no_build && !built(&f.root) {
        f = client.build_function(cancel, f).await?;
        f = client.push_function(cancel, f).await?;
    }
    let options = DeployOptions {
        skip_built_check: deploy.no_build,
    };
    let (f, result) = client.deploy_function(cancel, f, options).await?;
    formatter.format_deploy(&f, &result)
}

async fn handle_run(
    args: &CliArgs,
    config: &ClientConfig,
    run: &RunArgs,
    cancel: &CancellationToken,
) -> Result<String> {
    let options = RunOptions {
        start_timeout: run.start_timeout.map(Duration::from_secs),
    };
    let job = client(args, config).run(cancel, &run.path.path, options).await?;
    eprintln!("Function running on {}", job.url());

    let failure = match job.take_errors() {
        Some(mut errors) => {
            tokio::select! {
                _ = cancel.cancelled() => None,
                e = errors.recv() => e,
            }
        }
        None => {
            cancel.cancelled().await;
            None
        }
    };
    job.stop()?;
    match failure {
        Some(e) => Err(e.context("function exited")),
        None => Ok(String::new()),
    }
}

async fn handle_delete(
    args: &CliArgs,
    config: &ClientConfig,
    delete: &DeleteArgs,
    cancel: &CancellationToken,
) -> Result<String> {
    let mut target = Function {
        name: delete.name.clone().unwrap_or_default(),
        root: delete.path.path.clone(),
        ..Default::default()
    };
    if let Some(namespace) = &delete.namespace {
        target.deploy.namespace = namespace.clone();
    }
    client(args, config).remove(cancel, &target, delete.all).await?;
    Ok(String::from("Removed function\n"))
}

async fn handle_describe(
    args: &CliArgs,
    config: &ClientConfig,
    describe: &DescribeArgs,
    cancel: &CancellationToken,
    formatter: &OutputFormatter,
) -> Result<String> {
    let name = describe.name.as_deref().unwrap_or_default();
    let instance = client(args, config)
        .describe(cancel, name, Some(&describe.path.path))
        .await?;
    formatter.format_instance(&instance)
}

async fn handle_invoke(
    args: &CliArgs,
    config: &ClientConfig,
    invoke: &InvokeArgs,
    cancel: &CancellationToken,
    formatter: &OutputFormatter,
) -> Result<String> {
    let mut message = InvokeMessage {
        format: invoke.format.clone(),
        ..Default::default()
    };
    if let Some(id) = &invoke.id {
        message.id = id.clone();
    }
    if let Some(source) = &invoke.source {
        message.source = source.clone();
    }
    if let Some(kind) = &invoke.kind {
        message.kind = kind.clone();
    }
    if let Some(content_type) = &invoke.content_type {
        message.content_type = content_type.clone();
    }
    if let Some(data) = &invoke.data {
        message.data = data.clone();
    } else if let Some(file) = &invoke.file {
        message.data = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
    }

    let response = client(args, config)
        .invoke(cancel, &invoke.path.path, &invoke.target, &message)
        .await?;
    formatter.format_invoke(&response)
}

fn handle_templates(
    args: &CliArgs,
    config: &ClientConfig,
    templates: &TemplatesArgs,
    formatter: &OutputFormatter,
) -> Result<String> {
    let client = client(args, config);
    if let Some(runtime) = &templates.runtime {
        let names = client.templates().list(runtime)?;
        return formatter.format_names(&format!("Templates for {}", runtime), &names);
    }

    let mut all: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for runtime in client.runtimes()? {
        let names = client.templates().list(&runtime)?;
        all.insert(runtime, names);
    }
    formatter.format_templates(&all)
}

fn handle_scaffold(args: &CliArgs, config: &ClientConfig, scaffold: &ScaffoldArgs) -> Result<String> {
    client(args, config).scaffold(&scaffold.path.path, &scaffold.dest)?;
    Ok(format!("Wrote scaffolding to {}\n", scaffold.dest.display()))
}

fn handle_middleware(middleware: &MiddlewareArgs, formatter: &OutputFormatter) -> Result<String> {
    let fs = embedded_filesystem()?;
    let versions: MiddlewareVersions = match &middleware.path {
        Some(path) => {
            let f = Function::load(path)?;
            let version = middleware_version(&f.root, &f.runtime, &f.invoke, fs.as_ref())?;
            let invoke = if f.invoke.is_empty() {
                crate::function::DEFAULT_INVOKE.to_string()
            } else {
                f.invoke.clone()
            };
            let mut versions = MiddlewareVersions::new();
            versions.entry(f.runtime.clone()).or_default().insert(invoke, version);
            versions
        }
        None => middleware_versions(fs.as_ref())?,
    };
    formatter.format_middleware(&versions)
}

fn handle_repository(
    args: &CliArgs,
    config: &ClientConfig,
    command: &RepositoryCommands,
    formatter: &OutputFormatter,
) -> Result<String> {
    let client = client(args, config);
    let repositories = client.repositories();
    match command {
        RepositoryCommands::List => formatter.format_names("Repositories", &repositories.list()?),
        RepositoryCommands::Add { name, uri } => {
            let name = repositories.add(Some(name.as_str()), uri)?;
            Ok(format!("Repository added: {}\n", name))
        }
        RepositoryCommands::Rename { from, to } => {
            repositories.rename(from, to)?;
            Ok(format!("Repository renamed: {} -> {}\n", from, to))
        }
        RepositoryCommands::Remove { name } => {
            repositories.remove(name)?;
            Ok(format!("Repository removed: {}\n", name))
        }
    }
}
