use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Create, build, deploy and invoke functions from templates
#[derive(Parser, Debug)]
#[command(
    name = "funcbox",
    about = "Create, build, deploy and invoke functions from templates",
    version,
    author,
    long_about = "funcbox manages functions: source directories described by a func.yaml \
                  descriptor. It creates them from language templates, builds them into \
                  container images, deploys, runs and invokes them."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(
        short = 'v',
        long,
        global = true,
        help = "Print verbose logs and collaborator output"
    )]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,

    #[arg(
        short = 'o',
        long,
        global = true,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub output: OutputFormatArg,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Create a function from a template",
        long_about = "Creates a new function in the given directory (default: current \
                      directory) from a language runtime template.\n\n\
                      Examples:\n  \
                      funcbox create -l go hello\n  \
                      funcbox create -l python -t cloudevents events"
    )]
    Create(CreateArgs),

    #[command(about = "Build the function's container image")]
    Build(BuildArgs),

    #[command(about = "Deploy the function, building and pushing it first if needed")]
    Deploy(DeployArgs),

    #[command(about = "Run the function locally until interrupted")]
    Run(RunArgs),

    #[command(about = "Delete a deployed function")]
    Delete(DeleteArgs),

    #[command(about = "List deployed functions")]
    List(ListArgs),

    #[command(about = "Describe a deployed function")]
    Describe(DescribeArgs),

    #[command(about = "Send a test message to a running function")]
    Invoke(InvokeArgs),

    #[command(about = "List the available language runtimes")]
    Runtimes,

    #[command(about = "List the templates available for a runtime")]
    Templates(TemplatesArgs),

    #[command(about = "Write the entrypoint scaffolding for a function")]
    Scaffold(ScaffoldArgs),

    #[command(about = "Show the middleware version functions are built against")]
    Middleware(MiddlewareArgs),

    #[command(about = "Show the effective configuration")]
    Config,

    #[command(subcommand, about = "Manage template repositories")]
    Repository(RepositoryCommands),
}

/// Path to the function, defaulting to the current directory
#[derive(Args, Debug, Clone)]
pub struct PathArg {
    #[arg(
        short = 'p',
        long = "path",
        value_name = "PATH",
        default_value = ".",
        help = "Path to the function"
    )]
    pub path: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    #[arg(value_name = "PATH", default_value = ".", help = "Directory to create the function in")]
    pub path: PathBuf,

    #[arg(short = 'l', long, value_name = "RUNTIME", help = "Language runtime")]
    pub language: String,

    #[arg(
        short = 't',
        long,
        value_name = "TEMPLATE",
        help = "Template name, optionally prefixed with its repository (repo/template)"
    )]
    pub template: Option<String>,

    #[arg(long, value_name = "NAME", help = "Function name (default: directory name)")]
    pub name: Option<String>,

    #[arg(short = 'r', long, value_name = "URI", help = "Use this template repository only")]
    pub repository: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    #[command(flatten)]
    pub path: PathArg,

    #[arg(long, value_name = "REGISTRY", help = "Registry used to derive the image name")]
    pub registry: Option<String>,

    #[arg(short = 'i', long, value_name = "IMAGE", help = "Full image name, overriding the registry")]
    pub image: Option<String>,

    #[arg(short = 'b', long, value_name = "BUILDER", help = "Builder to use (host, pack, s2i)")]
    pub builder: Option<String>,

    #[arg(long, value_name = "IMAGE", help = "Builder image for the chosen builder")]
    pub builder_image: Option<String>,

    #[arg(long, help = "Push the image after building")]
    pub push: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
    #[command(flatten)]
    pub path: PathArg,

    #[arg(long, value_name = "REGISTRY", help = "Registry used to derive the image name")]
    pub registry: Option<String>,

    #[arg(short = 'i', long, value_name = "IMAGE", help = "Full image name, overriding the registry")]
    pub image: Option<String>,

    #[arg(short = 'n', long, value_name = "NAMESPACE", help = "Namespace to deploy into")]
    pub namespace: Option<String>,

    #[arg(long, help = "Deploy without building, using the image as is")]
    pub no_build: bool,

    #[arg(long, help = "Build and deploy remotely with a pipeline")]
    pub remote: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub path: PathArg,

    #[arg(long, value_name = "SECONDS", help = "Seconds to wait for the function to start")]
    pub start_timeout: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    #[arg(value_name = "NAME", help = "Name of the function (default: the function at --path)")]
    pub name: Option<String>,

    #[command(flatten)]
    pub path: PathArg,

    #[arg(short = 'n', long, value_name = "NAMESPACE", help = "Namespace of the function")]
    pub namespace: Option<String>,

    #[arg(short = 'a', long, help = "Also delete the function's pipeline resources")]
    pub all: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {}

#[derive(Args, Debug, Clone)]
pub struct DescribeArgs {
    #[arg(value_name = "NAME", help = "Name of the function (default: the function at --path)")]
    pub name: Option<String>,

    #[command(flatten)]
    pub path: PathArg,
}

#[derive(Args, Debug, Clone)]
pub struct InvokeArgs {
    #[command(flatten)]
    pub path: PathArg,

    #[arg(
        long,
        value_name = "TARGET",
        default_value = "",
        help = "local, remote or a URL (default: local, falling back to remote)"
    )]
    pub target: String,

    #[arg(short = 'f', long, value_name = "FORMAT", help = "Message format (http, cloudevent)")]
    pub format: Option<String>,

    #[arg(long, value_name = "ID", help = "Message ID (default: random UUID)")]
    pub id: Option<String>,

    #[arg(long, value_name = "SOURCE", help = "CloudEvent source")]
    pub source: Option<String>,

    #[arg(long = "type", value_name = "TYPE", help = "CloudEvent type")]
    pub kind: Option<String>,

    #[arg(long, value_name = "TYPE", help = "Content type of the data")]
    pub content_type: Option<String>,

    #[arg(long, value_name = "DATA", conflicts_with = "file", help = "Data to send")]
    pub data: Option<String>,

    #[arg(long, value_name = "FILE", help = "Read the data to send from a file")]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct TemplatesArgs {
    #[arg(value_name = "RUNTIME", help = "Runtime to list templates for (default: all)")]
    pub runtime: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ScaffoldArgs {
    #[command(flatten)]
    pub path: PathArg,

    #[arg(value_name = "DEST", help = "Directory to write the scaffolding into")]
    pub dest: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct MiddlewareArgs {
    #[arg(
        short = 'p',
        long = "path",
        value_name = "PATH",
        help = "Function to report on (default: every runtime and format)"
    )]
    pub path: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RepositoryCommands {
    #[command(about = "List installed template repositories")]
    List,

    #[command(about = "Install a template repository from a git URI")]
    Add {
        #[arg(value_name = "NAME")]
        name: String,
        #[arg(value_name = "URI")]
        uri: String,
    },

    #[command(about = "Rename an installed template repository")]
    Rename {
        #[arg(value_name = "OLD")]
        from: String,
        #[arg(value_name = "NEW")]
        to: String,
    },

    #[command(about = "Remove an installed template repository")]
    Remove {
        #[arg(value_name = "NAME")]
        name: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_create_args() {
        let args = CliArgs::parse_from(["funcbox", "create", "-l", "go", "hello"]);
        match args.command {
            Commands::Create(create) => {
                assert_eq!(create.language, "go");
                assert_eq!(create.path, PathBuf::from("hello"));
                assert!(create.template.is_none());
            }
            _ => panic!("Expected Create command"),
        }
        assert_eq!(args.output, OutputFormatArg::Human);
    }

    #[test]
    fn test_create_requires_language() {
        assert!(CliArgs::try_parse_from(["funcbox", "create", "hello"]).is_err());
    }

    #[test]
    fn test_deploy_defaults_to_current_directory() {
        let args = CliArgs::parse_from(["funcbox", "deploy"]);
        match args.command {
            Commands::Deploy(deploy) => {
                assert_eq!(deploy.path.path, PathBuf::from("."));
                assert!(!deploy.no_build);
                assert!(!deploy.remote);
            }
            _ => panic!("Expected Deploy command"),
        }
    }

    #[test]
    fn test_delete_by_name() {
        let args = CliArgs::parse_from(["funcbox", "delete", "hello", "-n", "prod", "--all"]);
        match args.command {
            Commands::Delete(delete) => {
                assert_eq!(delete.name.as_deref(), Some("hello"));
                assert_eq!(delete.namespace.as_deref(), Some("prod"));
                assert!(delete.all);
            }
            _ => panic!("Expected Delete command"),
        }
    }

    #[test]
    fn test_invoke_data_and_file_conflict() {
        let result = CliArgs::try_parse_from([
            "funcbox", "invoke", "--data", "{}", "--file", "body.json",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_repository_add() {
        let args = CliArgs::parse_from([
            "funcbox",
            "repository",
            "add",
            "extra",
            "https://example.com/templates.git",
        ]);
        match args.command {
            Commands::Repository(RepositoryCommands::Add { name, uri }) => {
                assert_eq!(name, "extra");
                assert_eq!(uri, "https://example.com/templates.git");
            }
            _ => panic!("Expected repository add"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["funcbox", "-v", "--output", "json", "list"]);
        assert!(args.verbose);
        assert_eq!(args.output, OutputFormatArg::Json);

        let args = CliArgs::parse_from(["funcbox", "--log-level", "debug", "runtimes"]);
        assert_eq!(args.log_level, Some("debug".to_string()));
        assert!(!args.quiet);
    }
}
