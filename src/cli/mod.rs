pub mod commands;
pub mod handlers;
pub mod output;
pub mod progress;

pub use commands::{CliArgs, Commands, OutputFormatArg, RepositoryCommands};
pub use handlers::dispatch;
pub use output::{OutputFormat, OutputFormatter};
pub use progress::SpinnerHandler;
