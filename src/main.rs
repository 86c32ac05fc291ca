use funcbox::cli::{dispatch, CliArgs};
use funcbox::util::{init_logging, LoggingConfig};
use funcbox::VERSION;

use clap::Parser;
use std::env;
use tracing::debug;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("funcbox v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = dispatch(&args).await;
    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = args
        .log_level
        .clone()
        .or_else(|| env::var("FUNC_LOG_LEVEL").ok());
    let use_json = env::var("FUNC_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    init_logging(LoggingConfig {
        use_json,
        ..LoggingConfig::from_flags(level.as_deref(), args.verbose, args.quiet)
    });
}
