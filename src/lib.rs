//! funcbox - function lifecycle client
//!
//! A function is a source directory described by a `func.yaml` descriptor.
//! This library creates functions from language templates and drives them
//! through build, push, deploy, run, invoke and removal, delegating the
//! actual work to pluggable strategies.
//!
//! # Example Usage
//!
//! ```no_run
//! use funcbox::mock::{MockBuilder, MockDeployer, MockPusher};
//! use funcbox::{Client, Function};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> funcbox::Result<()> {
//! let client = Client::builder()
//!     .with_registry("quay.io/alice")
//!     .with_builder(Arc::new(MockBuilder::new()))
//!     .with_pusher(Arc::new(MockPusher::new()))
//!     .with_deployer(Arc::new(MockDeployer::new()))
//!     .build();
//!
//! let (f, result) = client
//!     .new_function(
//!         &CancellationToken::new(),
//!         Function {
//!             root: "hello".into(),
//!             runtime: "go".into(),
//!             ..Default::default()
//!         },
//!     )
//!     .await?;
//! println!("{} deployed at {}", f.name, result.url);
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`function`]: the descriptor, its persistence, migrations and build stamp
//! - [`repository`]: template repositories, runtimes and templates
//! - [`scaffolding`]: signature detection and entrypoint scaffolding
//! - [`client`]: the lifecycle orchestrator
//! - [`strategy`]: the collaborator traits the client delegates to

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod fs;
pub mod function;
pub mod instances;
pub mod invoke;
pub mod job;
pub mod mock;
pub mod pipelines;
pub mod progress;
pub mod repository;
pub mod scaffolding;
pub mod strategy;
pub mod util;

pub use client::{builder_image, Client, ClientBuilder, DeployOptions, RunOptions};
pub use config::{ClientConfig, ConfigError};
pub use error::{FunctionError, Phase, Result};
pub use function::Function;
pub use instances::Instances;
pub use invoke::{InvokeMessage, InvokeResponse};
pub use job::Job;
pub use progress::{LoggingHandler, NoOpHandler, ProgressEvent, ProgressHandler};
pub use repository::{Repositories, Templates};
pub use scaffolding::Signature;
pub use strategy::{
    Builder, DeployResult, DeployStatus, Deployer, Describer, Instance, ListItem, Lister,
    PipelinesProvider, Pusher, Remover, Runner,
};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_funcbox() {
        assert_eq!(NAME, "funcbox");
    }
}
