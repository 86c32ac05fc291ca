//! Where a function is running
//!
//! Two environments exist: `local`, backed by the job directories of
//! locally running instances, and `remote`, backed by the client's
//! [`Describer`].

use crate::error::{FunctionError, Phase, Result};
use crate::function::Function;
use crate::job::running_ports;
use crate::strategy::{self, Describer, Instance};
use anyhow::anyhow;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const ENVIRONMENT_LOCAL: &str = "local";
pub const ENVIRONMENT_REMOTE: &str = "remote";

/// Instance lookup for functions
#[derive(Clone)]
pub struct Instances {
    describer: Option<Arc<dyn Describer>>,
    namespace: String,
}

impl Instances {
    pub(crate) fn new(describer: Option<Arc<dyn Describer>>, namespace: String) -> Self {
        Self {
            describer,
            namespace,
        }
    }

    /// Instance of `f` in the named environment
    pub async fn get(
        &self,
        cancel: &CancellationToken,
        f: &Function,
        environment: &str,
    ) -> Result<Instance> {
        match environment {
            ENVIRONMENT_LOCAL => self.local(f),
            ENVIRONMENT_REMOTE => self.remote(cancel, &f.name, Some(&f.root)).await,
            other => Err(FunctionError::EnvironmentNotFound(other.to_string())),
        }
    }

    /// The locally running instance of `f`; its route uses the lowest
    /// recorded port.
    pub fn local(&self, f: &Function) -> Result<Instance> {
        if f.root.as_os_str().is_empty() {
            return Err(FunctionError::RootRequired);
        }
        if !f.initialized() {
            return Err(FunctionError::NotInitialized(f.root.clone()));
        }
        let port = running_ports(f)
            .into_iter()
            .next()
            .ok_or(FunctionError::NotRunning)?;

        let route = format!("http://localhost:{}/", port);
        Ok(Instance {
            route: route.clone(),
            routes: vec![route],
            name: f.name.clone(),
            ..Default::default()
        })
    }

    /// The remote instance, looked up by `name` or by the function at
    /// `root`. A name wins; passing both requires them to agree.
    pub async fn remote(
        &self,
        cancel: &CancellationToken,
        name: &str,
        root: Option<&Path>,
    ) -> Result<Instance> {
        let describer = self
            .describer
            .as_ref()
            .ok_or(FunctionError::StrategyNotConfigured("describer"))?;

        let f = match root.filter(|r| !r.as_os_str().is_empty()) {
            Some(root) => {
                let f = Function::load(root)?;
                if !name.is_empty() && name != f.name {
                    return Err(anyhow!(
                        "name '{}' does not match the name of the function at '{}' ('{}')",
                        name,
                        root.display(),
                        f.name
                    )
                    .into());
                }
                f
            }
            None if !name.is_empty() => Function {
                name: name.to_string(),
                ..Default::default()
            },
            None => return Err(FunctionError::NameRequired),
        };

        let namespace = if f.deploy.namespace.is_empty() {
            self.namespace.clone()
        } else {
            f.deploy.namespace.clone()
        };
        strategy::call(
            cancel,
            Phase::Describe,
            &f.name,
            describer.describe(&f.name, &namespace),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDescriber;
    use chrono::Utc;
    use std::net::TcpListener;
    use tempfile::TempDir;

    fn saved(dir: &TempDir, name: &str) -> Function {
        let f = Function {
            root: dir.path().to_path_buf(),
            name: name.into(),
            runtime: "go".into(),
            created: Some(Utc::now()),
            ..Function::new_with(Function::default())
        };
        f.write().unwrap();
        f
    }

    #[test]
    fn test_local_not_running() {
        let dir = TempDir::new().unwrap();
        let f = saved(&dir, "hello");
        let instances = Instances::new(None, String::new());
        assert!(matches!(instances.local(&f), Err(FunctionError::NotRunning)));
    }

    #[test]
    fn test_local_route_uses_job_port() {
        let dir = TempDir::new().unwrap();
        let f = saved(&dir, "hello");
        let held = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = held.local_addr().unwrap().port();
        let job = crate::job::Job::new(f.clone(), "127.0.0.1", port, || Ok(())).unwrap();

        let instance = Instances::new(None, String::new()).local(&f).unwrap();
        assert_eq!(instance.route, format!("http://localhost:{}/", port));
        assert_eq!(instance.name, "hello");
        job.stop().unwrap();
    }

    #[tokio::test]
    async fn test_remote_requires_describer() {
        let instances = Instances::new(None, String::new());
        let result = instances
            .remote(&CancellationToken::new(), "hello", None)
            .await;
        assert!(matches!(
            result,
            Err(FunctionError::StrategyNotConfigured("describer"))
        ));
    }

    #[tokio::test]
    async fn test_remote_name_must_match_root() {
        let dir = TempDir::new().unwrap();
        saved(&dir, "hello");
        let describer = Arc::new(MockDescriber::new());
        let instances = Instances::new(Some(describer.clone()), "default".into());

        let result = instances
            .remote(&CancellationToken::new(), "other", Some(dir.path()))
            .await;
        assert!(result.is_err());
        assert!(!describer.invoked());

        instances
            .remote(&CancellationToken::new(), "", Some(dir.path()))
            .await
            .unwrap();
        assert!(describer.invoked());
        assert_eq!(describer.last_request(), Some(("hello".into(), "default".into())));
    }

    #[tokio::test]
    async fn test_unknown_environment() {
        let instances = Instances::new(None, String::new());
        let result = instances
            .get(&CancellationToken::new(), &Function::default(), "staging")
            .await;
        assert!(matches!(result, Err(FunctionError::EnvironmentNotFound(_))));
    }
}
