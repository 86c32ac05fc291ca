//! Handle for a locally running function
//!
//! Every running instance is recorded as `.func/runs/<port>` beneath the
//! function's root so other processes (e.g. `invoke` from a second
//! terminal) can find it.

use crate::error::{FunctionError, Result};
use crate::function::{Function, RUNS_DIR};
use anyhow::anyhow;
use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

type StopHook = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// A running function instance
pub struct Job {
    function: Function,
    host: String,
    port: u16,
    errors: Mutex<Option<mpsc::Receiver<anyhow::Error>>>,
    on_stop: Mutex<Option<StopHook>>,
    stopped: AtomicBool,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("function", &self.function.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("stopped", &self.stopped.load(Ordering::SeqCst))
            .finish()
    }
}

impl Job {
    /// Record a new running instance of `f` on `port`.
    ///
    /// Run directories left behind by instances whose port is no longer
    /// bound are removed first.
    pub fn new<F>(f: Function, host: &str, port: u16, on_stop: F) -> Result<Job>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        if !f.initialized() {
            return Err(FunctionError::NotInitialized(f.root.clone()));
        }
        if port == 0 {
            return Err(anyhow!("a job requires the port the function is listening on").into());
        }

        let runs = runs_dir(&f.root);
        remove_orphans(&runs, host, port);

        let dir = runs.join(port.to_string());
        fs::create_dir_all(&dir).map_err(|e| FunctionError::io(&dir, e))?;
        debug!(function = %f.name, host, port, "job started");

        Ok(Job {
            function: f,
            host: host.to_string(),
            port,
            errors: Mutex::new(None),
            on_stop: Mutex::new(Some(Box::new(on_stop))),
            stopped: AtomicBool::new(false),
        })
    }

    /// Attach the channel on which the runner reports runtime failures
    pub fn with_errors(mut self, errors: mpsc::Receiver<anyhow::Error>) -> Job {
        self.errors = Mutex::new(Some(errors));
        self
    }

    /// Take the runtime error channel, if one was attached and not yet taken
    pub fn take_errors(&self) -> Option<mpsc::Receiver<anyhow::Error>> {
        self.errors.lock().ok().and_then(|mut slot| slot.take())
    }

    pub fn function(&self) -> &Function {
        &self.function
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}/", self.host, self.port)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Stop the instance: remove its run directory and run the stop hook.
    /// Only the first call does anything; later calls return `Ok(())`.
    pub fn stop(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let dir = runs_dir(&self.function.root).join(self.port.to_string());
        if let Err(e) = fs::remove_dir_all(&dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %dir.display(), error = %e, "failed to remove job directory");
            }
        }

        let hook = self.on_stop.lock().ok().and_then(|mut slot| slot.take());
        if let Some(hook) = hook {
            hook().map_err(FunctionError::Other)?;
        }
        debug!(function = %self.function.name, port = self.port, "job stopped");
        Ok(())
    }
}

fn runs_dir(root: &Path) -> PathBuf {
    root.join(crate::function::RUN_DATA_DIR).join(RUNS_DIR)
}

fn port_in_use(host: &str, port: u16) -> bool {
    TcpListener::bind((host, port)).is_err()
}

fn remove_orphans(runs: &Path, host: &str, keep: u16) {
    for port in ports_in(runs) {
        if port == keep || port_in_use(host, port) {
            continue;
        }
        let dir = runs.join(port.to_string());
        debug!(path = %dir.display(), "removing orphaned job directory");
        let _ = fs::remove_dir_all(dir);
    }
}

fn ports_in(runs: &Path) -> Vec<u16> {
    let Ok(entries) = fs::read_dir(runs) else {
        return Vec::new();
    };
    let mut ports: Vec<u16> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().and_then(|n| n.parse().ok()))
        .collect();
    ports.sort_unstable();
    ports
}

/// Ports on which instances of `f` are recorded as running, ascending.
/// Uninitialized functions are never running.
pub fn running_ports(f: &Function) -> Vec<u16> {
    if f.root.as_os_str().is_empty() || !f.initialized() {
        return Vec::new();
    }
    ports_in(&runs_dir(&f.root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn initialized(dir: &TempDir) -> Function {
        Function {
            root: dir.path().to_path_buf(),
            name: "hello".into(),
            runtime: "go".into(),
            created: Some(Utc::now()),
            ..Default::default()
        }
    }

    #[test]
    fn test_job_requires_initialized_function() {
        let dir = TempDir::new().unwrap();
        let f = Function {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(matches!(
            Job::new(f, "127.0.0.1", 8080, || Ok(())),
            Err(FunctionError::NotInitialized(_))
        ));
    }

    #[test]
    fn test_job_requires_port() {
        let dir = TempDir::new().unwrap();
        assert!(Job::new(initialized(&dir), "127.0.0.1", 0, || Ok(())).is_err());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        // Hold the port so the run directory is not considered orphaned.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let f = initialized(&dir);
        let job = Job::new(f.clone(), "127.0.0.1", port, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        assert_eq!(running_ports(&f), vec![port]);

        job.stop().unwrap();
        job.stop().unwrap();
        assert!(job.is_stopped());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(running_ports(&f).is_empty());
    }

    #[test]
    fn test_orphaned_run_dirs_are_removed() {
        let dir = TempDir::new().unwrap();
        let f = initialized(&dir);

        let free = TcpListener::bind("127.0.0.1:0").unwrap();
        let orphan = free.local_addr().unwrap().port();
        drop(free);
        fs::create_dir_all(runs_dir(&f.root).join(orphan.to_string())).unwrap();

        let held = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = held.local_addr().unwrap().port();
        let job = Job::new(f.clone(), "127.0.0.1", port, || Ok(())).unwrap();

        assert_eq!(running_ports(&f), vec![port]);
        job.stop().unwrap();
    }

    #[tokio::test]
    async fn test_error_channel_is_taken_once() {
        let dir = TempDir::new().unwrap();
        let held = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = held.local_addr().unwrap().port();
        let (tx, rx) = mpsc::channel(1);

        let job = Job::new(initialized(&dir), "127.0.0.1", port, || Ok(()))
            .unwrap()
            .with_errors(rx);
        tx.send(anyhow!("crashed")).await.unwrap();

        let mut errors = job.take_errors().unwrap();
        assert_eq!(errors.recv().await.unwrap().to_string(), "crashed");
        assert!(job.take_errors().is_none());
        job.stop().unwrap();
    }
}
