//! Progress handler trait and events

use crate::error::Phase;
use std::path::PathBuf;
use std::time::Duration;

/// Events emitted while the client drives a function through its lifecycle
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Function initialized from a template
    Created {
        root: PathBuf,
        runtime: String,
        template: String,
    },

    /// A strategy call started
    PhaseStarted { phase: Phase, function: String },

    /// Periodic status while a long-running strategy call is in flight
    Activity { phase: Phase, message: String },

    /// A strategy call finished successfully
    PhaseComplete {
        phase: Phase,
        function: String,
        duration: Duration,
    },

    /// A strategy call failed
    Failed { phase: Phase, error: String },
}

/// Trait for handling progress events
pub trait ProgressHandler: Send + Sync {
    /// Called when a progress event occurs
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {
        // Intentionally empty
    }
}
