//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Created {
                root,
                runtime,
                template,
            } => {
                info!(
                    root = %root.display(),
                    runtime = %runtime,
                    template = %template,
                    "Function created"
                );
            }
            ProgressEvent::PhaseStarted { phase, function } => {
                debug!(phase = %phase, function = %function, "Starting phase");
            }
            ProgressEvent::Activity { phase, message } => {
                info!(phase = %phase, "{}", message);
            }
            ProgressEvent::PhaseComplete {
                phase,
                function,
                duration,
            } => {
                info!(
                    phase = %phase,
                    function = %function,
                    duration_ms = duration.as_millis(),
                    "Phase complete"
                );
            }
            ProgressEvent::Failed { phase, error } => {
                warn!(phase = %phase, error = %error, "Phase failed");
            }
        }
    }
}
