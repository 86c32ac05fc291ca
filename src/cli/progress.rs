//! Terminal spinner driven by client progress events

use crate::progress::{ProgressEvent, ProgressHandler};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

const SPINNER_TEMPLATE: &str = "[{elapsed_precise}] {spinner:.green} {msg}";
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Shows the phase in flight on stderr and leaves a line per finished phase
pub struct SpinnerHandler {
    spinner: ProgressBar,
}

impl SpinnerHandler {
    pub fn new() -> Self {
        let spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
        if let Ok(style) = ProgressStyle::default_spinner().template(SPINNER_TEMPLATE) {
            spinner.set_style(style.tick_chars(SPINNER_CHARS));
        }
        Self { spinner }
    }

    /// Spinner that draws nothing, for quiet and structured output
    pub fn hidden() -> Self {
        Self {
            spinner: ProgressBar::hidden(),
        }
    }
}

impl Default for SpinnerHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressHandler for SpinnerHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Created {
                root,
                runtime,
                template,
            } => {
                self.spinner.println(format!(
                    "Created {} function from {} in {}",
                    runtime,
                    template,
                    root.display()
                ));
            }
            ProgressEvent::PhaseStarted { phase, function } => {
                self.spinner.set_message(format!("{} {}", phase, function));
                self.spinner.enable_steady_tick(Duration::from_millis(80));
            }
            ProgressEvent::Activity { message, .. } => {
                self.spinner.set_message(message.clone());
            }
            ProgressEvent::PhaseComplete {
                phase,
                function,
                duration,
            } => {
                self.spinner.disable_steady_tick();
                self.spinner.set_message(String::new());
                self.spinner.println(format!(
                    "\u{2713} {} {} ({:.1}s)",
                    phase,
                    function,
                    duration.as_secs_f64()
                ));
            }
            ProgressEvent::Failed { phase, .. } => {
                self.spinner.disable_steady_tick();
                self.spinner.set_message(String::new());
                self.spinner.println(format!("\u{2717} {} failed", phase));
            }
        }
    }
}

impl Drop for SpinnerHandler {
    fn drop(&mut self) {
        self.spinner.finish_and_clear();
    }
}
