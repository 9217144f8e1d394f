//! Progress indicators for stateward CLI.
//!
//! A single spinner is shown while a resource is being changed. It also
//! observes deployment polling, so the remote status shows up as it moves.

use declarative::{ApplyResult, PlannedAction, PollObserver, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Spinner for the resource currently being changed
///
/// Clones share the same spinner.
#[derive(Clone, Default)]
pub struct Spinner {
    current: Arc<Mutex<Option<ProgressBar>>>,
    hidden: bool,
}

impl Spinner {
    pub fn new(quiet: bool) -> Self {
        Self {
            current: Arc::default(),
            hidden: quiet,
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a spinner with the given message
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

impl ProgressCallback for Spinner {
    fn on_resource_start(&mut self, address: &str, action: PlannedAction) {
        let pb = if self.hidden {
            ProgressBar::hidden()
        } else {
            spinner(action.gerund())
        };
        pb.set_prefix(address.to_string());
        if let Some(previous) = self.current().replace(pb) {
            previous.finish_and_clear();
        }
    }

    fn on_resource_complete(&mut self, _address: &str, _result: &ApplyResult) {
        if let Some(pb) = self.current().take() {
            pb.finish_and_clear();
        }
    }
}

impl PollObserver for Spinner {
    fn on_pending(&self, attempt: u32, status: &str) {
        if let Some(pb) = self.current().as_ref() {
            pb.set_message(format!("{status} (check {attempt})"));
        }
    }
}
