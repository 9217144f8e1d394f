//! Progress and confirmation callbacks
//!
//! These traits allow the declarative crate to be used without
//! depending on a specific terminal UI.

use crate::types::{ApplyResult, PlannedAction};

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback {
    /// Called when an action is about to run against a resource
    fn on_resource_start(&mut self, address: &str, action: PlannedAction);

    /// Called when a resource finished, successfully or not
    fn on_resource_complete(&mut self, address: &str, result: &ApplyResult);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback {
    /// Ask the user to confirm an action
    ///
    /// Returns `true` if the user confirmed, `false` otherwise.
    fn confirm(&mut self, prompt: &str) -> std::io::Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_resource_start(&mut self, _address: &str, _action: PlannedAction) {}
    fn on_resource_complete(&mut self, _address: &str, _result: &ApplyResult) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> std::io::Result<bool> {
        Ok(true)
    }
}

