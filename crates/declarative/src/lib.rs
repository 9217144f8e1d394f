//! # Declarative
//!
//! Primitives for reconciling declared intent against a remote system.
//!
//! ## Core Concepts
//!
//! - **Resource**: something that can be created, read back, updated and
//!   deleted remotely
//! - **converge**: drives one resource instance towards its declaration
//! - **Diagnostics**: what an operator is told about the outcome
//! - **poll_until**: fixed-interval polling for asynchronous operations
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{converge, ExecuteOptions, NoProgress};
//!
//! let outcome = converge(
//!     &resource,
//!     "note.greeting",
//!     Some(&declared),
//!     tracked.as_ref(),
//!     &ExecuteOptions::default(),
//!     &mut NoProgress,
//! );
//! for diag in outcome.diagnostics.iter() {
//!     eprintln!("{diag}");
//! }
//! ```
//!
//! Progress reporting and confirmation go through [`ProgressCallback`] and
//! [`ConfirmCallback`], so the crate does not depend on a terminal UI.

pub mod context;
pub mod diff;
pub mod executor;
pub mod poll;
pub mod resource;
pub mod types;

pub use context::{AutoConfirm, ConfirmCallback, NoProgress, ProgressCallback};
pub use diff::{DiffSummary, ResourceDiff};
pub use executor::{converge, destroy, plan, refresh, Converged};
pub use poll::{poll_until, Poll, PollConfig, PollError, PollObserver};
pub use resource::Resource;
pub use types::{
    ApplyResult, Diagnose, Diagnostic, Diagnostics, ExecuteOptions, ExecuteSummary,
    PlannedAction, ReadOutcome, Severity,
};
