//! Resource trait for declarative state management
//!
//! A Resource is the minimal capability set needed to reconcile one
//! instance: create it, read it back, update it, delete it.

use crate::types::{Diagnose, ReadOutcome};
use std::fmt;

/// Core trait for reconcilable resources
///
/// Implementations are independent of each other; two resource kinds share
/// nothing beyond this trait. Every call is blocking and runs to completion
/// before returning.
///
/// # Example
///
/// ```ignore
/// use declarative::{ReadOutcome, Resource};
///
/// struct Note<'a> { store: &'a Store }
///
/// impl Resource for Note<'_> {
///     type Declared = String;
///     type State = NoteState;
///     type Error = StoreError;
///
///     fn resource_type(&self) -> &'static str { "note" }
///
///     fn create(&self, text: &String) -> Result<NoteState, StoreError> {
///         self.store.insert(text)
///     }
///
///     fn read(&self, state: &NoteState) -> Result<ReadOutcome<NoteState>, StoreError> {
///         Ok(match self.store.get(&state.id)? {
///             Some(s) => ReadOutcome::Present(s),
///             None => ReadOutcome::gone(),
///         })
///     }
///
///     fn update(&self, text: &String, state: &NoteState) -> Result<NoteState, StoreError> {
///         self.store.replace(&state.id, text)
///     }
///
///     fn delete(&self, state: &NoteState) -> Result<(), StoreError> {
///         self.store.remove(&state.id)
///     }
///
///     fn needs_update(&self, text: &String, state: &NoteState) -> bool {
///         &state.text != text
///     }
/// }
/// ```
pub trait Resource {
    /// What the user declared
    type Declared: fmt::Debug;
    /// What we track after a successful operation
    type State: fmt::Debug + Clone + PartialEq;
    /// Failure type; must be able to explain itself as diagnostics
    type Error: Diagnose + Send + Sync + 'static;

    /// Resource type category, e.g. "workflow_deployment"
    fn resource_type(&self) -> &'static str;

    /// Create the resource remotely and return the state to track
    fn create(&self, declared: &Self::Declared) -> Result<Self::State, Self::Error>;

    /// Refresh tracked state from the remote side
    fn read(&self, state: &Self::State) -> Result<ReadOutcome<Self::State>, Self::Error>;

    /// Bring an existing resource in line with its declaration
    fn update(
        &self,
        declared: &Self::Declared,
        state: &Self::State,
    ) -> Result<Self::State, Self::Error>;

    /// Delete the resource remotely
    fn delete(&self, state: &Self::State) -> Result<(), Self::Error>;

    /// Whether the declaration differs from tracked state in a way that
    /// can be fixed in place
    fn needs_update(&self, declared: &Self::Declared, state: &Self::State) -> bool;

    /// Whether the declaration changed the resource's identity, so it has
    /// to be deleted and created again
    fn requires_replace(&self, _declared: &Self::Declared, _state: &Self::State) -> bool {
        false
    }
}
