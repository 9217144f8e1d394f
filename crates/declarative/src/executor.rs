//! Execution engine - converges a single resource instance
//!
//! Each call handles exactly one resource and runs to completion before
//! returning. Callers iterate over their resources sequentially.

use crate::context::ProgressCallback;
use crate::resource::Resource;
use crate::types::{
    ApplyResult, Diagnose, Diagnostics, ExecuteOptions, PlannedAction, ReadOutcome,
};

/// What happened to a resource, and the state to track afterwards
#[derive(Debug, Clone, PartialEq)]
pub struct Converged<S> {
    pub result: ApplyResult,
    /// `None` means the resource should no longer be tracked
    pub state: Option<S>,
    pub diagnostics: Diagnostics,
}

impl<S> Converged<S> {
    fn new(result: ApplyResult, state: Option<S>, diagnostics: Diagnostics) -> Self {
        Self {
            result,
            state,
            diagnostics,
        }
    }

    fn failed<E: Diagnose>(error: &E, state: Option<S>, mut diagnostics: Diagnostics) -> Self {
        diagnostics.extend(error.diagnostics());
        Self {
            result: ApplyResult::Failed {
                error: error.to_string(),
            },
            state,
            diagnostics,
        }
    }
}

/// Decide which action brings `current` in line with `declared`
///
/// Does not talk to the remote side; `current` should already be refreshed
/// when an accurate answer is needed.
pub fn plan<R: Resource + ?Sized>(
    resource: &R,
    declared: Option<&R::Declared>,
    current: Option<&R::State>,
) -> PlannedAction {
    match (declared, current) {
        (None, None) => PlannedAction::None,
        (None, Some(_)) => PlannedAction::Delete,
        (Some(_), None) => PlannedAction::Create,
        (Some(declared), Some(state)) => {
            if resource.requires_replace(declared, state) {
                PlannedAction::Replace
            } else if resource.needs_update(declared, state) {
                PlannedAction::Update
            } else {
                PlannedAction::None
            }
        }
    }
}

/// Converge one resource towards its declaration
///
/// Tracked state is refreshed first so that out-of-band deletes and drift
/// are seen before deciding what to do. A drifted resource is dropped from
/// state with its warning and nothing else happens in this run. A resource
/// that is tracked but no longer declared is deleted.
pub fn converge<R, P>(
    resource: &R,
    address: &str,
    declared: Option<&R::Declared>,
    tracked: Option<&R::State>,
    opts: &ExecuteOptions,
    progress: &mut P,
) -> Converged<R::State>
where
    R: Resource + ?Sized,
    P: ProgressCallback + ?Sized,
{
    let mut diagnostics = Diagnostics::new();

    let current = match tracked {
        Some(state) => match resource.read(state) {
            Ok(ReadOutcome::Present(fresh)) => Some(fresh),
            Ok(ReadOutcome::Gone {
                warning: Some(warning),
            }) => {
                // Drift: stop tracking now, re-create on a later run
                log::warn!("{address}: {}", warning.summary);
                diagnostics.push(warning);
                return Converged::new(ApplyResult::Removed, None, diagnostics);
            }
            Ok(ReadOutcome::Gone { warning: None }) => {
                log::info!("{address}: no longer exists remotely");
                None
            }
            Err(e) => {
                log::debug!("{address}: refresh failed: {e}");
                let converged = Converged::failed(&e, tracked.cloned(), diagnostics);
                progress.on_resource_complete(address, &converged.result);
                return converged;
            }
        },
        None => None,
    };

    let action = plan(resource, declared, current.as_ref());

    if !action.is_change() {
        let result = if tracked.is_some() && current.is_none() {
            ApplyResult::Removed
        } else {
            ApplyResult::NoChange
        };
        return Converged::new(result, current, diagnostics);
    }

    if opts.dry_run {
        return Converged::new(
            ApplyResult::Skipped {
                reason: format!("would {action}"),
            },
            current,
            diagnostics,
        );
    }

    progress.on_resource_start(address, action);
    log::info!("{address}: {} {}", action.gerund(), resource.resource_type());

    let converged = match run_action(resource, action, declared, current) {
        Ok((result, state)) => Converged::new(result, state, diagnostics),
        Err((e, state)) => Converged::failed(&e, state, diagnostics),
    };

    progress.on_resource_complete(address, &converged.result);
    converged
}

/// Refresh one tracked resource without changing anything remotely
pub fn refresh<R>(resource: &R, address: &str, tracked: &R::State) -> Converged<R::State>
where
    R: Resource + ?Sized,
{
    match resource.read(tracked) {
        Ok(ReadOutcome::Present(fresh)) => {
            let result = if &fresh == tracked {
                ApplyResult::NoChange
            } else {
                ApplyResult::Modified
            };
            Converged::new(result, Some(fresh), Diagnostics::new())
        }
        Ok(ReadOutcome::Gone { warning }) => {
            let mut diagnostics = Diagnostics::new();
            if let Some(warning) = warning {
                log::warn!("{address}: {}", warning.summary);
                diagnostics.push(warning);
            }
            Converged::new(ApplyResult::Removed, None, diagnostics)
        }
        Err(e) => Converged::failed(&e, Some(tracked.clone()), Diagnostics::new()),
    }
}

/// Delete one tracked resource
pub fn destroy<R, P>(
    resource: &R,
    address: &str,
    tracked: &R::State,
    opts: &ExecuteOptions,
    progress: &mut P,
) -> Converged<R::State>
where
    R: Resource + ?Sized,
    P: ProgressCallback + ?Sized,
{
    if opts.dry_run {
        return Converged::new(
            ApplyResult::Skipped {
                reason: "would delete".to_string(),
            },
            Some(tracked.clone()),
            Diagnostics::new(),
        );
    }

    progress.on_resource_start(address, PlannedAction::Delete);
    let converged = match resource.delete(tracked) {
        Ok(()) => Converged::new(ApplyResult::Removed, None, Diagnostics::new()),
        Err(e) => Converged::failed(&e, Some(tracked.clone()), Diagnostics::new()),
    };
    progress.on_resource_complete(address, &converged.result);
    converged
}

type ActionOutcome<R> = Result<
    (ApplyResult, Option<<R as Resource>::State>),
    (<R as Resource>::Error, Option<<R as Resource>::State>),
>;

/// Run a planned action; on failure, also report the state left behind
fn run_action<R: Resource + ?Sized>(
    resource: &R,
    action: PlannedAction,
    declared: Option<&R::Declared>,
    current: Option<R::State>,
) -> ActionOutcome<R> {
    match (action, declared, current) {
        (PlannedAction::Create, Some(declared), _) => resource
            .create(declared)
            .map(|state| (ApplyResult::Created, Some(state)))
            .map_err(|e| (e, None)),
        (PlannedAction::Update, Some(declared), Some(state)) => {
            match resource.update(declared, &state) {
                Ok(updated) => Ok((ApplyResult::Modified, Some(updated))),
                Err(e) => Err((e, Some(state))),
            }
        }
        (PlannedAction::Replace, Some(declared), Some(state)) => {
            if let Err(e) = resource.delete(&state) {
                return Err((e, Some(state)));
            }
            resource
                .create(declared)
                .map(|created| (ApplyResult::Replaced, Some(created)))
                .map_err(|e| (e, None))
        }
        (PlannedAction::Delete, _, Some(state)) => match resource.delete(&state) {
            Ok(()) => Ok((ApplyResult::Removed, None)),
            Err(e) => Err((e, Some(state))),
        },
        (_, _, state) => Ok((ApplyResult::NoChange, state)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NoProgress;
    use std::cell::RefCell;

    #[derive(Debug, thiserror::Error)]
    #[error("test failure: {0}")]
    struct TestError(String);

    impl Diagnose for TestError {}

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: String,
        text: String,
        owner: String,
    }

    #[derive(Debug)]
    struct Declared {
        text: String,
        owner: String,
    }

    /// In-memory resource that records every call
    #[derive(Default)]
    struct TestResource {
        remote: RefCell<Option<Note>>,
        calls: RefCell<Vec<&'static str>>,
        fail_create: bool,
        drifted: bool,
    }

    impl Resource for TestResource {
        type Declared = Declared;
        type State = Note;
        type Error = TestError;

        fn resource_type(&self) -> &'static str {
            "note"
        }

        fn create(&self, declared: &Declared) -> Result<Note, TestError> {
            self.calls.borrow_mut().push("create");
            if self.fail_create {
                return Err(TestError("create rejected".into()));
            }
            let note = Note {
                id: "n-1".into(),
                text: declared.text.clone(),
                owner: declared.owner.clone(),
            };
            *self.remote.borrow_mut() = Some(note.clone());
            Ok(note)
        }

        fn read(&self, _state: &Note) -> Result<ReadOutcome<Note>, TestError> {
            self.calls.borrow_mut().push("read");
            if self.drifted {
                return Ok(ReadOutcome::drifted("changed elsewhere", "dropping"));
            }
            Ok(match self.remote.borrow().clone() {
                Some(note) => ReadOutcome::Present(note),
                None => ReadOutcome::gone(),
            })
        }

        fn update(&self, declared: &Declared, state: &Note) -> Result<Note, TestError> {
            self.calls.borrow_mut().push("update");
            let note = Note {
                text: declared.text.clone(),
                ..state.clone()
            };
            *self.remote.borrow_mut() = Some(note.clone());
            Ok(note)
        }

        fn delete(&self, _state: &Note) -> Result<(), TestError> {
            self.calls.borrow_mut().push("delete");
            *self.remote.borrow_mut() = None;
            Ok(())
        }

        fn needs_update(&self, declared: &Declared, state: &Note) -> bool {
            declared.text != state.text
        }

        fn requires_replace(&self, declared: &Declared, state: &Note) -> bool {
            declared.owner != state.owner
        }
    }

    fn declared(text: &str, owner: &str) -> Declared {
        Declared {
            text: text.into(),
            owner: owner.into(),
        }
    }

    fn note(text: &str, owner: &str) -> Note {
        Note {
            id: "n-1".into(),
            text: text.into(),
            owner: owner.into(),
        }
    }

    #[test]
    fn test_converge_creates_untracked_resource() {
        let resource = TestResource::default();
        let result = converge(
            &resource,
            "note.a",
            Some(&declared("hello", "me")),
            None,
            &ExecuteOptions::default(),
            &mut NoProgress,
        );

        assert_eq!(result.result, ApplyResult::Created);
        assert_eq!(result.state, Some(note("hello", "me")));
        assert_eq!(*resource.calls.borrow(), vec!["create"]);
    }

    #[test]
    fn test_converge_no_change_after_refresh() {
        let resource = TestResource::default();
        *resource.remote.borrow_mut() = Some(note("hello", "me"));

        let result = converge(
            &resource,
            "note.a",
            Some(&declared("hello", "me")),
            Some(&note("hello", "me")),
            &ExecuteOptions::default(),
            &mut NoProgress,
        );

        assert_eq!(result.result, ApplyResult::NoChange);
        assert_eq!(*resource.calls.borrow(), vec!["read"]);
    }

    #[test]
    fn test_converge_updates_in_place() {
        let resource = TestResource::default();
        *resource.remote.borrow_mut() = Some(note("old", "me"));

        let result = converge(
            &resource,
            "note.a",
            Some(&declared("new", "me")),
            Some(&note("old", "me")),
            &ExecuteOptions::default(),
            &mut NoProgress,
        );

        assert_eq!(result.result, ApplyResult::Modified);
        assert_eq!(result.state.unwrap().text, "new");
    }

    #[test]
    fn test_converge_replaces_on_identity_change() {
        let resource = TestResource::default();
        *resource.remote.borrow_mut() = Some(note("hello", "me"));

        let result = converge(
            &resource,
            "note.a",
            Some(&declared("hello", "you")),
            Some(&note("hello", "me")),
            &ExecuteOptions::default(),
            &mut NoProgress,
        );

        assert_eq!(result.result, ApplyResult::Replaced);
        assert_eq!(*resource.calls.borrow(), vec!["read", "delete", "create"]);
    }

    #[test]
    fn test_converge_drops_drifted_resource_without_mutation() {
        let resource = TestResource {
            drifted: true,
            ..Default::default()
        };

        let result = converge(
            &resource,
            "note.a",
            Some(&declared("hello", "me")),
            Some(&note("hello", "me")),
            &ExecuteOptions::default(),
            &mut NoProgress,
        );

        assert_eq!(result.result, ApplyResult::Removed);
        assert!(result.state.is_none());
        assert_eq!(result.diagnostics.warnings().count(), 1);
        assert!(!result.diagnostics.has_error());
        assert_eq!(*resource.calls.borrow(), vec!["read"]);
    }

    #[test]
    fn test_converge_deletes_undeclared_resource() {
        let resource = TestResource::default();
        *resource.remote.borrow_mut() = Some(note("hello", "me"));

        let result = converge(
            &resource,
            "note.a",
            None,
            Some(&note("hello", "me")),
            &ExecuteOptions::default(),
            &mut NoProgress,
        );

        assert_eq!(result.result, ApplyResult::Removed);
        assert!(result.state.is_none());
    }

    #[test]
    fn test_converge_dry_run_makes_no_mutation() {
        let resource = TestResource::default();
        let opts = ExecuteOptions { dry_run: true };

        let result = converge(
            &resource,
            "note.a",
            Some(&declared("hello", "me")),
            None,
            &opts,
            &mut NoProgress,
        );

        assert!(matches!(result.result, ApplyResult::Skipped { .. }));
        assert!(resource.calls.borrow().is_empty());
    }

    #[test]
    fn test_converge_failure_is_reported_as_diagnostic() {
        let resource = TestResource {
            fail_create: true,
            ..Default::default()
        };

        let result = converge(
            &resource,
            "note.a",
            Some(&declared("hello", "me")),
            None,
            &ExecuteOptions::default(),
            &mut NoProgress,
        );

        assert!(!result.result.is_success());
        assert!(result.diagnostics.has_error());
        assert!(result.state.is_none());
    }

    #[test]
    fn test_refresh_reports_gone() {
        let resource = TestResource::default();
        let result = refresh(&resource, "note.a", &note("hello", "me"));
        assert_eq!(result.result, ApplyResult::Removed);
        assert!(result.state.is_none());
    }

    #[test]
    fn test_destroy_removes_tracking() {
        let resource = TestResource::default();
        *resource.remote.borrow_mut() = Some(note("hello", "me"));

        let result = destroy(
            &resource,
            "note.a",
            &note("hello", "me"),
            &ExecuteOptions::default(),
            &mut NoProgress,
        );

        assert_eq!(result.result, ApplyResult::Removed);
        assert!(resource.remote.borrow().is_none());
    }

    #[test]
    fn test_plan_without_remote_calls() {
        let resource = TestResource::default();
        assert_eq!(
            plan(&resource, Some(&declared("a", "me")), None),
            PlannedAction::Create
        );
        assert_eq!(
            plan(&resource, None, Some(&note("a", "me"))),
            PlannedAction::Delete
        );
        assert_eq!(
            plan(&resource, Some(&declared("a", "me")), Some(&note("a", "me"))),
            PlannedAction::None
        );
        assert!(resource.calls.borrow().is_empty());
    }
}
