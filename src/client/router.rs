//! Routing of reconcile results to the editor they belong to.
//!
//! Results travel back stamped with the location of the file they were
//! computed for. An editor accepts only results whose owner id equals its
//! current document location; anything else is stale (another editor's
//! result, or one computed before a move).

use ulid::Ulid;

use crate::protocol::{HighlightedPosition, Problem, ReconcileResult};

const LOG_TARGET: &str = "tandem::router";

/// Worst severity among accepted problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorState {
    Clean,
    Warning,
    Error,
}

impl ErrorState {
    pub fn of(problems: &[Problem]) -> Self {
        if problems.iter().any(|p| p.error) {
            ErrorState::Error
        } else if problems.iter().any(|p| p.warning) {
            ErrorState::Warning
        } else {
            ErrorState::Clean
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisabledReason {
    /// The project model is being resolved; results would be meaningless.
    Resolving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    /// No result received yet.
    Idle,
    Disabled(DisabledReason),
    Active(ErrorState),
}

/// Project resolving signal delivered to open editors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectResolvingState {
    InProgress,
    Resolved,
}

/// What happened to one inbound result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Stale,
    Suppressed,
    Applied(ErrorState),
}

/// Follow-up the owning editor must perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterAction {
    None,
    /// Send the full document so the server produces a fresh result.
    RequestFullReconcile,
}

/// Per-editor result filter and diagnostics holder.
#[derive(Debug)]
pub struct ResultRouter {
    instance_id: Ulid,
    resolving: Option<ProjectResolvingState>,
    state: ReconcileState,
    problems: Vec<Problem>,
    highlighted_positions: Vec<HighlightedPosition>,
}

impl ResultRouter {
    pub fn new() -> Self {
        Self {
            instance_id: Ulid::new(),
            resolving: None,
            state: ReconcileState::Idle,
            problems: Vec::new(),
            highlighted_positions: Vec::new(),
        }
    }

    /// Correlation id sent with this editor's outbound changes.
    pub fn instance_id(&self) -> String {
        self.instance_id.to_string()
    }

    pub fn state(&self) -> ReconcileState {
        self.state
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn highlighted_positions(&self) -> &[HighlightedPosition] {
        &self.highlighted_positions
    }

    /// Accept, suppress or discard a result for the editor showing `document_location`.
    pub fn route(&mut self, document_location: &str, result: ReconcileResult) -> RouteOutcome {
        if result.working_copy_owner_id != document_location {
            log::trace!(
                target: LOG_TARGET,
                "Discarding result for {} in editor of {}",
                result.working_copy_owner_id,
                document_location
            );
            return RouteOutcome::Stale;
        }

        if self.resolving == Some(ProjectResolvingState::InProgress) {
            self.disable(DisabledReason::Resolving);
            return RouteOutcome::Suppressed;
        }

        let severity = ErrorState::of(&result.problems);
        self.problems = result.problems;
        self.highlighted_positions = result.highlighted_positions;
        self.state = ReconcileState::Active(severity);
        log::debug!(
            target: LOG_TARGET,
            "Applied {} problems to {} ({:?})",
            self.problems.len(),
            document_location,
            severity
        );
        RouteOutcome::Applied(severity)
    }

    pub fn on_resolving_state_changed(&mut self, state: ProjectResolvingState) -> RouterAction {
        self.resolving = Some(state);
        match state {
            ProjectResolvingState::InProgress => {
                self.disable(DisabledReason::Resolving);
                RouterAction::None
            }
            ProjectResolvingState::Resolved => RouterAction::RequestFullReconcile,
        }
    }

    fn disable(&mut self, reason: DisabledReason) {
        self.problems.clear();
        self.highlighted_positions.clear();
        self.state = ReconcileState::Disabled(reason);
    }
}

impl Default for ResultRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn result_for(owner: &str, problems: Vec<Problem>) -> ReconcileResult {
        ReconcileResult {
            problems,
            highlighted_positions: vec![HighlightedPosition {
                offset: 0,
                length: 6,
                kind: "keyword".into(),
            }],
            working_copy_owner_id: owner.to_string(),
        }
    }

    #[test]
    fn result_for_another_location_is_stale() {
        let mut router = ResultRouter::new();
        let outcome = router.route(
            "/proj/Foo.java",
            result_for("/proj/Other.java", vec![Problem::error("boom", 0, 1)]),
        );
        assert_eq!(outcome, RouteOutcome::Stale);
        assert_eq!(router.state(), ReconcileState::Idle);
        assert!(router.problems().is_empty());
    }

    #[rstest]
    #[case::clean(vec![], ErrorState::Clean)]
    #[case::warning(vec![Problem::warning("unused", 0, 1)], ErrorState::Warning)]
    #[case::error_wins(
        vec![Problem::warning("unused", 0, 1), Problem::error("missing ;", 4, 5)],
        ErrorState::Error
    )]
    fn accepted_result_sets_state_by_worst_severity(#[case] problems: Vec<Problem>, #[case] expected: ErrorState) {
        let mut router = ResultRouter::new();
        let count = problems.len();
        let outcome = router.route("/proj/Foo.java", result_for("/proj/Foo.java", problems));
        assert_eq!(outcome, RouteOutcome::Applied(expected));
        assert_eq!(router.state(), ReconcileState::Active(expected));
        assert_eq!(router.problems().len(), count);
        assert_eq!(router.highlighted_positions().len(), 1);
    }

    #[test]
    fn results_are_suppressed_while_resolving() {
        let mut router = ResultRouter::new();
        router.route("/proj/Foo.java", result_for("/proj/Foo.java", vec![Problem::error("x", 0, 1)]));

        assert_eq!(
            router.on_resolving_state_changed(ProjectResolvingState::InProgress),
            RouterAction::None
        );
        assert_eq!(router.state(), ReconcileState::Disabled(DisabledReason::Resolving));
        assert!(router.problems().is_empty());

        let outcome = router.route("/proj/Foo.java", result_for("/proj/Foo.java", vec![]));
        assert_eq!(outcome, RouteOutcome::Suppressed);
        assert!(router.highlighted_positions().is_empty());
    }

    #[test]
    fn resolved_requests_full_reconcile_and_reenables() {
        let mut router = ResultRouter::new();
        router.on_resolving_state_changed(ProjectResolvingState::InProgress);
        assert_eq!(
            router.on_resolving_state_changed(ProjectResolvingState::Resolved),
            RouterAction::RequestFullReconcile
        );

        let outcome = router.route("/proj/Foo.java", result_for("/proj/Foo.java", vec![]));
        assert_eq!(outcome, RouteOutcome::Applied(ErrorState::Clean));
    }

    #[test]
    fn instance_ids_are_unique() {
        assert_ne!(ResultRouter::new().instance_id(), ResultRouter::new().instance_id());
    }
}
