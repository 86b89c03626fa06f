//! Per-invocation state machine for flow runs.

use advisor_primitives::InvocationId;
use thiserror::Error;
use tracing::debug;

/// States a single flow run passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Run created, nothing checked yet.
    Pending,
    /// Input record is being checked against the input contract.
    Validating,
    /// Prompt is being rendered.
    Rendering,
    /// Waiting on the generation service.
    Invoking,
    /// Model output is being checked against the output contract.
    ValidatingOutput,
    /// Run produced a record satisfying the output contract.
    Completed,
    /// Run ended with a failure.
    Failed,
}

impl RunState {
    /// Returns `true` once the run has settled.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Events that advance a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    /// Start checking the input record.
    Validate,
    /// Input accepted; render the prompt.
    Render,
    /// Prompt ready; call the model.
    Invoke,
    /// Model answered; check its output.
    ReceiveOutput,
    /// Output accepted.
    Complete,
    /// Abort the run from any non-terminal state.
    Fail,
}

/// State holder for one run.
#[derive(Debug, Clone, Copy)]
pub struct RunLifecycle {
    invocation_id: InvocationId,
    state: RunState,
}

impl RunLifecycle {
    /// Creates a lifecycle in [`RunState::Pending`].
    #[must_use]
    pub const fn new(invocation_id: InvocationId) -> Self {
        Self {
            invocation_id,
            state: RunState::Pending,
        }
    }

    /// Returns the owning invocation.
    #[must_use]
    pub const fn invocation_id(&self) -> InvocationId {
        self.invocation_id
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Applies an event, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when the event is not
    /// allowed from the current state.
    pub fn transition(&mut self, event: RunEvent) -> LifecycleResult<RunState> {
        let next = match (self.state, event) {
            (RunState::Pending, RunEvent::Validate) => Some(RunState::Validating),
            (RunState::Validating, RunEvent::Render) => Some(RunState::Rendering),
            (RunState::Rendering, RunEvent::Invoke) => Some(RunState::Invoking),
            (RunState::Invoking, RunEvent::ReceiveOutput) => Some(RunState::ValidatingOutput),
            (RunState::ValidatingOutput, RunEvent::Complete) => Some(RunState::Completed),
            (state, RunEvent::Fail) if !state.is_terminal() => Some(RunState::Failed),
            _ => None,
        };

        let Some(next_state) = next else {
            return Err(LifecycleError::InvalidTransition {
                invocation_id: self.invocation_id,
                from: self.state,
                event,
            });
        };

        debug!(
            invocation_id = %self.invocation_id,
            from = ?self.state,
            to = ?next_state,
            ?event,
            "flow run transition"
        );
        self.state = next_state;
        Ok(next_state)
    }
}

/// Errors emitted by the run state machine.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Transition was not permitted from the current state.
    #[error("invalid run transition from {from:?} via {event:?} for invocation {invocation_id}")]
    InvalidTransition {
        /// Invocation whose transition failed.
        invocation_id: InvocationId,
        /// State prior to the attempted transition.
        from: RunState,
        /// Event that triggered the failure.
        event: RunEvent,
    },
}

/// Result alias used for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_completed() {
        let mut run = RunLifecycle::new(InvocationId::random());
        for event in [
            RunEvent::Validate,
            RunEvent::Render,
            RunEvent::Invoke,
            RunEvent::ReceiveOutput,
            RunEvent::Complete,
        ] {
            run.transition(event).unwrap();
        }
        assert_eq!(run.state(), RunState::Completed);
        assert!(run.state().is_terminal());
    }

    #[test]
    fn fail_from_any_live_state() {
        let mut run = RunLifecycle::new(InvocationId::random());
        run.transition(RunEvent::Validate).unwrap();
        run.transition(RunEvent::Render).unwrap();
        assert_eq!(run.transition(RunEvent::Fail).unwrap(), RunState::Failed);
    }

    #[test]
    fn terminal_states_are_final() {
        let mut run = RunLifecycle::new(InvocationId::random());
        run.transition(RunEvent::Fail).unwrap();
        let err = run.transition(RunEvent::Fail).expect_err("already failed");
        assert!(matches!(
            err,
            LifecycleError::InvalidTransition {
                from: RunState::Failed,
                ..
            }
        ));
    }

    #[test]
    fn cannot_skip_validation() {
        let mut run = RunLifecycle::new(InvocationId::random());
        assert!(run.transition(RunEvent::Invoke).is_err());
        assert_eq!(run.state(), RunState::Pending);
    }
}
