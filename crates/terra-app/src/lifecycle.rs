//! The orchestrator's lifecycle state machine.
//!
//! `Idle -> Initializing -> Ready -> Disposed`, with `Error` as the terminal
//! state of a failed initialization. A [`Lifecycle`] is shared between the
//! caller and an in-flight initialization; the initialization re-checks it
//! after every await, so disposing during loading cancels it.

use std::cell::Cell;
use std::rc::Rc;

use crate::error::InitError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    #[default]
    Idle,
    Initializing,
    Ready,
    Disposed,
    Error,
}

/// Shared handle to the single system slot. Clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct Lifecycle(Rc<Cell<LifecycleState>>);

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        self.0.get()
    }

    pub fn is_initializing(&self) -> bool {
        self.state() == LifecycleState::Initializing
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LifecycleState::Ready
    }

    /// Claim the slot for a new initialization. Allowed from `Idle`,
    /// `Disposed` and `Error`.
    pub fn begin(&self) -> Result<(), InitError> {
        match self.state() {
            LifecycleState::Initializing | LifecycleState::Ready => Err(InitError::AlreadyActive),
            _ => {
                self.0.set(LifecycleState::Initializing);
                Ok(())
            }
        }
    }

    /// `Initializing -> Ready`. Fails if the initialization was cancelled.
    pub(crate) fn mark_ready(&self) -> bool {
        self.advance(LifecycleState::Initializing, LifecycleState::Ready)
    }

    /// `Initializing -> Error`.
    pub(crate) fn fail(&self) -> bool {
        self.advance(LifecycleState::Initializing, LifecycleState::Error)
    }

    /// `Initializing -> Idle`, for an initialization that gave up before
    /// creating anything.
    pub(crate) fn abort(&self) -> bool {
        self.advance(LifecycleState::Initializing, LifecycleState::Idle)
    }

    /// Tear down from any state. An in-flight initialization notices at its
    /// next check and cancels itself.
    pub fn dispose(&self) {
        self.0.set(LifecycleState::Disposed);
    }

    fn advance(&self, from: LifecycleState, to: LifecycleState) -> bool {
        if self.state() == from {
            self.0.set(to);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_slot() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.begin().is_ok());
        assert!(matches!(lifecycle.begin(), Err(InitError::AlreadyActive)));
        assert!(lifecycle.mark_ready());
        assert!(matches!(lifecycle.begin(), Err(InitError::AlreadyActive)));

        lifecycle.dispose();
        assert!(lifecycle.begin().is_ok(), "re-initialization after dispose");
    }

    #[test]
    fn test_dispose_cancels_initialization() {
        let lifecycle = Lifecycle::new();
        let observer = lifecycle.clone();
        lifecycle.begin().unwrap();
        observer.dispose();
        assert!(!lifecycle.is_initializing());
        assert!(!lifecycle.mark_ready(), "cancelled init cannot become ready");
        assert_eq!(lifecycle.state(), LifecycleState::Disposed);
    }

    #[test]
    fn test_error_allows_retry() {
        let lifecycle = Lifecycle::new();
        lifecycle.begin().unwrap();
        assert!(lifecycle.fail());
        assert_eq!(lifecycle.state(), LifecycleState::Error);
        assert!(lifecycle.begin().is_ok());
        assert!(lifecycle.abort());
        assert_eq!(lifecycle.state(), LifecycleState::Idle);
    }
}
