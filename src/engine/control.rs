use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

/// Run-level control state. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ControlState {
    /// Discovering and dispatching.
    Running,
    /// No further discovery; admitted work drains to completion.
    Draining,
    /// No further discovery or dispatch; only in-flight calls finish.
    Aborted,
}

impl fmt::Display for ControlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlState::Running => write!(f, "RUNNING"),
            ControlState::Draining => write!(f, "DRAINING"),
            ControlState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Cloneable handle delivering stop signals into a running engine.
#[derive(Debug, Clone)]
pub struct Controller {
    tx: Arc<watch::Sender<ControlState>>,
}

impl Controller {
    pub(crate) fn new() -> (Self, watch::Receiver<ControlState>) {
        let (tx, rx) = watch::channel(ControlState::Running);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// Graceful stop: stop discovering, let pending and in-flight work drain.
    pub fn quit(&self) -> bool {
        self.escalate(ControlState::Draining)
    }

    /// Hard stop: stop discovering and dispatching immediately.
    pub fn abort(&self) -> bool {
        self.escalate(ControlState::Aborted)
    }

    pub fn state(&self) -> ControlState {
        *self.tx.borrow()
    }

    /// Moves the state forward to `target`. Returns whether it changed.
    fn escalate(&self, target: ControlState) -> bool {
        self.tx.send_if_modified(|state| {
            if *state < target {
                *state = target;
                true
            } else {
                false
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_running() {
        let (controller, rx) = Controller::new();
        assert_eq!(controller.state(), ControlState::Running);
        assert_eq!(*rx.borrow(), ControlState::Running);
    }

    #[test]
    fn quit_then_abort_escalates() {
        let (controller, rx) = Controller::new();
        assert!(controller.quit());
        assert_eq!(*rx.borrow(), ControlState::Draining);
        assert!(controller.abort());
        assert_eq!(*rx.borrow(), ControlState::Aborted);
    }

    #[test]
    fn state_never_moves_backwards() {
        let (controller, _rx) = Controller::new();
        controller.abort();
        assert!(!controller.quit());
        assert_eq!(controller.state(), ControlState::Aborted);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let (controller, mut rx) = Controller::new();
        let other = controller.clone();
        other.quit();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), ControlState::Draining);
        assert_eq!(controller.state(), ControlState::Draining);
    }
}
