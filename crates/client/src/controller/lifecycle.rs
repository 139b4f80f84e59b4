//! Worker lifecycle state machine.
//!
//! `Parsed -> Installing -> Installed -> Activating -> Activated`

use fintrack_core::Error;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
}

#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: WorkerState,
    controls_clients: bool,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self { state: WorkerState::Parsed, controls_clients: false }
    }

    pub(crate) fn state(&self) -> WorkerState {
        self.state
    }

    pub(crate) fn controls_clients(&self) -> bool {
        self.controls_clients
    }

    pub(crate) fn begin_install(&mut self) -> Result<(), Error> {
        self.advance(WorkerState::Parsed, WorkerState::Installing)
    }

    pub(crate) fn finish_install(&mut self) -> Result<(), Error> {
        self.advance(WorkerState::Installing, WorkerState::Installed)
    }

    /// Drop back to `Parsed` after an install that never finished.
    ///
    /// No-op unless currently `Installing`.
    pub(crate) fn abort_install(&mut self) {
        if self.state == WorkerState::Installing {
            tracing::warn!("install abandoned, back to parsed");
            self.state = WorkerState::Parsed;
        }
    }

    pub(crate) fn begin_activate(&mut self) -> Result<(), Error> {
        self.advance(WorkerState::Installed, WorkerState::Activating)
    }

    /// With `claim`, open clients come under control without a reload.
    pub(crate) fn finish_activate(&mut self, claim: bool) -> Result<(), Error> {
        self.advance(WorkerState::Activating, WorkerState::Activated)?;
        self.controls_clients = claim;
        Ok(())
    }

    /// Jump straight to `Activated` for a worker installed by an earlier process.
    pub(crate) fn restore_activated(&mut self, claim: bool) -> Result<(), Error> {
        self.advance(WorkerState::Parsed, WorkerState::Activated)?;
        self.controls_clients = claim;
        Ok(())
    }

    fn advance(&mut self, from: WorkerState, to: WorkerState) -> Result<(), Error> {
        if self.state != from {
            return Err(Error::InvalidState(format!(
                "cannot move to {to:?} from {:?} (expected {from:?})",
                self.state
            )));
        }
        tracing::info!(from = ?from, to = ?to, "worker state change");
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.begin_install().unwrap();
        lifecycle.finish_install().unwrap();
        lifecycle.begin_activate().unwrap();
        lifecycle.finish_activate(true).unwrap();

        assert_eq!(lifecycle.state(), WorkerState::Activated);
        assert!(lifecycle.controls_clients());
    }

    #[test]
    fn test_activate_before_install_rejected() {
        let mut lifecycle = Lifecycle::new();
        let result = lifecycle.begin_activate();
        assert!(matches!(result, Err(Error::InvalidState(_))));
        assert_eq!(lifecycle.state(), WorkerState::Parsed);
    }

    #[test]
    fn test_install_twice_rejected() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.begin_install().unwrap();
        lifecycle.finish_install().unwrap();
        assert!(lifecycle.begin_install().is_err());
    }

    #[test]
    fn test_abort_install_allows_retry() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.begin_install().unwrap();
        lifecycle.abort_install();
        assert_eq!(lifecycle.state(), WorkerState::Parsed);

        lifecycle.begin_install().unwrap();
        lifecycle.finish_install().unwrap();
        lifecycle.abort_install();
        assert_eq!(lifecycle.state(), WorkerState::Installed);
    }

    #[test]
    fn test_without_claim_clients_stay_uncontrolled() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.begin_install().unwrap();
        lifecycle.finish_install().unwrap();
        lifecycle.begin_activate().unwrap();
        lifecycle.finish_activate(false).unwrap();
        assert!(!lifecycle.controls_clients());
    }

    #[test]
    fn test_restore_only_from_parsed() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.restore_activated(true).unwrap();
        assert_eq!(lifecycle.state(), WorkerState::Activated);
        assert!(lifecycle.restore_activated(true).is_err());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&WorkerState::Activated).unwrap(), "\"activated\"");
    }
}
