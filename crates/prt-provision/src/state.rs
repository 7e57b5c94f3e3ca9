use crate::types::PackageVersion;
use serde::Serialize;
use std::fmt;

/// Steps of one provisioning run.
///
/// ```text
/// Unchecked -> Missing | VersionMismatch | UpToDate
/// Missing | VersionMismatch -> Installing -> Installed | Failed
/// UpToDate -> Installed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProvisionState {
    Unchecked,
    Missing,
    VersionMismatch { found: PackageVersion },
    UpToDate,
    Installing,
    Installed,
    Failed,
}

impl ProvisionState {
    fn may_follow(self, prev: ProvisionState) -> bool {
        use ProvisionState::*;
        matches!(
            (prev, self),
            (Unchecked, Missing | VersionMismatch { .. } | UpToDate)
                | (Missing | VersionMismatch { .. }, Installing)
                | (Installing, Installed | Failed)
                | (UpToDate, Installed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ProvisionState::Installed | ProvisionState::Failed)
    }
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionState::VersionMismatch { found } => write!(f, "VersionMismatch({found})"),
            other => fmt::Debug::fmt(other, f),
        }
    }
}

/// Ordered record of the states a run went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateTrail {
    states: Vec<ProvisionState>,
}

impl Default for StateTrail {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTrail {
    pub fn new() -> Self {
        Self {
            states: vec![ProvisionState::Unchecked],
        }
    }

    pub fn current(&self) -> ProvisionState {
        // never empty: starts at Unchecked
        self.states[self.states.len() - 1]
    }

    /// Record a transition. Illegal transitions are a programming error.
    pub fn advance(&mut self, next: ProvisionState) {
        debug_assert!(
            next.may_follow(self.current()),
            "illegal transition {} -> {}",
            self.current(),
            next
        );
        tracing::debug!(from = %self.current(), to = %next, "provision state");
        self.states.push(next);
    }

    pub fn states(&self) -> &[ProvisionState] {
        &self.states
    }
}
