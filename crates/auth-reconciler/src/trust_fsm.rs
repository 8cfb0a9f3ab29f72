//! Session trust state machine using rust-fsm.
//!
//! The machine tracks how far the three session sources (remote, durable
//! cache, in-memory store) can be trusted to agree. It says nothing about
//! *who* is signed in.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐   Agree / RepairSucceeded   ┌─────────────────┐
//! │     Unknown     │ ──────────────────────────► │   Consistent    │
//! └────────┬────────┘                             └───┬─────────▲───┘
//!          │ Disagree / RepairFailed       Disagree / │         │ Agree / RepairSucceeded /
//!          ▼                             RepairFailed ▼         │ AuthEvent / ManualRecovery
//! ┌─────────────────┐ ◄───────────────────────────────┘         │
//! │    Divergent    │ ──────────────────────────────────────────┘
//! └────────┬────────┘
//!          │ BudgetExhausted
//!          ▼
//! ┌─────────────────┐   RepairSucceeded / AuthEvent / ManualRecovery
//! │  Unrecoverable  │ ──────────────────────────────────────────────► Consistent
//! └─────────────────┘   (Agree / Disagree / RepairFailed stay here)
//! ```

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub trust_machine(Unknown)

    Unknown => {
        Agree => Consistent,
        Disagree => Divergent,
        RepairSucceeded => Consistent,
        RepairFailed => Divergent,
        AuthEvent => Consistent,
        ManualRecovery => Consistent
    },
    Consistent => {
        Agree => Consistent,
        Disagree => Divergent,
        RepairSucceeded => Consistent,
        RepairFailed => Divergent,
        AuthEvent => Consistent,
        ManualRecovery => Consistent
    },
    Divergent => {
        Agree => Consistent,
        Disagree => Divergent,
        RepairSucceeded => Consistent,
        RepairFailed => Divergent,
        // Consecutive failed repairs reached the retry budget
        BudgetExhausted => Unrecoverable,
        AuthEvent => Consistent,
        ManualRecovery => Consistent
    },
    Unrecoverable => {
        // Automatic checks never leave this state
        Agree => Unrecoverable,
        Disagree => Unrecoverable,
        RepairFailed => Unrecoverable,
        // Only a manual Fix reaches repair() from here
        RepairSucceeded => Consistent,
        AuthEvent => Consistent,
        ManualRecovery => Consistent
    }
}

pub use trust_machine::Input as TrustMachineInput;
pub use trust_machine::State as TrustMachineState;
pub use trust_machine::StateMachine as TrustMachine;

/// Trust state exposed to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Initial load, nothing verified yet.
    Unknown,
    /// All sources agree.
    Consistent,
    /// Sources disagree; a repair is warranted.
    Divergent,
    /// Repairs exhausted; the user must choose a recovery action.
    Unrecoverable,
}

impl SessionState {
    /// Returns true if the UI should render the recovery panel.
    pub fn needs_recovery(&self) -> bool {
        matches!(self, SessionState::Unrecoverable)
    }

    /// Returns true if automatic checks may attempt a repair.
    pub fn allows_automatic_repair(&self) -> bool {
        !matches!(self, SessionState::Unrecoverable)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Unknown => "unknown",
            SessionState::Consistent => "consistent",
            SessionState::Divergent => "divergent",
            SessionState::Unrecoverable => "unrecoverable",
        };
        f.write_str(name)
    }
}

impl From<&TrustMachineState> for SessionState {
    fn from(state: &TrustMachineState) -> Self {
        match state {
            TrustMachineState::Unknown => SessionState::Unknown,
            TrustMachineState::Consistent => SessionState::Consistent,
            TrustMachineState::Divergent => SessionState::Divergent,
            TrustMachineState::Unrecoverable => SessionState::Unrecoverable,
        }
    }
}
