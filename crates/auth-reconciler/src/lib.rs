//! Client-side authentication session reconciliation.
//!
//! This crate provides:
//! - An explicit FSM over *trust* in the session (`Unknown`, `Consistent`,
//!   `Divergent`, `Unrecoverable`)
//! - A `Reconciler` that keeps the remote session, the durable local cache
//!   and the in-memory store in agreement, with generation-guarded repairs
//! - A background `SessionChecker` deciding when to reconcile
//! - A declarative `RecoveryPanel` and the UI-facing `SessionHandle`

mod checker;
mod error;
mod handle;
mod identity;
mod reconciler;
mod recovery;
mod source;
mod store;
mod trust_fsm;

pub use checker::{CheckerConfig, CheckerHandle, RepairGate, SessionChecker};
pub use error::{AuthError, AuthResult};
pub use handle::SessionHandle;
pub use identity::{Identity, Provider};
pub use reconciler::{Reconciler, ReconcilerConfig, SessionSnapshot};
pub use recovery::{Navigation, RecoveryAction, RecoveryPanel, RecoveryPrompt, RecoveryReason};
pub use source::{AuthEvent, AuthEventKind, SessionSource};
pub use store::{SessionStateStore, SessionView};
pub use trust_fsm::trust_machine;
pub use trust_fsm::{SessionState, TrustMachine, TrustMachineInput, TrustMachineState};
