//! Declarative VM fleet reconciliation.
//!
//! Compares a declared fleet specification against observed provider
//! state and applies the minimum remediation each VM needs. Every field
//! in the VM schema carries a remediation severity; the diff engine
//! reduces field-level drift to one action per VM (in-place update,
//! stop/start cycle, or full recreation), gated by explicit force flags
//! for anything destructive.
//!
//! Entry point is [`Reconciler`]; provider access goes through the
//! [`computekit::ComputeBackend`] trait so runs can be driven against
//! the real API or an in-memory mock.

pub mod action;
pub mod diff;
pub mod error;
pub mod executor;
pub mod fleet;
pub mod normalize;
pub mod report;
pub mod schema;
pub mod value;

pub use action::{classify, ActionSet, RequiredAction};
pub use diff::{diff, ChangeRecord};
pub use error::{Error, Result};
pub use fleet::{ReconcileOptions, Reconciler};
pub use normalize::normalize;
pub use report::{ActionTaken, FleetResult, VmResult};
pub use schema::{apply_defaults, validate, vm_schema, FieldSpec, Severity};
