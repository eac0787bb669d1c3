//! Action classification: reduce per-field severities to one action per VM.
//!
//! Severities are not additive. A VM needing both a restart-level and an
//! in-place change is simply restarted; the superset remediation satisfies
//! the subset, so only the maximum-severity bit matters. Create always wins
//! because no instance exists to apply lesser remediations to.

use crate::schema::Severity;
use serde::Serialize;
use std::fmt;

/// Which severities a VM's diff triggered, plus the implicit create flag
/// set when no observed instance exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionSet {
    pub create: bool,
    pub recreate: bool,
    pub restart: bool,
    pub in_place: bool,
}

impl ActionSet {
    /// Record one triggered severity.
    pub fn mark(&mut self, severity: Severity) {
        match severity {
            Severity::InPlace => self.in_place = true,
            Severity::Restart => self.restart = true,
            Severity::Recreate => self.recreate = true,
        }
    }

    pub fn any(&self) -> bool {
        self.create || self.recreate || self.restart || self.in_place
    }
}

/// The single dominant action required for a VM, ranked by a total order.
/// Classification picks the maximum; the ranking is part of the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredAction {
    Unchanged,
    InPlace,
    Restart,
    Recreate,
    Create,
}

impl RequiredAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::InPlace => "in-place update",
            Self::Restart => "restart",
            Self::Recreate => "recreate",
            Self::Create => "create",
        }
    }

    /// Whether executing this action mutates provider state.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

impl fmt::Display for RequiredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the dominant action with strict priority
/// `Create > Recreate > Restart > InPlace > Unchanged`.
pub fn classify(actions: &ActionSet) -> RequiredAction {
    if actions.create {
        RequiredAction::Create
    } else if actions.recreate {
        RequiredAction::Recreate
    } else if actions.restart {
        RequiredAction::Restart
    } else if actions.in_place {
        RequiredAction::InPlace
    } else {
        RequiredAction::Unchanged
    }
}
