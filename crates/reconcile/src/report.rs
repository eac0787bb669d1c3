//! Per-VM and fleet-level reconciliation results.

use crate::action::RequiredAction;
use serde::Serialize;
use std::fmt;

/// What the execution engine actually did for one VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTaken {
    Unchanged,
    Created,
    Recreated,
    Restarted,
    UpdatedInPlace,
    Error,
}

impl ActionTaken {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Created => "created",
            Self::Recreated => "recreated",
            Self::Restarted => "restarted",
            Self::UpdatedInPlace => "updated in place",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ActionTaken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of reconciling a single VM.
#[derive(Debug, Clone, Serialize)]
pub struct VmResult {
    pub name: String,
    pub changed: bool,
    pub action: ActionTaken,
    /// The classified action; present even when nothing was executed
    /// (dry run, safety gate, execution failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<RequiredAction>,
    /// Rendered field-level changes, one `path: before -> after` line each.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VmResult {
    pub fn failed(name: impl Into<String>, required: Option<RequiredAction>, error: String) -> Self {
        Self {
            name: name.into(),
            changed: false,
            action: ActionTaken::Error,
            required,
            changes: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregate outcome of one reconciliation run, in manifest order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FleetResult {
    /// True when any VM changed.
    pub changed: bool,
    pub vms: Vec<VmResult>,
}

impl FleetResult {
    pub fn new(vms: Vec<VmResult>) -> Self {
        Self {
            changed: vms.iter().any(|vm| vm.changed),
            vms,
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &VmResult> {
        self.vms.iter().filter(|vm| vm.is_err())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unchanged(name: &str) -> VmResult {
        VmResult {
            name: name.to_string(),
            changed: false,
            action: ActionTaken::Unchanged,
            required: Some(RequiredAction::Unchanged),
            changes: Vec::new(),
            error: None,
        }
    }

    #[test]
    fn test_fleet_changed_aggregates_over_vms() {
        let mut changed_vm = unchanged("vm2");
        changed_vm.changed = true;
        changed_vm.action = ActionTaken::Created;

        let result = FleetResult::new(vec![unchanged("vm1"), changed_vm]);
        assert!(result.changed);
        assert!(!result.has_errors());

        let result = FleetResult::new(vec![unchanged("vm1")]);
        assert!(!result.changed);
    }

    #[test]
    fn test_vm_result_serialization_omits_empty_fields() {
        let json = serde_json::to_value(unchanged("vm1")).unwrap();
        assert_eq!(json["action"], "unchanged");
        assert_eq!(json["required"], "unchanged");
        assert!(json.get("changes").is_none());
        assert!(json.get("error").is_none());

        let failed = VmResult::failed("vm2", None, "boom".to_string());
        let json = serde_json::to_value(failed).unwrap();
        assert_eq!(json["action"], "error");
        assert_eq!(json["error"], "boom");
        assert!(json.get("required").is_none());
    }
}
