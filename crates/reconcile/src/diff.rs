//! Diff engine: schema-guided comparison of desired vs observed state.
//!
//! The walk is driven by the schema's declared children, never by the
//! union of keys present at runtime, so the report order is stable and
//! unknown runtime keys cannot leak into the diff. Every unequal leaf
//! yields one [`ChangeRecord`] tagged with that leaf's own severity.

use crate::action::ActionSet;
use crate::schema::{FieldSpec, Severity};
use crate::value;
use serde_json::{Map, Value};
use std::fmt;

/// One field-level difference between desired and observed state.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    /// Dotted field path
    pub path: String,
    /// The leaf's remediation severity
    pub severity: Severity,
    /// Observed value, `None` when absent
    pub before: Option<Value>,
    /// Desired value, `None` when absent
    pub after: Option<Value>,
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.path,
            value::display(self.before.as_ref()),
            value::display(self.after.as_ref())
        )
    }
}

/// Compare desired state against observed state under the schema.
///
/// `observed` is `None` when no instance with the matching name exists;
/// that sets the create flag and reports every populated desired leaf as
/// `absent -> value`. Records come back in schema traversal order.
pub fn diff(
    desired: &Map<String, Value>,
    observed: Option<&Map<String, Value>>,
    schema: &FieldSpec,
) -> (Vec<ChangeRecord>, ActionSet) {
    let mut records = Vec::new();
    let mut actions = ActionSet::default();

    if observed.is_none() {
        actions.create = true;
    }

    if let FieldSpec::Object { children } = schema {
        walk_fields(
            children,
            Some(desired),
            observed,
            "",
            &mut records,
            &mut actions,
        );
    }

    (records, actions)
}

fn walk_fields(
    children: &[(String, FieldSpec)],
    desired: Option<&Map<String, Value>>,
    observed: Option<&Map<String, Value>>,
    path: &str,
    records: &mut Vec<ChangeRecord>,
    actions: &mut ActionSet,
) {
    for (name, child) in children {
        let field_path = if path.is_empty() {
            name.clone()
        } else {
            format!("{path}.{name}")
        };
        // A value with no populated leaf (null, empty container) is absent.
        let d = desired
            .and_then(|m| m.get(name))
            .filter(|v| value::is_populated(v));
        let o = observed
            .and_then(|m| m.get(name))
            .filter(|v| value::is_populated(v));
        if d.is_none() && o.is_none() {
            continue;
        }
        walk_node(child, d, o, &field_path, records, actions);
    }
}

fn walk_node(
    spec: &FieldSpec,
    desired: Option<&Value>,
    observed: Option<&Value>,
    path: &str,
    records: &mut Vec<ChangeRecord>,
    actions: &mut ActionSet,
) {
    match spec {
        FieldSpec::Scalar(scalar) => {
            // Control flags are permissions, not state.
            if scalar.control {
                return;
            }
            let after = desired.map(|v| value::coerce(v, scalar.value_type).unwrap_or_else(|| v.clone()));
            let before = observed.map(|v| value::coerce(v, scalar.value_type).unwrap_or_else(|| v.clone()));
            if before == after {
                return;
            }
            actions.mark(scalar.severity);
            records.push(ChangeRecord {
                path: path.to_string(),
                severity: scalar.severity,
                before,
                after,
            });
        }
        FieldSpec::Object { children } => {
            walk_fields(
                children,
                desired.and_then(Value::as_object),
                observed.and_then(Value::as_object),
                path,
                records,
                actions,
            );
        }
    }
}
