//! Field-spec schema for VM specifications.
//!
//! The schema is a recursive tagged tree: every scalar leaf carries the
//! remediation [`Severity`] its drift requires, container nodes carry only
//! ordered children. Behavior lives in the data, not in per-field types;
//! the diff engine traverses the tree generically.
//!
//! The VM schema is built once at first use and shared read-only by all
//! reconciliation runs. A malformed schema definition is a programmer
//! error: [`vm_schema`] aborts the process rather than returning it.

use crate::error::{Error, Result};
use crate::value;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Remediation class a field's drift requires, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Field can be updated on a running instance
    InPlace,
    /// Field requires a stop/start cycle
    Restart,
    /// Field requires full delete + create
    Recreate,
}

/// Declared type of a scalar field, used to normalize both sides of a
/// comparison before checking equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Str,
    Int,
    Bool,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Bool => "bool",
        }
    }
}

/// A scalar leaf in the schema.
#[derive(Debug, Clone)]
pub struct ScalarSpec {
    pub value_type: ValueType,
    pub severity: Severity,
    pub required: bool,
    pub default: Option<Value>,
    /// Control flags grant permissions to the safety gate; they are never
    /// compared as state.
    pub control: bool,
}

/// A node in the field-spec tree.
#[derive(Debug, Clone)]
pub enum FieldSpec {
    Scalar(ScalarSpec),
    /// Container node; children keep declaration order, which defines the
    /// order of the diff report.
    Object { children: Vec<(String, FieldSpec)> },
}

impl FieldSpec {
    pub fn scalar(value_type: ValueType, severity: Severity) -> Self {
        Self::Scalar(ScalarSpec {
            value_type,
            severity,
            required: false,
            default: None,
            control: false,
        })
    }

    pub fn object(children: Vec<(&str, FieldSpec)>) -> Self {
        Self::Object {
            children: children
                .into_iter()
                .map(|(name, spec)| (name.to_string(), spec))
                .collect(),
        }
    }

    pub fn required(mut self) -> Self {
        if let Self::Scalar(ref mut scalar) = self {
            scalar.required = true;
        }
        self
    }

    pub fn default_value(mut self, default: impl Into<Value>) -> Self {
        if let Self::Scalar(ref mut scalar) = self {
            scalar.default = Some(default.into());
        }
        self
    }

    pub fn control(mut self) -> Self {
        if let Self::Scalar(ref mut scalar) = self {
            scalar.control = true;
        }
        self
    }

    /// Look up a direct child by name.
    pub fn child(&self, name: &str) -> Option<&FieldSpec> {
        match self {
            Self::Scalar(_) => None,
            Self::Object { children } => children
                .iter()
                .find(|(child, _)| child == name)
                .map(|(_, spec)| spec),
        }
    }

    /// Look up the severity of a leaf by dotted path.
    pub fn severity(&self, path: &str) -> Option<Severity> {
        let mut node = self;
        for segment in path.split('.') {
            node = node.child(segment)?;
        }
        match node {
            Self::Scalar(scalar) => Some(scalar.severity),
            Self::Object { .. } => None,
        }
    }

    /// Check the schema definition itself for programmer errors.
    pub fn verify(&self) -> Result<()> {
        self.verify_at("")
    }

    fn verify_at(&self, path: &str) -> Result<()> {
        match self {
            Self::Scalar(scalar) => {
                if let Some(default) = &scalar.default
                    && value::coerce(default, scalar.value_type).is_none()
                {
                    return Err(Error::Schema(format!(
                        "default for {path} is not a valid {}",
                        scalar.value_type.name()
                    )));
                }
                if scalar.control && scalar.value_type != ValueType::Bool {
                    return Err(Error::Schema(format!(
                        "control flag {path} must be bool"
                    )));
                }
                if scalar.control && scalar.required {
                    return Err(Error::Schema(format!(
                        "control flag {path} cannot be required"
                    )));
                }
                Ok(())
            }
            Self::Object { children } => {
                if children.is_empty() {
                    return Err(Error::Schema(format!(
                        "container {} declares no children",
                        if path.is_empty() { "<root>" } else { path }
                    )));
                }
                for (name, child) in children {
                    let child_path = if path.is_empty() {
                        name.clone()
                    } else {
                        format!("{path}.{name}")
                    };
                    child.verify_at(&child_path)?;
                }
                Ok(())
            }
        }
    }
}

/// The field schema for one VM specification, mirroring the provider's
/// instance surface. Severities encode which drift can be fixed live,
/// which needs a stop/start cycle, and which forces recreation.
pub fn vm_schema() -> &'static FieldSpec {
    static SCHEMA: OnceLock<FieldSpec> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        let schema = build_vm_schema();
        if let Err(e) = schema.verify() {
            // Programmer error in the schema definition; nothing to recover.
            panic!("invalid VM field schema: {e}");
        }
        schema
    })
}

fn build_vm_schema() -> FieldSpec {
    use Severity::{InPlace, Recreate, Restart};
    use ValueType::{Bool, Int, Str};

    FieldSpec::object(vec![
        ("name", FieldSpec::scalar(Str, InPlace).required()),
        ("zone", FieldSpec::scalar(Str, Recreate).required()),
        (
            "platform_id",
            FieldSpec::scalar(Str, Recreate).default_value("standard-v1"),
        ),
        (
            "force_recreate",
            FieldSpec::scalar(Bool, InPlace)
                .default_value(false)
                .control(),
        ),
        (
            "force_restart",
            FieldSpec::scalar(Bool, InPlace)
                .default_value(false)
                .control(),
        ),
        (
            "resources_spec",
            FieldSpec::object(vec![
                ("cores", FieldSpec::scalar(Int, Restart).required()),
                ("memory", FieldSpec::scalar(Int, Restart).required()),
                (
                    "core_fraction",
                    FieldSpec::scalar(Int, Restart).default_value(100),
                ),
            ]),
        ),
        (
            "boot_disk_spec",
            FieldSpec::object(vec![(
                "disk_spec",
                FieldSpec::object(vec![
                    ("type_id", FieldSpec::scalar(Str, Recreate)),
                    ("size", FieldSpec::scalar(Int, Restart).required()),
                    ("image_id", FieldSpec::scalar(Str, Recreate).required()),
                ]),
            )]),
        ),
        (
            "network_interface_specs",
            FieldSpec::object(vec![
                ("subnet_id", FieldSpec::scalar(Str, Restart).required()),
                (
                    "primary_v4_address_spec",
                    FieldSpec::object(vec![(
                        "nat",
                        FieldSpec::scalar(Bool, Restart).default_value(true),
                    )]),
                ),
            ]),
        ),
        (
            "scheduling_policy",
            FieldSpec::object(vec![(
                "preemptible",
                FieldSpec::scalar(Bool, Restart).default_value(false),
            )]),
        ),
        (
            "metadata",
            FieldSpec::object(vec![("ssh-keys", FieldSpec::scalar(Str, Restart))]),
        ),
    ])
}

/// Fill in declared defaults for scalars missing from `desired`.
///
/// Defaults inside a nested container apply only when that container is
/// itself present, so an entirely absent group stays absent.
pub fn apply_defaults(desired: &Map<String, Value>, schema: &FieldSpec) -> Map<String, Value> {
    let mut effective = desired.clone();
    if let FieldSpec::Object { children } = schema {
        for (name, child) in children {
            match child {
                FieldSpec::Scalar(scalar) => {
                    if let Some(default) = &scalar.default
                        && !effective.contains_key(name)
                    {
                        effective.insert(name.clone(), default.clone());
                    }
                }
                FieldSpec::Object { .. } => {
                    if let Some(Value::Object(inner)) = effective.get(name) {
                        let filled = apply_defaults(inner, child);
                        effective.insert(name.clone(), Value::Object(filled));
                    }
                }
            }
        }
    }
    effective
}

/// Validate a desired VM spec against the schema: unknown fields, missing
/// required scalars, and values that cannot be coerced to their declared
/// type are reported per field.
pub fn validate(desired: &Map<String, Value>, schema: &FieldSpec) -> Result<()> {
    validate_at(desired, schema, "")
}

fn validate_at(desired: &Map<String, Value>, schema: &FieldSpec, path: &str) -> Result<()> {
    let FieldSpec::Object { children } = schema else {
        return Err(Error::Schema(format!(
            "validate called on a scalar node at {path}"
        )));
    };

    for key in desired.keys() {
        if schema.child(key).is_none() {
            return Err(Error::Validation {
                path: join_path(path, key),
                message: "unknown field".to_string(),
            });
        }
    }

    for (name, child) in children {
        let field_path = join_path(path, name);
        let present = desired.get(name).filter(|v| !v.is_null());

        match child {
            FieldSpec::Scalar(scalar) => match present {
                None => {
                    if scalar.required {
                        return Err(Error::Validation {
                            path: field_path,
                            message: "required field is missing".to_string(),
                        });
                    }
                }
                Some(v) => {
                    if value::coerce(v, scalar.value_type).is_none() {
                        return Err(Error::Validation {
                            path: field_path,
                            message: format!(
                                "expected {}, got {v}",
                                scalar.value_type.name()
                            ),
                        });
                    }
                }
            },
            FieldSpec::Object { .. } => {
                if let Some(v) = present {
                    let Value::Object(inner) = v else {
                        return Err(Error::Validation {
                            path: field_path,
                            message: "expected a mapping".to_string(),
                        });
                    };
                    validate_at(inner, child, &field_path)?;
                }
            }
        }
    }

    Ok(())
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_vm_schema_is_well_formed() {
        vm_schema().verify().unwrap();
    }

    #[test]
    fn test_severity_lookup_by_path() {
        let schema = vm_schema();
        assert_eq!(schema.severity("zone"), Some(Severity::Recreate));
        assert_eq!(
            schema.severity("resources_spec.cores"),
            Some(Severity::Restart)
        );
        assert_eq!(
            schema.severity("boot_disk_spec.disk_spec.image_id"),
            Some(Severity::Recreate)
        );
        assert_eq!(schema.severity("resources_spec"), None);
        assert_eq!(schema.severity("no.such.path"), None);
    }

    #[test]
    fn test_verify_rejects_empty_container() {
        let schema = FieldSpec::object(vec![("empty", FieldSpec::Object { children: vec![] })]);
        assert!(schema.verify().is_err());
    }

    #[test]
    fn test_verify_rejects_mistyped_default() {
        let schema = FieldSpec::object(vec![(
            "cores",
            FieldSpec::scalar(ValueType::Int, Severity::Restart).default_value("not-a-number"),
        )]);
        assert!(schema.verify().is_err());
    }

    #[test]
    fn test_validate_requires_name_and_zone() {
        let desired = as_map(json!({"name": "vm1"}));
        let err = validate(&desired, vm_schema()).unwrap_err();
        assert!(err.to_string().contains("zone"));
    }

    #[test]
    fn test_validate_rejects_unknown_field() {
        let desired = as_map(json!({
            "name": "vm1",
            "zone": "ru-central1-a",
            "flavor": "large"
        }));
        let err = validate(&desired, vm_schema()).unwrap_err();
        assert!(err.to_string().contains("flavor"));
    }

    #[test]
    fn test_validate_rejects_mistyped_scalar() {
        let desired = as_map(json!({
            "name": "vm1",
            "zone": "ru-central1-a",
            "resources_spec": {"cores": "four", "memory": 8}
        }));
        let err = validate(&desired, vm_schema()).unwrap_err();
        assert!(err.to_string().contains("cores"));
    }

    #[test]
    fn test_validate_accepts_coercible_scalar() {
        let desired = as_map(json!({
            "name": "vm1",
            "zone": "ru-central1-a",
            "resources_spec": {"cores": "4", "memory": 8}
        }));
        validate(&desired, vm_schema()).unwrap();
    }

    #[test]
    fn test_apply_defaults_fills_top_level_and_present_groups() {
        let desired = as_map(json!({
            "name": "vm1",
            "zone": "ru-central1-a",
            "resources_spec": {"cores": 2, "memory": 4}
        }));
        let effective = apply_defaults(&desired, vm_schema());
        assert_eq!(effective["platform_id"], json!("standard-v1"));
        assert_eq!(effective["force_recreate"], json!(false));
        assert_eq!(effective["resources_spec"]["core_fraction"], json!(100));
        // absent groups stay absent
        assert!(!effective.contains_key("scheduling_policy"));
    }
}
