//! Execution engine: turn a classified action into provider operations.
//!
//! Every operation is submitted and then waited on before the next one is
//! issued; no two mutating operations on the same instance are ever in
//! flight together. A failed semantic operation is reported, never
//! reattempted here (the provider client retries transport errors only).

use crate::action::RequiredAction;
use crate::diff::ChangeRecord;
use crate::error::{Error, Result};
use crate::report::ActionTaken;
use crate::schema::{Severity, ValueType};
use crate::value;
use computekit::{
    BootDiskSpec, ComputeBackend, CreateInstanceSpec, DiskSpec, FieldMask, Instance,
    NetworkInterfaceSpec, OneToOneNatSpec, PrimaryAddressSpec, Resources, SchedulingPolicy,
    UpdateInstanceSpec, GIB,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Top-level groups an update operation is permitted to touch. Disk and
/// network identity are recreate-level and never part of a field mask.
pub const UPDATABLE_GROUPS: [&str; 3] = ["resources_spec", "metadata", "scheduling_policy"];

/// Apply the classified action to a single VM.
///
/// `instance` is the matched observed instance, `None` only for `Create`.
/// Returns what was actually done, or the first failure (with compensation
/// detail where a compensating action was attempted).
pub fn execute(
    backend: &dyn ComputeBackend,
    folder_id: &str,
    desired: &Map<String, Value>,
    instance: Option<&Instance>,
    action: RequiredAction,
    changes: &[ChangeRecord],
) -> Result<ActionTaken> {
    match action {
        RequiredAction::Unchanged => Ok(ActionTaken::Unchanged),
        RequiredAction::Create => {
            create(backend, folder_id, desired)?;
            Ok(ActionTaken::Created)
        }
        RequiredAction::Recreate => {
            // Delete-before-create: if create fails after the delete
            // succeeded, the VM is gone until a later run recreates it.
            // The failure surfaces loudly either way.
            if let Some(instance) = instance {
                log::info!("deleting instance {} for recreation", instance.name);
                submit_and_wait(backend, backend.delete_instance(&instance.id))?;
            }
            create(backend, folder_id, desired)?;
            Ok(ActionTaken::Recreated)
        }
        RequiredAction::Restart => {
            let instance = require_instance(instance, action)?;
            let mask = update_mask(changes);
            warn_unconverged(&instance.name, changes);

            // Built before the stop: a spec that cannot be built must not
            // leave the instance stopped.
            let spec = if mask.is_empty() {
                None
            } else {
                Some(build_update_spec(desired, &mask)?)
            };

            log::info!("stopping instance {}", instance.name);
            submit_and_wait(backend, backend.stop_instance(&instance.id))?;

            if let Some(spec) = spec {
                let updated =
                    submit_and_wait(backend, backend.update_instance(&instance.id, &mask, &spec));
                if let Err(update_err) = updated {
                    // The instance is stopped; try to bring it back before
                    // reporting. The update failure stays primary.
                    log::warn!(
                        "update of {} failed after stop, attempting compensating start",
                        instance.name
                    );
                    let compensation =
                        submit_and_wait(backend, backend.start_instance(&instance.id));
                    return Err(match compensation {
                        Ok(()) => update_err,
                        Err(start_err) => Error::Compensation {
                            original: update_err.to_string(),
                            compensation: start_err.to_string(),
                        },
                    });
                }
            }

            log::info!("starting instance {}", instance.name);
            submit_and_wait(backend, backend.start_instance(&instance.id))?;
            Ok(ActionTaken::Restarted)
        }
        RequiredAction::InPlace => {
            let instance = require_instance(instance, action)?;
            let mask = update_mask(changes);
            if !mask.is_empty() {
                let spec = build_update_spec(desired, &mask)?;
                submit_and_wait(backend, backend.update_instance(&instance.id, &mask, &spec))?;
            }
            Ok(ActionTaken::UpdatedInPlace)
        }
    }
}

fn create(backend: &dyn ComputeBackend, folder_id: &str, desired: &Map<String, Value>) -> Result<()> {
    let spec = build_create_spec(folder_id, desired)?;
    log::info!("creating instance {}", spec.name);
    submit_and_wait(backend, backend.create_instance(&spec))
}

fn submit_and_wait(
    backend: &dyn ComputeBackend,
    submitted: computekit::Result<computekit::Operation>,
) -> Result<()> {
    let operation = submitted?;
    backend.wait_operation(&operation)?;
    Ok(())
}

fn require_instance<'a>(
    instance: Option<&'a Instance>,
    action: RequiredAction,
) -> Result<&'a Instance> {
    instance.ok_or_else(|| {
        Error::Provider(computekit::Error::NotFound {
            resource: format!("instance for {action}"),
        })
    })
}

/// Field mask for an update: the changed top-level groups, restricted to
/// the update-safe set, in a fixed group order.
pub fn update_mask(changes: &[ChangeRecord]) -> FieldMask {
    UPDATABLE_GROUPS
        .iter()
        .filter(|group| {
            changes
                .iter()
                .any(|c| c.path.split('.').next() == Some(group))
        })
        .copied()
        .collect()
}

/// Build the partial update spec for the masked groups from desired state.
///
/// A masked group the desired state cannot populate (resources with no
/// cores/memory declared) is an error, not an empty body: submitting an
/// update that names the group but carries nothing would report success
/// while leaving the drift in place.
pub fn build_update_spec(
    desired: &Map<String, Value>,
    mask: &FieldMask,
) -> Result<UpdateInstanceSpec> {
    let mut spec = UpdateInstanceSpec::default();
    if mask.contains("resources_spec") {
        spec.resources_spec = Some(resources_from(desired)?);
    }
    if mask.contains("metadata") {
        spec.metadata = Some(metadata_from(desired));
    }
    if mask.contains("scheduling_policy") {
        spec.scheduling_policy = Some(SchedulingPolicy {
            preemptible: opt_bool(desired, "scheduling_policy.preemptible").unwrap_or(false),
        });
    }
    Ok(spec)
}

/// Changed paths a restart cycle cannot converge: Restart-severity drift in
/// fields outside the updatable groups (disk and network identity stay
/// fixed for the life of the instance).
pub fn unconverged_paths(changes: &[ChangeRecord]) -> Vec<&str> {
    changes
        .iter()
        .filter(|c| {
            c.severity == Severity::Restart
                && !UPDATABLE_GROUPS
                    .iter()
                    .any(|group| c.path.split('.').next() == Some(group))
        })
        .map(|c| c.path.as_str())
        .collect()
}

fn warn_unconverged(name: &str, changes: &[ChangeRecord]) {
    let paths = unconverged_paths(changes);
    if !paths.is_empty() {
        log::warn!(
            "restart of {name} leaves {} unconverged: not updatable without recreation",
            paths.join(", ")
        );
    }
}

/// Build a full create spec from desired state, converting GiB to bytes.
pub fn build_create_spec(
    folder_id: &str,
    desired: &Map<String, Value>,
) -> Result<CreateInstanceSpec> {
    let name = require_str(desired, "name")?;
    let zone_id = require_str(desired, "zone")?;
    let platform_id =
        opt_str(desired, "platform_id").unwrap_or_else(|| "standard-v1".to_string());

    if lookup(desired, "boot_disk_spec.disk_spec").is_none() {
        return Err(Error::Validation {
            path: "boot_disk_spec.disk_spec".to_string(),
            message: "required to create an instance".to_string(),
        });
    }
    if lookup(desired, "network_interface_specs").is_none() {
        return Err(Error::Validation {
            path: "network_interface_specs".to_string(),
            message: "required to create an instance".to_string(),
        });
    }

    Ok(CreateInstanceSpec {
        folder_id: folder_id.to_string(),
        name,
        zone_id,
        platform_id,
        resources_spec: resources_from(desired)?,
        boot_disk_spec: BootDiskSpec {
            auto_delete: true,
            disk_spec: DiskSpec {
                type_id: opt_str(desired, "boot_disk_spec.disk_spec.type_id"),
                size: require_i64(desired, "boot_disk_spec.disk_spec.size")? * GIB,
                image_id: require_str(desired, "boot_disk_spec.disk_spec.image_id")?,
            },
        },
        network_interface_specs: vec![NetworkInterfaceSpec {
            subnet_id: require_str(desired, "network_interface_specs.subnet_id")?,
            primary_v4_address_spec: PrimaryAddressSpec {
                one_to_one_nat_spec: opt_bool(
                    desired,
                    "network_interface_specs.primary_v4_address_spec.nat",
                )
                .unwrap_or(true)
                .then(|| OneToOneNatSpec {
                    ip_version: "IPV4".to_string(),
                }),
            },
        }],
        metadata: metadata_from(desired),
        scheduling_policy: SchedulingPolicy {
            preemptible: opt_bool(desired, "scheduling_policy.preemptible").unwrap_or(false),
        },
    })
}

fn resources_from(desired: &Map<String, Value>) -> Result<Resources> {
    Ok(Resources {
        cores: require_i64(desired, "resources_spec.cores")?,
        memory: require_i64(desired, "resources_spec.memory")? * GIB,
        core_fraction: opt_i64(desired, "resources_spec.core_fraction").unwrap_or(100),
    })
}

fn metadata_from(desired: &Map<String, Value>) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    if let Some(Value::Object(map)) = lookup(desired, "metadata") {
        for (key, raw) in map {
            if let Some(Value::String(s)) = value::coerce(raw, ValueType::Str) {
                metadata.insert(key.clone(), s);
            }
        }
    }
    metadata
}

fn lookup<'a>(map: &'a Map<String, Value>, dotted: &str) -> Option<&'a Value> {
    let mut segments = dotted.split('.');
    let mut current = map.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    if current.is_null() { None } else { Some(current) }
}

fn require_str(map: &Map<String, Value>, dotted: &str) -> Result<String> {
    opt_str(map, dotted).ok_or_else(|| Error::Validation {
        path: dotted.to_string(),
        message: "required field is missing".to_string(),
    })
}

fn require_i64(map: &Map<String, Value>, dotted: &str) -> Result<i64> {
    opt_i64(map, dotted).ok_or_else(|| Error::Validation {
        path: dotted.to_string(),
        message: "required field is missing".to_string(),
    })
}

fn opt_str(map: &Map<String, Value>, dotted: &str) -> Option<String> {
    match value::coerce(lookup(map, dotted)?, ValueType::Str)? {
        Value::String(s) => Some(s),
        _ => None,
    }
}

fn opt_i64(map: &Map<String, Value>, dotted: &str) -> Option<i64> {
    value::coerce(lookup(map, dotted)?, ValueType::Int)?.as_i64()
}

fn opt_bool(map: &Map<String, Value>, dotted: &str) -> Option<bool> {
    value::coerce(lookup(map, dotted)?, ValueType::Bool)?.as_bool()
}
