//! Fleet orchestrator: reconcile every declared VM against observed state.
//!
//! One reconciliation run observes the whole fleet once, then processes
//! VMs independently on a bounded worker pool. A failing VM records its
//! error in its own result and never aborts the rest; results come back
//! in manifest order regardless of completion order.

use crate::action::{classify, RequiredAction};
use crate::diff::diff;
use crate::error::{Error, Result};
use crate::executor;
use crate::normalize::normalize;
use crate::report::{ActionTaken, FleetResult, VmResult};
use crate::schema::{apply_defaults, validate, vm_schema, ValueType};
use crate::value;
use computekit::{ComputeBackend, Instance};
use rayon::prelude::*;
use serde_json::{Map, Value};

/// Knobs for one reconciliation run.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    /// Plan only: classify and report, execute nothing.
    pub dry_run: bool,
    /// Number of VMs processed concurrently.
    pub jobs: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
        }
    }
}

/// Drives reconciliation of a VM fleet within one provider folder.
pub struct Reconciler<'a> {
    backend: &'a dyn ComputeBackend,
    folder_id: String,
}

impl<'a> Reconciler<'a> {
    pub fn new(backend: &'a dyn ComputeBackend, folder_id: impl Into<String>) -> Self {
        Self {
            backend,
            folder_id: folder_id.into(),
        }
    }

    /// Read the full current fleet: list, then resolve each instance.
    pub fn observe(&self) -> Result<Vec<Instance>> {
        let refs = self.backend.list_instances(&self.folder_id)?;
        refs.iter()
            .map(|r| self.backend.get_instance(&r.id).map_err(Error::from))
            .collect()
    }

    /// Reconcile the declared fleet. See [`Reconciler::reconcile_with`].
    pub fn reconcile(
        &self,
        vms: &[Map<String, Value>],
        options: ReconcileOptions,
    ) -> Result<FleetResult> {
        self.reconcile_with(vms, options, |_| {})
    }

    /// Reconcile the declared fleet, invoking `on_result` as each VM
    /// finishes. The returned results follow manifest order.
    ///
    /// Only observation and worker pool failures abort the run; per-VM
    /// failures are recorded in the matching [`VmResult`].
    pub fn reconcile_with(
        &self,
        vms: &[Map<String, Value>],
        options: ReconcileOptions,
        on_result: impl Fn(&VmResult) + Sync,
    ) -> Result<FleetResult> {
        let observed = self.observe()?;
        log::info!(
            "reconciling {} declared VMs against {} observed instances",
            vms.len(),
            observed.len()
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.jobs.max(1))
            .build()
            .map_err(|e| Error::Runtime(e.to_string()))?;

        let results: Vec<VmResult> = pool.install(|| {
            vms.par_iter()
                .map(|desired| {
                    let result = self.reconcile_vm(desired, &observed, options.dry_run);
                    on_result(&result);
                    result
                })
                .collect()
        });

        Ok(FleetResult::new(results))
    }

    /// Reconcile one VM. All failures are folded into the returned result.
    fn reconcile_vm(
        &self,
        desired: &Map<String, Value>,
        observed: &[Instance],
        dry_run: bool,
    ) -> VmResult {
        let Some(name) = vm_name(desired) else {
            return VmResult::failed(
                "<unnamed>",
                None,
                Error::Validation {
                    path: "name".to_string(),
                    message: "required field is missing".to_string(),
                }
                .to_string(),
            );
        };

        let effective = apply_defaults(desired, vm_schema());
        if let Err(e) = validate(&effective, vm_schema()) {
            return VmResult::failed(name, None, e.to_string());
        }

        let instance = observed.iter().find(|i| i.name == name);
        let observed_state = match instance {
            Some(instance) => match normalize(instance, self.backend) {
                Ok(state) => Some(state),
                Err(e) => return VmResult::failed(name, None, e.to_string()),
            },
            None => None,
        };

        let (changes, actions) = diff(&effective, observed_state.as_ref(), vm_schema());
        let required = classify(&actions);
        let change_lines: Vec<String> = changes.iter().map(ToString::to_string).collect();
        for line in &change_lines {
            log::debug!("{name}: {line}");
        }

        if let Err(e) = check_gate(required, &effective) {
            return VmResult {
                name,
                changed: false,
                action: ActionTaken::Error,
                required: Some(required),
                changes: change_lines,
                error: Some(e.to_string()),
            };
        }

        if dry_run {
            return VmResult {
                name,
                changed: required.is_mutating(),
                action: ActionTaken::Unchanged,
                required: Some(required),
                changes: change_lines,
                error: None,
            };
        }

        match executor::execute(
            self.backend,
            &self.folder_id,
            &effective,
            instance,
            required,
            &changes,
        ) {
            Ok(taken) => VmResult {
                name,
                changed: required.is_mutating(),
                action: taken,
                required: Some(required),
                changes: change_lines,
                error: None,
            },
            // Execution may have partially mutated provider state.
            Err(e) => VmResult {
                name,
                changed: true,
                action: ActionTaken::Error,
                required: Some(required),
                changes: change_lines,
                error: Some(e.to_string()),
            },
        }
    }
}

fn vm_name(desired: &Map<String, Value>) -> Option<String> {
    match value::coerce(desired.get("name")?, ValueType::Str)? {
        Value::String(name) => Some(name),
        _ => None,
    }
}

/// Destructive remediations require their matching force flag.
fn check_gate(required: RequiredAction, effective: &Map<String, Value>) -> Result<()> {
    let gate = match required {
        RequiredAction::Restart => Some(("restart", "force_restart")),
        RequiredAction::Recreate => Some(("recreate", "force_recreate")),
        _ => None,
    };
    if let Some((action, flag)) = gate
        && !flag_enabled(effective, flag)
    {
        return Err(Error::Authorization {
            action: action.to_string(),
            flag: flag.to_string(),
        });
    }
    Ok(())
}

fn flag_enabled(effective: &Map<String, Value>, flag: &str) -> bool {
    effective
        .get(flag)
        .and_then(|v| value::coerce(v, ValueType::Bool))
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use computekit::MockBackend;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn sample_vm(name: &str, cores: i64) -> Map<String, Value> {
        as_map(json!({
            "name": name,
            "zone": "ru-central1-a",
            "resources_spec": {"cores": cores, "memory": 4},
            "boot_disk_spec": {"disk_spec": {"type_id": "network-hdd", "size": 10, "image_id": "img-1"}},
            "network_interface_specs": {"subnet_id": "sub-1", "primary_v4_address_spec": {"nat": true}},
            "scheduling_policy": {"preemptible": false},
            "metadata": {"ssh-keys": "ubuntu:ssh-rsa AAAA"}
        }))
    }

    fn options() -> ReconcileOptions {
        ReconcileOptions {
            dry_run: false,
            jobs: 2,
        }
    }

    #[test]
    fn test_missing_instance_is_created() {
        let backend = MockBackend::new();
        let reconciler = Reconciler::new(&backend, "folder1");

        let result = reconciler
            .reconcile(&[sample_vm("vm1", 2)], options())
            .unwrap();

        assert!(result.changed);
        assert_eq!(result.vms[0].action, ActionTaken::Created);
        assert_eq!(result.vms[0].required, Some(RequiredAction::Create));
        assert_eq!(backend.instances().len(), 1);
    }

    #[test]
    fn test_second_run_converges_to_unchanged() {
        let backend = MockBackend::new();
        let reconciler = Reconciler::new(&backend, "folder1");
        let vms = [sample_vm("vm1", 2)];

        reconciler.reconcile(&vms, options()).unwrap();
        backend.reset_calls();

        let result = reconciler.reconcile(&vms, options()).unwrap();
        assert!(!result.changed);
        assert_eq!(result.vms[0].action, ActionTaken::Unchanged);
        assert!(result.vms[0].changes.is_empty());
        assert!(backend.mutation_calls().is_empty());
    }

    #[test]
    fn test_gate_blocks_restart_without_flag() {
        let backend = MockBackend::new();
        let reconciler = Reconciler::new(&backend, "folder1");
        reconciler
            .reconcile(&[sample_vm("vm1", 2)], options())
            .unwrap();
        backend.reset_calls();

        let result = reconciler
            .reconcile(&[sample_vm("vm1", 4)], options())
            .unwrap();

        let vm = &result.vms[0];
        assert!(!vm.changed);
        assert_eq!(vm.action, ActionTaken::Error);
        assert_eq!(vm.required, Some(RequiredAction::Restart));
        assert!(vm.error.as_deref().unwrap().contains("force_restart"));
        assert!(backend.mutation_calls().is_empty());
    }

    #[test]
    fn test_force_restart_allows_the_restart() {
        let backend = MockBackend::new();
        let reconciler = Reconciler::new(&backend, "folder1");
        reconciler
            .reconcile(&[sample_vm("vm1", 2)], options())
            .unwrap();
        backend.reset_calls();

        let mut desired = sample_vm("vm1", 4);
        desired.insert("force_restart".to_string(), json!(true));
        let result = reconciler.reconcile(&[desired], options()).unwrap();

        assert!(result.changed);
        assert_eq!(result.vms[0].action, ActionTaken::Restarted);
        assert_eq!(backend.instances()[0].resources.cores, 4);
    }

    #[test]
    fn test_gate_blocks_recreate_without_flag() {
        let backend = MockBackend::new();
        let reconciler = Reconciler::new(&backend, "folder1");
        reconciler
            .reconcile(&[sample_vm("vm1", 2)], options())
            .unwrap();
        backend.reset_calls();

        let mut desired = sample_vm("vm1", 2);
        desired.insert("zone".to_string(), json!("ru-central1-b"));
        let result = reconciler.reconcile(&[desired], options()).unwrap();

        let vm = &result.vms[0];
        assert_eq!(vm.required, Some(RequiredAction::Recreate));
        assert!(vm.error.as_deref().unwrap().contains("force_recreate"));
        assert!(backend.mutation_calls().is_empty());
    }

    #[test]
    fn test_dry_run_executes_nothing() {
        let backend = MockBackend::new();
        let reconciler = Reconciler::new(&backend, "folder1");

        let opts = ReconcileOptions {
            dry_run: true,
            jobs: 2,
        };
        let result = reconciler.reconcile(&[sample_vm("vm1", 2)], opts).unwrap();

        assert!(result.changed);
        assert_eq!(result.vms[0].required, Some(RequiredAction::Create));
        assert!(!result.vms[0].changes.is_empty());
        assert!(backend.mutation_calls().is_empty());
        assert!(backend.instances().is_empty());
    }

    #[test]
    fn test_one_failing_vm_does_not_abort_the_rest() {
        let backend = MockBackend::new();
        let reconciler = Reconciler::new(&backend, "folder1");

        let mut invalid = sample_vm("vm1", 2);
        invalid.remove("zone");
        let vms = [invalid, sample_vm("vm2", 2)];

        let result = reconciler.reconcile(&vms, options()).unwrap();

        assert!(result.vms[0].is_err());
        assert_eq!(result.vms[1].action, ActionTaken::Created);
        assert_eq!(backend.instances().len(), 1);
        assert_eq!(backend.instances()[0].name, "vm2");
    }

    #[test]
    fn test_results_follow_manifest_order() {
        let backend = MockBackend::new();
        let reconciler = Reconciler::new(&backend, "folder1");
        let vms: Vec<_> = (0..8).map(|i| sample_vm(&format!("vm{i}"), 2)).collect();

        let result = reconciler.reconcile(&vms, options()).unwrap();

        let names: Vec<_> = result.vms.iter().map(|vm| vm.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["vm0", "vm1", "vm2", "vm3", "vm4", "vm5", "vm6", "vm7"]
        );
    }

    #[test]
    fn test_unnamed_vm_is_rejected() {
        let backend = MockBackend::new();
        let reconciler = Reconciler::new(&backend, "folder1");

        let mut desired = sample_vm("vm1", 2);
        desired.remove("name");
        let result = reconciler.reconcile(&[desired], options()).unwrap();

        assert!(result.vms[0].is_err());
        assert_eq!(result.vms[0].name, "<unnamed>");
        assert!(backend.mutation_calls().is_empty());
    }
}
