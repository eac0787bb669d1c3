//! In-memory mock backend for testing.
//!
//! Holds a fleet of instances behind a mutex, records every call in order,
//! and actually applies creates, deletes and masked updates so that a
//! subsequent read observes converged state. Failures can be injected per
//! operation kind; an injected failure surfaces at `wait_operation` and the
//! mutation is not applied, modeling a submitted operation that reaches a
//! terminal failure.

use crate::backend::ComputeBackend;
use crate::error::{Error, Result};
use crate::types::{
    AttachedDisk, CreateInstanceSpec, DiskInfo, FieldMask, Instance, InstanceRef, InstanceStatus,
    OneToOneNat, Operation, OperationKind, PrimaryAddress, UpdateInstanceSpec,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Default)]
struct MockState {
    instances: Vec<Instance>,
    disks: BTreeMap<String, DiskInfo>,
    calls: Vec<String>,
    fail: HashMap<OperationKind, String>,
    /// Submitted operations awaiting `wait_operation`. The mutation itself
    /// runs at submit time unless a failure was injected; the entry only
    /// carries the outcome to report.
    pending: HashMap<String, PendingOp>,
    next_id: u64,
}

struct PendingOp {
    kind: OperationKind,
    failure: Option<String>,
}

/// Stateful in-memory implementation of [`ComputeBackend`].
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing instance and, optionally, its boot disk details.
    pub fn seed_instance(&self, instance: Instance, disk: Option<DiskInfo>) {
        let mut state = self.lock();
        if let Some(disk) = disk {
            state.disks.insert(disk.id.clone(), disk);
        }
        state.instances.push(instance);
    }

    /// Inject a failure for every subsequent operation of the given kind.
    /// The operation is still submitted, but `wait_operation` reports the
    /// failure and the mutation is not applied.
    pub fn fail_operation(&self, kind: OperationKind, message: impl Into<String>) {
        self.lock().fail.insert(kind, message.into());
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.lock().fail.clear();
    }

    /// All recorded calls, in submission order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Recorded calls that would mutate provider state.
    pub fn mutation_calls(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|c| {
                c.starts_with("create")
                    || c.starts_with("delete")
                    || c.starts_with("update")
                    || c.starts_with("stop")
                    || c.starts_with("start")
            })
            .cloned()
            .collect()
    }

    /// Forget recorded calls (useful between reconciliation runs).
    pub fn reset_calls(&self) {
        self.lock().calls.clear();
    }

    /// Snapshot of the current fleet.
    pub fn instances(&self) -> Vec<Instance> {
        self.lock().instances.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn submit(
        &self,
        state: &mut MockState,
        kind: OperationKind,
        apply: impl FnOnce(&mut MockState),
    ) -> Operation {
        state.next_id += 1;
        let id = format!("op-{}", state.next_id);
        let failure = state.fail.get(&kind).cloned();
        if failure.is_none() {
            apply(state);
        }
        state.pending.insert(id.clone(), PendingOp { kind, failure });
        Operation::new(id, kind)
    }
}

impl ComputeBackend for MockBackend {
    fn list_instances(&self, folder_id: &str) -> Result<Vec<InstanceRef>> {
        let mut state = self.lock();
        state.calls.push(format!("list {folder_id}"));
        Ok(state
            .instances
            .iter()
            .map(|i| InstanceRef {
                id: i.id.clone(),
                name: i.name.clone(),
            })
            .collect())
    }

    fn get_instance(&self, instance_id: &str) -> Result<Instance> {
        let mut state = self.lock();
        state.calls.push(format!("get {instance_id}"));
        state
            .instances
            .iter()
            .find(|i| i.id == instance_id)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                resource: format!("instance {instance_id}"),
            })
    }

    fn get_disk(&self, disk_id: &str) -> Result<DiskInfo> {
        let mut state = self.lock();
        state.calls.push(format!("get_disk {disk_id}"));
        state
            .disks
            .get(disk_id)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                resource: format!("disk {disk_id}"),
            })
    }

    fn create_instance(&self, spec: &CreateInstanceSpec) -> Result<Operation> {
        let mut state = self.lock();
        state.calls.push(format!("create {}", spec.name));

        state.next_id += 1;
        let instance_id = format!("i-{}", state.next_id);
        state.next_id += 1;
        let disk_id = format!("d-{}", state.next_id);

        let disk = DiskInfo {
            id: disk_id.clone(),
            type_id: spec
                .boot_disk_spec
                .disk_spec
                .type_id
                .clone()
                .unwrap_or_else(|| "network-hdd".to_string()),
            size: spec.boot_disk_spec.disk_spec.size,
            source_image_id: spec.boot_disk_spec.disk_spec.image_id.clone(),
        };

        let network_interfaces = spec
            .network_interface_specs
            .iter()
            .map(|nic| crate::types::NetworkInterface {
                subnet_id: nic.subnet_id.clone(),
                primary_v4_address: Some(PrimaryAddress {
                    address: "10.0.0.2".to_string(),
                    one_to_one_nat: nic
                        .primary_v4_address_spec
                        .one_to_one_nat_spec
                        .as_ref()
                        .map(|_| OneToOneNat::default()),
                }),
            })
            .collect();

        let instance = Instance {
            id: instance_id,
            name: spec.name.clone(),
            zone_id: spec.zone_id.clone(),
            platform_id: spec.platform_id.clone(),
            status: InstanceStatus::Running,
            resources: spec.resources_spec.clone(),
            boot_disk: Some(AttachedDisk {
                disk_id: disk_id.clone(),
                auto_delete: spec.boot_disk_spec.auto_delete,
            }),
            network_interfaces,
            scheduling_policy: Some(spec.scheduling_policy),
            metadata: spec.metadata.clone(),
        };

        let op = self.submit(&mut state, OperationKind::Create, move |s| {
            s.disks.insert(disk_id, disk);
            s.instances.push(instance);
        });
        Ok(op)
    }

    fn delete_instance(&self, instance_id: &str) -> Result<Operation> {
        let mut state = self.lock();
        state.calls.push(format!("delete {instance_id}"));
        let id = instance_id.to_string();
        let op = self.submit(&mut state, OperationKind::Delete, move |s| {
            if let Some(pos) = s.instances.iter().position(|i| i.id == id) {
                let removed = s.instances.remove(pos);
                if let Some(disk) = removed.boot_disk.filter(|d| d.auto_delete) {
                    s.disks.remove(&disk.disk_id);
                }
            }
        });
        Ok(op)
    }

    fn update_instance(
        &self,
        instance_id: &str,
        mask: &FieldMask,
        spec: &UpdateInstanceSpec,
    ) -> Result<Operation> {
        let mut state = self.lock();
        state
            .calls
            .push(format!("update {instance_id} mask={mask}"));
        let id = instance_id.to_string();
        let mask = mask.clone();
        let spec = spec.clone();
        let op = self.submit(&mut state, OperationKind::Update, move |s| {
            if let Some(instance) = s.instances.iter_mut().find(|i| i.id == id) {
                if mask.contains("resources_spec")
                    && let Some(resources) = spec.resources_spec
                {
                    instance.resources = resources;
                }
                if mask.contains("metadata")
                    && let Some(metadata) = spec.metadata
                {
                    instance.metadata = metadata;
                }
                if mask.contains("scheduling_policy")
                    && let Some(policy) = spec.scheduling_policy
                {
                    instance.scheduling_policy = Some(policy);
                }
            }
        });
        Ok(op)
    }

    fn stop_instance(&self, instance_id: &str) -> Result<Operation> {
        let mut state = self.lock();
        state.calls.push(format!("stop {instance_id}"));
        let id = instance_id.to_string();
        let op = self.submit(&mut state, OperationKind::Stop, move |s| {
            if let Some(instance) = s.instances.iter_mut().find(|i| i.id == id) {
                instance.status = InstanceStatus::Stopped;
            }
        });
        Ok(op)
    }

    fn start_instance(&self, instance_id: &str) -> Result<Operation> {
        let mut state = self.lock();
        state.calls.push(format!("start {instance_id}"));
        let id = instance_id.to_string();
        let op = self.submit(&mut state, OperationKind::Start, move |s| {
            if let Some(instance) = s.instances.iter_mut().find(|i| i.id == id) {
                instance.status = InstanceStatus::Running;
            }
        });
        Ok(op)
    }

    fn wait_operation(&self, operation: &Operation) -> Result<()> {
        let mut state = self.lock();
        match state.pending.remove(&operation.id) {
            Some(PendingOp {
                failure: Some(message),
                kind,
            }) => Err(Error::OperationFailed { kind, message }),
            Some(PendingOp { failure: None, .. }) => Ok(()),
            None => Err(Error::NotFound {
                resource: format!("operation {}", operation.id),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        BootDiskSpec, DiskSpec, NetworkInterfaceSpec, OneToOneNatSpec, PrimaryAddressSpec,
        Resources, SchedulingPolicy, GIB,
    };

    fn sample_spec(name: &str) -> CreateInstanceSpec {
        CreateInstanceSpec {
            folder_id: "folder1".to_string(),
            name: name.to_string(),
            zone_id: "ru-central1-a".to_string(),
            platform_id: "standard-v1".to_string(),
            resources_spec: Resources {
                cores: 2,
                memory: 4 * GIB,
                core_fraction: 100,
            },
            boot_disk_spec: BootDiskSpec {
                auto_delete: true,
                disk_spec: DiskSpec {
                    type_id: Some("network-hdd".to_string()),
                    size: 10 * GIB,
                    image_id: "img-1".to_string(),
                },
            },
            network_interface_specs: vec![NetworkInterfaceSpec {
                subnet_id: "sub-1".to_string(),
                primary_v4_address_spec: PrimaryAddressSpec {
                    one_to_one_nat_spec: Some(OneToOneNatSpec {
                        ip_version: "IPV4".to_string(),
                    }),
                },
            }],
            metadata: BTreeMap::new(),
            scheduling_policy: SchedulingPolicy { preemptible: false },
        }
    }

    #[test]
    fn test_create_then_list_and_get_disk() {
        let backend = MockBackend::new();
        let op = backend.create_instance(&sample_spec("vm1")).unwrap();
        backend.wait_operation(&op).unwrap();

        let refs = backend.list_instances("folder1").unwrap();
        assert_eq!(refs.len(), 1);
        let instance = backend.get_instance(&refs[0].id).unwrap();
        assert_eq!(instance.name, "vm1");

        let disk_id = instance.boot_disk.unwrap().disk_id;
        let disk = backend.get_disk(&disk_id).unwrap();
        assert_eq!(disk.source_image_id, "img-1");
        assert_eq!(disk.size, 10 * GIB);
    }

    #[test]
    fn test_injected_failure_leaves_state_untouched() {
        let backend = MockBackend::new();
        backend.fail_operation(OperationKind::Create, "quota exceeded");

        let op = backend.create_instance(&sample_spec("vm1")).unwrap();
        let err = backend.wait_operation(&op).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        assert!(backend.instances().is_empty());
    }

    #[test]
    fn test_masked_update_applies_only_named_groups() {
        let backend = MockBackend::new();
        let op = backend.create_instance(&sample_spec("vm1")).unwrap();
        backend.wait_operation(&op).unwrap();
        let id = backend.instances()[0].id.clone();

        let mask: FieldMask = ["resources_spec"].into_iter().collect();
        let spec = UpdateInstanceSpec {
            resources_spec: Some(Resources {
                cores: 4,
                memory: 8 * GIB,
                core_fraction: 100,
            }),
            metadata: Some([("k".to_string(), "v".to_string())].into()),
            ..Default::default()
        };
        let op = backend.update_instance(&id, &mask, &spec).unwrap();
        backend.wait_operation(&op).unwrap();

        let instance = backend.get_instance(&id).unwrap();
        assert_eq!(instance.resources.cores, 4);
        // metadata was not in the mask
        assert!(instance.metadata.is_empty());
    }

    #[test]
    fn test_call_recording_order() {
        let backend = MockBackend::new();
        let op = backend.create_instance(&sample_spec("vm1")).unwrap();
        backend.wait_operation(&op).unwrap();
        let id = backend.instances()[0].id.clone();
        let op = backend.stop_instance(&id).unwrap();
        backend.wait_operation(&op).unwrap();
        let op = backend.start_instance(&id).unwrap();
        backend.wait_operation(&op).unwrap();

        let calls = backend.mutation_calls();
        assert_eq!(
            calls,
            vec![
                "create vm1".to_string(),
                format!("stop {id}"),
                format!("start {id}"),
            ]
        );
    }
}
