//! State normalizer: provider instance -> schema-shaped observed state.
//!
//! Converts provider-native units to specification units (bytes to whole
//! GiB, NAT presence to a bool) so desired and observed trees can be
//! compared structurally. Fields the provider representation does not
//! expose are omitted, not defaulted: omission must propagate into the
//! diff as "absent".

use crate::error::Result;
use computekit::{ComputeBackend, Instance, GIB};
use serde_json::{json, Map, Value};

/// Convert a live instance into the same nested-mapping shape as a desired
/// VM spec.
///
/// Boot-disk parameters are not inlined in the instance representation, so
/// this issues one synchronous `get_disk` read per instance; the read must
/// complete before normalization returns. Observed state is derived fresh
/// on every run and never cached.
pub fn normalize(
    instance: &Instance,
    backend: &dyn ComputeBackend,
) -> Result<Map<String, Value>> {
    let mut observed = Map::new();
    observed.insert("name".to_string(), json!(instance.name));
    observed.insert("zone".to_string(), json!(instance.zone_id));
    if !instance.platform_id.is_empty() {
        observed.insert("platform_id".to_string(), json!(instance.platform_id));
    }

    observed.insert(
        "resources_spec".to_string(),
        json!({
            "cores": instance.resources.cores,
            "memory": instance.resources.memory / GIB,
            "core_fraction": instance.resources.core_fraction,
        }),
    );

    if let Some(boot_disk) = &instance.boot_disk {
        let disk = backend.get_disk(&boot_disk.disk_id)?;
        observed.insert(
            "boot_disk_spec".to_string(),
            json!({
                "disk_spec": {
                    "type_id": disk.type_id,
                    "size": disk.size / GIB,
                    "image_id": disk.source_image_id,
                }
            }),
        );
    }

    if let Some(nic) = instance.network_interfaces.first() {
        let mut nic_spec = Map::new();
        nic_spec.insert("subnet_id".to_string(), json!(nic.subnet_id));
        if let Some(address) = &nic.primary_v4_address {
            nic_spec.insert(
                "primary_v4_address_spec".to_string(),
                json!({"nat": address.one_to_one_nat.is_some()}),
            );
        }
        observed.insert(
            "network_interface_specs".to_string(),
            Value::Object(nic_spec),
        );
    }

    if let Some(policy) = instance.scheduling_policy {
        observed.insert(
            "scheduling_policy".to_string(),
            json!({"preemptible": policy.preemptible}),
        );
    }

    if !instance.metadata.is_empty() {
        let metadata: Map<String, Value> = instance
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), json!(v)))
            .collect();
        observed.insert("metadata".to_string(), Value::Object(metadata));
    }

    Ok(observed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use computekit::{
        AttachedDisk, DiskInfo, InstanceStatus, MockBackend, NetworkInterface, OneToOneNat,
        PrimaryAddress, Resources, SchedulingPolicy,
    };

    fn sample_instance() -> Instance {
        Instance {
            id: "i-1".to_string(),
            name: "vm1".to_string(),
            zone_id: "ru-central1-a".to_string(),
            platform_id: "standard-v1".to_string(),
            status: InstanceStatus::Running,
            resources: Resources {
                cores: 2,
                memory: 4 * GIB,
                core_fraction: 100,
            },
            boot_disk: Some(AttachedDisk {
                disk_id: "d-1".to_string(),
                auto_delete: true,
            }),
            network_interfaces: vec![NetworkInterface {
                subnet_id: "sub-1".to_string(),
                primary_v4_address: Some(PrimaryAddress {
                    address: "10.0.0.2".to_string(),
                    one_to_one_nat: Some(OneToOneNat::default()),
                }),
            }],
            scheduling_policy: Some(SchedulingPolicy { preemptible: true }),
            metadata: [("ssh-keys".to_string(), "ubuntu:ssh-rsa AAAA".to_string())].into(),
        }
    }

    fn sample_disk() -> DiskInfo {
        DiskInfo {
            id: "d-1".to_string(),
            type_id: "network-hdd".to_string(),
            size: 10 * GIB,
            source_image_id: "img-1".to_string(),
        }
    }

    #[test]
    fn test_units_are_converted_to_spec_shape() {
        let backend = MockBackend::new();
        backend.seed_instance(sample_instance(), Some(sample_disk()));

        let observed = normalize(&sample_instance(), &backend).unwrap();
        assert_eq!(observed["resources_spec"]["memory"], json!(4));
        assert_eq!(observed["boot_disk_spec"]["disk_spec"]["size"], json!(10));
        assert_eq!(observed["boot_disk_spec"]["disk_spec"]["image_id"], json!("img-1"));
        assert_eq!(
            observed["network_interface_specs"]["primary_v4_address_spec"]["nat"],
            json!(true)
        );
        assert_eq!(observed["scheduling_policy"]["preemptible"], json!(true));
    }

    #[test]
    fn test_unreadable_fields_are_omitted_not_defaulted() {
        let backend = MockBackend::new();
        let mut instance = sample_instance();
        instance.boot_disk = None;
        instance.network_interfaces.clear();
        instance.scheduling_policy = None;
        instance.metadata.clear();

        let observed = normalize(&instance, &backend).unwrap();
        assert!(!observed.contains_key("boot_disk_spec"));
        assert!(!observed.contains_key("network_interface_specs"));
        assert!(!observed.contains_key("scheduling_policy"));
        assert!(!observed.contains_key("metadata"));
    }

    #[test]
    fn test_nat_absence_normalizes_to_false() {
        let backend = MockBackend::new();
        let mut instance = sample_instance();
        instance.boot_disk = None;
        instance.network_interfaces[0].primary_v4_address = Some(PrimaryAddress {
            address: "10.0.0.2".to_string(),
            one_to_one_nat: None,
        });

        let observed = normalize(&instance, &backend).unwrap();
        assert_eq!(
            observed["network_interface_specs"]["primary_v4_address_spec"]["nat"],
            json!(false)
        );
    }

    #[test]
    fn test_missing_disk_read_propagates_error() {
        let backend = MockBackend::new();
        // instance references a disk the backend does not know
        let err = normalize(&sample_instance(), &backend).unwrap_err();
        assert!(err.to_string().contains("disk"));
    }
}
