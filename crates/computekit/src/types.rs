//! Core types for the compute provider API.
//!
//! Types mirror the provider's wire representation: sizes are bytes, field
//! names are camelCase on the wire, and int64 values may arrive as JSON
//! strings (the provider encodes them that way to avoid precision loss).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Serde helper for int64 fields that the provider encodes as JSON strings.
pub mod int64 {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        struct Int64Visitor;

        impl Visitor<'_> for Int64Visitor {
            type Value = i64;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an integer or a string containing an integer")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
                Ok(v)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
                i64::try_from(v).map_err(|_| E::custom("integer out of range"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(Int64Visitor)
    }
}

/// One gibibyte in bytes. The provider reports memory and disk sizes in
/// bytes; fleet manifests declare them in whole GiB.
pub const GIB: i64 = 1 << 30;

/// Lightweight instance reference returned by list calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRef {
    pub id: String,
    pub name: String,
}

/// Lifecycle status of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Provisioning,
    Running,
    Stopping,
    Stopped,
    Starting,
    Restarting,
    Deleting,
    Error,
    Crashed,
    #[serde(other)]
    Unspecified,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Restarting => "restarting",
            Self::Deleting => "deleting",
            Self::Error => "error",
            Self::Crashed => "crashed",
            Self::Unspecified => "unspecified",
        }
    }
}

/// Compute resources allocated to an instance, in provider-native units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    #[serde(with = "int64")]
    pub cores: i64,
    /// RAM in bytes
    #[serde(with = "int64")]
    pub memory: i64,
    #[serde(with = "int64", default)]
    pub core_fraction: i64,
}

/// A disk attached to an instance. Detailed disk parameters require a
/// separate `get_disk` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedDisk {
    pub disk_id: String,
    #[serde(default)]
    pub auto_delete: bool,
}

/// NAT binding on a primary address. Presence means NAT is enabled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneToOneNat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_version: Option<String>,
}

/// Primary IPv4 address of a network interface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryAddress {
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_to_one_nat: Option<OneToOneNat>,
}

/// A network interface as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub subnet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_v4_address: Option<PrimaryAddress>,
}

/// Scheduling policy of an instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingPolicy {
    #[serde(default)]
    pub preemptible: bool,
}

/// Full instance representation as read from the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,
    pub name: String,
    pub zone_id: String,
    #[serde(default)]
    pub platform_id: String,
    #[serde(default = "default_status")]
    pub status: InstanceStatus,
    pub resources: Resources,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boot_disk: Option<AttachedDisk>,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduling_policy: Option<SchedulingPolicy>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn default_status() -> InstanceStatus {
    InstanceStatus::Unspecified
}

/// Disk details resolved by a `get_disk` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskInfo {
    pub id: String,
    #[serde(default)]
    pub type_id: String,
    /// Disk size in bytes
    #[serde(with = "int64")]
    pub size: i64,
    #[serde(default)]
    pub source_image_id: String,
}

/// Disk parameters for a create request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_id: Option<String>,
    /// Disk size in bytes
    #[serde(with = "int64")]
    pub size: i64,
    pub image_id: String,
}

/// Boot disk attachment for a create request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootDiskSpec {
    pub auto_delete: bool,
    pub disk_spec: DiskSpec,
}

/// NAT request on a new network interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneToOneNatSpec {
    pub ip_version: String,
}

/// Primary address request on a new network interface.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryAddressSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_to_one_nat_spec: Option<OneToOneNatSpec>,
}

/// Network interface request for a create call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceSpec {
    pub subnet_id: String,
    pub primary_v4_address_spec: PrimaryAddressSpec,
}

/// Full specification for creating an instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceSpec {
    pub folder_id: String,
    pub name: String,
    pub zone_id: String,
    pub platform_id: String,
    pub resources_spec: Resources,
    pub boot_disk_spec: BootDiskSpec,
    pub network_interface_specs: Vec<NetworkInterfaceSpec>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub scheduling_policy: SchedulingPolicy,
}

/// Partial specification for a masked update. Only fields named in the
/// accompanying [`FieldMask`] are applied by the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInstanceSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources_spec: Option<Resources>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduling_policy: Option<SchedulingPolicy>,
}

/// The explicit set of top-level fields an update is permitted to modify.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMask {
    paths: Vec<String>,
}

impl FieldMask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path, keeping insertion order and skipping duplicates.
    pub fn push(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }
}

impl fmt::Display for FieldMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.paths.join(","))
    }
}

impl<S: Into<String>> FromIterator<S> for FieldMask {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut mask = Self::new();
        for path in iter {
            mask.push(path);
        }
        mask
    }
}

/// Kind of a long-running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Delete,
    Update,
    Stop,
    Start,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Update => "update",
            Self::Stop => "stop",
            Self::Start => "start",
        };
        f.write_str(s)
    }
}

/// Handle for a submitted long-running operation. The operation is not
/// complete until `wait_operation` reports a terminal result.
#[derive(Debug, Clone)]
pub struct Operation {
    pub id: String,
    pub kind: OperationKind,
}

impl Operation {
    pub fn new(id: impl Into<String>, kind: OperationKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}
