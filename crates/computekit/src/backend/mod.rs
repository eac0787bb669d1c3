//! Backend abstraction for compute provider operations.
//!
//! The [`ComputeBackend`] trait defines the interface for talking to the
//! provider, allowing for different implementations (REST API, in-memory
//! mock for testing).
//!
//! Mutating calls follow the provider's long-running-operation model: the
//! call submits the operation and returns an [`Operation`] handle; the
//! caller must then block on [`ComputeBackend::wait_operation`] until the
//! provider reports a terminal result. There is no fire-and-forget path.

pub mod mock;
pub mod rest;

use crate::error::Result;
use crate::types::{
    CreateInstanceSpec, DiskInfo, FieldMask, Instance, InstanceRef, Operation,
    UpdateInstanceSpec,
};

/// Backend trait for compute provider operations.
pub trait ComputeBackend: Send + Sync {
    /// List instance references in a folder.
    fn list_instances(&self, folder_id: &str) -> Result<Vec<InstanceRef>>;

    /// Fetch the full representation of an instance.
    fn get_instance(&self, instance_id: &str) -> Result<Instance>;

    /// Fetch disk details (boot disks are not inlined in the instance).
    fn get_disk(&self, disk_id: &str) -> Result<DiskInfo>;

    /// Submit an instance create operation.
    fn create_instance(&self, spec: &CreateInstanceSpec) -> Result<Operation>;

    /// Submit an instance delete operation.
    fn delete_instance(&self, instance_id: &str) -> Result<Operation>;

    /// Submit a masked update. Only fields named in `mask` are modified.
    fn update_instance(
        &self,
        instance_id: &str,
        mask: &FieldMask,
        spec: &UpdateInstanceSpec,
    ) -> Result<Operation>;

    /// Submit an instance stop operation.
    fn stop_instance(&self, instance_id: &str) -> Result<Operation>;

    /// Submit an instance start operation.
    fn start_instance(&self, instance_id: &str) -> Result<Operation>;

    /// Block until the operation reaches a terminal state. Returns `Ok(())`
    /// on success and the provider-reported failure otherwise.
    fn wait_operation(&self, operation: &Operation) -> Result<()>;
}
