//! # computekit
//!
//! Client library for a cloud compute provider: instances, disks and
//! long-running operations.
//!
//! ## Core Concepts
//!
//! - **Instance**: a virtual machine as the provider reports it
//! - **Operation**: a handle for a submitted long-running operation; every
//!   mutating call is submit-then-wait, never fire-and-forget
//! - **ComputeBackend**: the trait boundary between callers and the
//!   provider transport (REST implementation, in-memory mock for tests)
//!
//! Transient transport failures are retried inside the backend with
//! exponential backoff; semantic operation failures are never retried here.

pub mod backend;
pub mod error;
pub mod retry;
pub mod types;

// Re-export main types at crate root
pub use backend::{mock::MockBackend, rest::RestBackend, ComputeBackend};
pub use error::{Error, ErrorCategory, Result};
pub use retry::{with_retry, RetryConfig};
pub use types::{
    AttachedDisk, BootDiskSpec, CreateInstanceSpec, DiskInfo, DiskSpec, FieldMask, Instance,
    InstanceRef, InstanceStatus, NetworkInterface, NetworkInterfaceSpec, OneToOneNat,
    OneToOneNatSpec, Operation, OperationKind, PrimaryAddress, PrimaryAddressSpec, Resources,
    SchedulingPolicy, UpdateInstanceSpec, GIB,
};
