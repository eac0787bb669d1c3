//! REST backend for the compute provider API.
//!
//! Talks to the provider's public REST endpoints with bearer-token auth.
//! Mutating calls return an operation handle; [`RestBackend::wait_operation`]
//! polls the operation endpoint until the provider reports a terminal state.
//!
//! Transient transport failures (connection errors, HTTP 429/503) are
//! retried with backoff at this layer, mirroring the provider SDK's retry
//! policy. Nothing above this layer retries.

use crate::backend::ComputeBackend;
use crate::error::{Error, Result};
use crate::retry::{with_retry, RetryConfig};
use crate::types::{
    CreateInstanceSpec, DiskInfo, FieldMask, Instance, InstanceRef, Operation, OperationKind,
    UpdateInstanceSpec,
};
use serde::Deserialize;
use std::thread;
use std::time::{Duration, Instant};

/// Default compute API endpoint.
const DEFAULT_COMPUTE_BASE: &str = "https://compute.api.cloud.yandex.net/compute/v1";

/// Default operation API endpoint.
const DEFAULT_OPERATION_BASE: &str = "https://operation.api.cloud.yandex.net/operations";

/// Operation status as returned by the operation endpoint.
#[derive(Debug, Deserialize)]
struct OperationStatus {
    #[allow(dead_code)]
    id: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ListInstancesResponse {
    #[serde(default)]
    instances: Vec<InstanceRef>,
}

#[derive(Debug, Deserialize)]
struct SubmittedOperation {
    id: String,
}

/// Backend that executes real provider REST calls.
pub struct RestBackend {
    agent: ureq::Agent,
    compute_base: String,
    operation_base: String,
    token: String,
    retry: RetryConfig,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl RestBackend {
    /// Create a backend against the public API with the given IAM token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            compute_base: DEFAULT_COMPUTE_BASE.to_string(),
            operation_base: DEFAULT_OPERATION_BASE.to_string(),
            token: token.into(),
            retry: RetryConfig::default(),
            poll_interval: Duration::from_secs(2),
            wait_timeout: Duration::from_secs(600),
        }
    }

    /// Override the API endpoints (for testing against a local server).
    pub fn with_base_urls(
        mut self,
        compute_base: impl Into<String>,
        operation_base: impl Into<String>,
    ) -> Self {
        self.compute_base = compute_base.into();
        self.operation_base = operation_base.into();
        self
    }

    /// Override the operation poll interval and wait timeout.
    pub fn with_wait_config(mut self, poll_interval: Duration, wait_timeout: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.wait_timeout = wait_timeout;
        self
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        with_retry(&self.retry, || {
            let mut response = self
                .agent
                .get(url)
                .header("Authorization", &self.auth_header())
                .call()?;
            Ok(response.body_mut().read_json()?)
        })
    }

    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<SubmittedOperation> {
        with_retry(&self.retry, || {
            let mut response = self
                .agent
                .post(url)
                .header("Authorization", &self.auth_header())
                .send_json(body)?;
            Ok(response.body_mut().read_json()?)
        })
    }

    fn post_empty(&self, url: &str) -> Result<SubmittedOperation> {
        with_retry(&self.retry, || {
            let mut response = self
                .agent
                .post(url)
                .header("Authorization", &self.auth_header())
                .send_empty()?;
            Ok(response.body_mut().read_json()?)
        })
    }
}

impl ComputeBackend for RestBackend {
    fn list_instances(&self, folder_id: &str) -> Result<Vec<InstanceRef>> {
        let url = format!(
            "{}/instances?folderId={}&pageSize=1000",
            self.compute_base, folder_id
        );
        let response: ListInstancesResponse = self.get_json(&url)?;
        Ok(response.instances)
    }

    fn get_instance(&self, instance_id: &str) -> Result<Instance> {
        let url = format!("{}/instances/{}?view=FULL", self.compute_base, instance_id);
        self.get_json(&url)
    }

    fn get_disk(&self, disk_id: &str) -> Result<DiskInfo> {
        let url = format!("{}/disks/{}", self.compute_base, disk_id);
        self.get_json(&url)
    }

    fn create_instance(&self, spec: &CreateInstanceSpec) -> Result<Operation> {
        let url = format!("{}/instances", self.compute_base);
        let body = serde_json::to_value(spec)?;
        let submitted = self.post_json(&url, &body)?;
        log::debug!("submitted create operation {} for {}", submitted.id, spec.name);
        Ok(Operation::new(submitted.id, OperationKind::Create))
    }

    fn delete_instance(&self, instance_id: &str) -> Result<Operation> {
        let url = format!("{}/instances/{}", self.compute_base, instance_id);
        let submitted = with_retry(&self.retry, || {
            let mut response = self
                .agent
                .delete(&url)
                .header("Authorization", &self.auth_header())
                .call()?;
            Ok::<SubmittedOperation, Error>(response.body_mut().read_json()?)
        })?;
        Ok(Operation::new(submitted.id, OperationKind::Delete))
    }

    fn update_instance(
        &self,
        instance_id: &str,
        mask: &FieldMask,
        spec: &UpdateInstanceSpec,
    ) -> Result<Operation> {
        let url = format!("{}/instances/{}", self.compute_base, instance_id);
        let mut body = serde_json::to_value(spec)?;
        match body.as_object_mut() {
            Some(object) => {
                object.insert(
                    "updateMask".to_string(),
                    serde_json::Value::String(mask.to_string()),
                );
            }
            None => {
                return Err(Error::InvalidRequest {
                    message: "update spec did not serialize to an object".to_string(),
                });
            }
        }

        let submitted = with_retry(&self.retry, || {
            let mut response = self
                .agent
                .patch(&url)
                .header("Authorization", &self.auth_header())
                .send_json(&body)?;
            Ok::<SubmittedOperation, Error>(response.body_mut().read_json()?)
        })?;
        Ok(Operation::new(submitted.id, OperationKind::Update))
    }

    fn stop_instance(&self, instance_id: &str) -> Result<Operation> {
        let url = format!("{}/instances/{}:stop", self.compute_base, instance_id);
        let submitted = self.post_empty(&url)?;
        Ok(Operation::new(submitted.id, OperationKind::Stop))
    }

    fn start_instance(&self, instance_id: &str) -> Result<Operation> {
        let url = format!("{}/instances/{}:start", self.compute_base, instance_id);
        let submitted = self.post_empty(&url)?;
        Ok(Operation::new(submitted.id, OperationKind::Start))
    }

    fn wait_operation(&self, operation: &Operation) -> Result<()> {
        let url = format!("{}/{}", self.operation_base, operation.id);
        let deadline = Instant::now() + self.wait_timeout;

        loop {
            let status: OperationStatus = self.get_json(&url)?;
            if status.done {
                return match status.error {
                    None => Ok(()),
                    Some(err) => Err(Error::OperationFailed {
                        kind: operation.kind,
                        message: format!("{} (code {})", err.message, err.code),
                    }),
                };
            }

            if Instant::now() >= deadline {
                return Err(Error::OperationTimeout {
                    kind: operation.kind,
                    id: operation.id.clone(),
                });
            }

            thread::sleep(self.poll_interval);
        }
    }
}
