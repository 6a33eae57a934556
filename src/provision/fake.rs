//! Scripted in-memory [`ComputeApi`] for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::gcp::gce::{
    Address, AddressAggregatedList, AddressesScopedList, ApiError, ComputeApi, Disk, Instance,
    InstanceRequest, Operation, OperationErrorItem, OperationErrors,
};
use crate::provision::poller::Sleeper;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CallCounts {
    pub list_disks: usize,
    pub aggregated_addresses: usize,
    pub insert_instance: usize,
    pub get_zone_operation: usize,
    pub get_instance: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.list_disks
            + self.aggregated_addresses
            + self.insert_instance
            + self.get_zone_operation
            + self.get_instance
    }
}

#[derive(Default)]
pub struct FakeCompute {
    disks: Vec<Disk>,
    addresses: AddressAggregatedList,
    fail_disks: bool,
    fail_addresses: bool,
    fail_insert: bool,
    operations: Mutex<VecDeque<Operation>>,
    inserted: Mutex<Vec<InstanceRequest>>,
    calls: Mutex<CallCounts>,
}

pub fn op(name: &str, status: &str) -> Operation {
    Operation {
        name: name.to_string(),
        status: status.to_string().into(),
        operation_type: Some("insert".to_string()),
        target_link: None,
        progress: None,
        error: None,
    }
}

pub fn op_failed(name: &str, codes: &[&str]) -> Operation {
    Operation {
        error: Some(OperationErrors {
            errors: codes
                .iter()
                .map(|c| OperationErrorItem {
                    code: c.to_string(),
                    location: None,
                    message: format!("{} happened", c),
                })
                .collect(),
        }),
        ..op(name, "DONE")
    }
}

fn server_error(endpoint: &'static str) -> ApiError {
    ApiError::Api {
        endpoint,
        status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
        body: "backend error".to_string(),
    }
}

impl FakeCompute {
    pub fn with_disks(mut self, disks: Vec<Disk>) -> Self {
        self.disks = disks;
        self
    }

    pub fn with_addresses(mut self, scope: &str, addresses: Vec<Address>) -> Self {
        self.addresses
            .items
            .insert(scope.to_string(), AddressesScopedList { addresses });
        self
    }

    /// Snapshots returned, in order, by successive operation fetches.
    pub fn with_operations(self, ops: Vec<Operation>) -> Self {
        *self.operations.lock().unwrap() = ops.into();
        self
    }

    pub fn failing_disk_list(mut self) -> Self {
        self.fail_disks = true;
        self
    }

    pub fn failing_address_list(mut self) -> Self {
        self.fail_addresses = true;
        self
    }

    pub fn failing_insert(mut self) -> Self {
        self.fail_insert = true;
        self
    }

    pub fn calls(&self) -> CallCounts {
        self.calls.lock().unwrap().clone()
    }

    pub fn inserted(&self) -> Vec<InstanceRequest> {
        self.inserted.lock().unwrap().clone()
    }

    fn count(&self, f: impl FnOnce(&mut CallCounts)) {
        f(&mut self.calls.lock().unwrap());
    }
}

#[async_trait]
impl ComputeApi for FakeCompute {
    async fn list_disks(&self, _project: &str, _zone: &str) -> Result<Vec<Disk>, ApiError> {
        self.count(|c| c.list_disks += 1);
        if self.fail_disks {
            return Err(server_error("disks.list"));
        }
        Ok(self.disks.clone())
    }

    async fn aggregated_addresses(
        &self,
        _project: &str,
    ) -> Result<AddressAggregatedList, ApiError> {
        self.count(|c| c.aggregated_addresses += 1);
        if self.fail_addresses {
            return Err(server_error("addresses.aggregatedList"));
        }
        Ok(self.addresses.clone())
    }

    async fn insert_instance(
        &self,
        _project: &str,
        _zone: &str,
        instance: &InstanceRequest,
    ) -> Result<Operation, ApiError> {
        self.count(|c| c.insert_instance += 1);
        if self.fail_insert {
            return Err(ApiError::Api {
                endpoint: "instances.insert",
                status: reqwest::StatusCode::CONFLICT,
                body: "already exists".to_string(),
            });
        }
        self.inserted.lock().unwrap().push(instance.clone());
        Ok(op("op-1", "PENDING"))
    }

    async fn get_zone_operation(
        &self,
        _project: &str,
        _zone: &str,
        _operation: &str,
    ) -> Result<Operation, ApiError> {
        self.count(|c| c.get_zone_operation += 1);
        self.operations
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| server_error("zoneOperations.get"))
    }

    async fn get_instance(
        &self,
        _project: &str,
        _zone: &str,
        instance: &str,
    ) -> Result<Instance, ApiError> {
        self.count(|c| c.get_instance += 1);
        Ok(Instance {
            name: instance.to_string(),
            status: Some("RUNNING".to_string()),
            ..Default::default()
        })
    }
}

/// Records requested sleeps instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn total(&self) -> Duration {
        self.slept.lock().unwrap().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, d: Duration) {
        self.slept.lock().unwrap().push(d);
    }
}
