use std::path::PathBuf;
use std::time::Duration;

use crate::gcp::auth::CredentialError;
use crate::gcp::gce::{ApiError, OperationErrorItem};

/// Every way a provisioning run can fail. All of them end the run.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("acquiring credential: {0}")]
    Credential(#[from] CredentialError),

    #[error("{call} failed: {source}")]
    Resolution {
        call: &'static str,
        #[source]
        source: ApiError,
    },

    #[error("cloud config length of {size} bytes is over {limit} byte limit")]
    ConfigTooLarge { size: usize, limit: usize },

    #[error("failed to create instance {instance}: {source}")]
    Submission {
        instance: String,
        #[source]
        source: ApiError,
    },

    #[error("failed to get operation {operation}: {source}")]
    OperationFetch {
        operation: String,
        #[source]
        source: ApiError,
    },

    #[error("operation {operation} failed with {} error(s): {}", .errors.len(), join_errors(.errors))]
    Operation {
        operation: String,
        errors: Vec<OperationErrorItem>,
    },

    #[error("unknown status {status:?} for operation {operation}")]
    UnknownOperationState { operation: String, status: String },

    #[error("operation {operation} not done after {waited:?}")]
    OperationTimeout { operation: String, waited: Duration },

    #[error("error getting instance {instance} after creation: {source}")]
    InstanceFetch {
        instance: String,
        #[source]
        source: ApiError,
    },

    #[error("invalid --{flag}: {reason}")]
    InvalidFlag { flag: &'static str, reason: String },

    #[error("error reading {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn join_errors(errors: &[OperationErrorItem]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_error_lists_every_sub_error() {
        let err = ProvisionError::Operation {
            operation: "op-9".to_string(),
            errors: vec![
                OperationErrorItem {
                    code: "A".to_string(),
                    ..Default::default()
                },
                OperationErrorItem {
                    code: "B".to_string(),
                    message: "boom".to_string(),
                    ..Default::default()
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "operation op-9 failed with 2 error(s): A; B: boom"
        );
    }

    #[test]
    fn config_too_large_reports_sizes() {
        let err = ProvisionError::ConfigTooLarge {
            size: 40000,
            limit: 32768,
        };
        assert_eq!(
            err.to_string(),
            "cloud config length of 40000 bytes is over 32768 byte limit"
        );
    }
}
