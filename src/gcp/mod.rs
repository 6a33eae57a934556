pub mod auth;

pub mod gcs;

pub mod gce;

pub mod types;

// Re-export common auth
pub use auth::{CredentialChain, CredentialError};
pub use types::Credential;
