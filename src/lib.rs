//! # buildfarm
//!
//! Operator tooling for the build farm.
//!
//! - [`provision`] creates the coordinator VM on Compute Engine: it re-attaches
//!   or creates the boot disk, picks the external IP, submits the instance and
//!   waits on the resulting operation.
//! - [`release`] publishes release artifacts to the downloads bucket and
//!   registers them on the downloads page.
//!
//! Both sit on the thin Google Cloud clients in [`gcp`].

pub mod client;
pub mod config;
pub mod error;
pub mod gcp;
pub mod provision;
pub mod release;

pub use config::{Mode, ProvisionConfig};
pub use error::ProvisionError;
