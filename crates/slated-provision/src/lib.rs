//! # slated-provision
//!
//! Boot-time provisioning for the Slated service.
//!
//! On startup the supervisor idempotently reconciles the remote agent
//! definitions and the seed vector store, then fires a one-shot readiness
//! latch. The pipeline waits on the latch and reads the published
//! [`ProvisionContext`]; partial provisioning degrades the pipeline rather
//! than blocking it.

mod context;
pub mod definitions;
mod state_store;
mod supervisor;

pub use context::{provision_channel, ProvisionContext, ProvisionHandle, ProvisionPublisher};
pub use state_store::{LocalStateStore, StateStore, VECTOR_STORE_KEY};
pub use supervisor::{provision, ProvisionSettings};
