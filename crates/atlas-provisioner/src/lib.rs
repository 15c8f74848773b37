//! atlas-provisioner
//!
//! Convergence engine for MongoDB Atlas project IP access list entries and
//! cloud backup restore jobs. The remote API is eventually consistent, so
//! every write is followed by polling until the change is observed, a
//! permanent error is reported, or a deadline passes.
//!
//! Public API:
//! - `AccessListEngine`: create, delete, reconcile and import entries
//! - `RestoreJobEngine`: start, cancel, reconcile and list restore jobs
//! - `sync`: bind a `Resource` to a persisted handle (create/refresh/destroy/adopt)
//! - `provision()`: create or refresh every resource
//! - `destroy()`: tear down all managed resources

pub mod access_list;
pub mod addr;
pub mod classify;
pub mod clock;
pub mod config;
pub mod convergence;
pub mod error;
pub mod persistence;
pub mod reconcile;
pub mod resource;
pub mod resources;
pub mod restore_job;
pub mod scan;
pub mod state;
pub mod sync;

pub use crate::access_list::{AccessListEngine, ManagedEntry};
pub use crate::addr::ResourceAddr;
pub use crate::classify::{classify, ErrorCategory};
pub use crate::clock::{Clock, TokioClock};
pub use crate::config::{load_config, save_config, ConvergenceConfig};
pub use crate::convergence::{ConvergenceOutcome, ConvergenceState, WaitPolicy};
pub use crate::error::{format_err_chain, ProvisionerError};
pub use crate::persistence::StatePersistence;
pub use crate::resource::{Resource, ResourceResult};
pub use crate::resources::{AccessListResource, RestoreJobResource};
pub use crate::restore_job::{ManagedRestoreJob, RestoreJobEngine};
pub use crate::state::{ProvisionerState, ResourceState, ResourceStatus};

/// Bring every resource to its desired state: refresh what is managed,
/// create what is not (or no longer) there.
pub async fn provision(
    persistence: &StatePersistence,
    resources: &[Box<dyn Resource>],
) -> Result<ProvisionerState, ProvisionerError> {
    let mut state = persistence.load().await?;

    for resource in resources {
        let resource = resource.as_ref();
        if sync::refresh(resource, &mut state, persistence).await?.is_none() {
            sync::create(resource, &mut state, persistence).await?;
        }
    }

    tracing::info!(managed = state.resources.len(), "provisioning complete");
    Ok(state)
}

/// Destroy all managed resources in reverse order.
pub async fn destroy(
    persistence: &StatePersistence,
    resources: &[Box<dyn Resource>],
) -> Result<(), ProvisionerError> {
    let mut state = persistence.load().await?;

    for resource in resources.iter().rev() {
        sync::destroy(resource.as_ref(), &mut state, persistence).await?;
    }

    Ok(())
}
