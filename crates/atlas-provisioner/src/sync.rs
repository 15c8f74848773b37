//! Binding between resources and the handle store.
//!
//! State is flushed after every change. A handle is written only after the
//! remote object was confirmed to exist and removed only after it was
//! confirmed gone, so a crash can at worst leave an orphaned remote object,
//! never a handle pointing at nothing we know about.

use crate::error::ProvisionerError;
use crate::persistence::StatePersistence;
use crate::resource::{Resource, ResourceResult};
use crate::state::{ProvisionerState, ResourceState, ResourceStatus};

/// Create the resource, persist its handle, then read it back as new.
pub async fn create(
    resource: &dyn Resource,
    state: &mut ProvisionerState,
    persistence: &StatePersistence,
) -> Result<ResourceState, ProvisionerError> {
    let addr = resource.addr();
    tracing::info!(addr = %addr, "creating resource");

    let result = resource.create().await?;
    let record = record(resource, result, ResourceStatus::Created);
    state.insert(record.clone());
    persistence.flush(state).await?;

    let observed = resource.read(&record.resource_id, true).await?;
    match observed {
        Some(properties) => {
            let synced = ResourceState {
                properties,
                last_synced_at: jiff::Timestamp::now(),
                ..record
            };
            state.insert(synced.clone());
            persistence.flush(state).await?;
            Ok(synced)
        }
        None => {
            state.remove(&addr);
            persistence.flush(state).await?;
            Err(ProvisionerError::ResourceNotFound {
                resource_type: addr.resource_type,
                resource_id: record.resource_id,
            })
        }
    }
}

/// Re-read a managed resource. Returns `Ok(None)` if it is not managed or
/// no longer exists; in the latter case its handle is dropped.
pub async fn refresh(
    resource: &dyn Resource,
    state: &mut ProvisionerState,
    persistence: &StatePersistence,
) -> Result<Option<ResourceState>, ProvisionerError> {
    let addr = resource.addr();
    let Some(current) = state.get(&addr).cloned() else {
        return Ok(None);
    };

    let observed = resource.read(&current.resource_id, false).await?;
    match observed {
        Some(properties) => {
            let synced = ResourceState {
                status: ResourceStatus::InSync,
                properties,
                last_synced_at: jiff::Timestamp::now(),
                ..current
            };
            state.insert(synced.clone());
            persistence.flush(state).await?;
            Ok(Some(synced))
        }
        None => {
            tracing::info!(addr = %addr, resource_id = %current.resource_id, "resource gone, dropping handle");
            state.remove(&addr);
            persistence.flush(state).await?;
            Ok(None)
        }
    }
}

/// Delete a managed resource and drop its handle. Returns `false` if the
/// resource was not managed.
pub async fn destroy(
    resource: &dyn Resource,
    state: &mut ProvisionerState,
    persistence: &StatePersistence,
) -> Result<bool, ProvisionerError> {
    let addr = resource.addr();
    let Some(current) = state.get(&addr).cloned() else {
        return Ok(false);
    };

    tracing::info!(addr = %addr, resource_id = %current.resource_id, "destroying resource");
    resource.delete(&current.resource_id).await?;
    state.remove(&addr);
    persistence.flush(state).await?;
    Ok(true)
}

/// Adopt an existing remote object under this resource's address.
pub async fn adopt(
    resource: &dyn Resource,
    import_id: &str,
    state: &mut ProvisionerState,
    persistence: &StatePersistence,
) -> Result<ResourceState, ProvisionerError> {
    let addr = resource.addr();
    if let Some(existing) = state.get(&addr) {
        return Err(ProvisionerError::State(format!(
            "{addr} is already managed (id {})",
            existing.resource_id
        )));
    }

    let result = resource.import(import_id).await?;
    let record = record(resource, result, ResourceStatus::Imported);
    tracing::info!(addr = %addr, resource_id = %record.resource_id, "resource imported");
    state.insert(record.clone());
    persistence.flush(state).await?;
    Ok(record)
}

fn record(resource: &dyn Resource, result: ResourceResult, status: ResourceStatus) -> ResourceState {
    ResourceState {
        resource_type: resource.resource_type().to_string(),
        resource_name: resource.resource_name().to_string(),
        resource_id: result.resource_id,
        status,
        properties: result.properties,
        last_synced_at: jiff::Timestamp::now(),
    }
}
