use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::addr::ResourceAddr;

/// Handle store, persisted as local JSON by
/// [`StatePersistence`](crate::persistence::StatePersistence).
///
/// Keyed by the rendered [`ResourceAddr`] (`type.name`) so the file stays a
/// plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvisionerState {
    pub resources: BTreeMap<String, ResourceState>,
}

impl ProvisionerState {
    pub fn get(&self, addr: &ResourceAddr) -> Option<&ResourceState> {
        self.resources.get(&addr.to_string())
    }

    pub fn insert(&mut self, state: ResourceState) {
        self.resources.insert(state.addr().to_string(), state);
    }

    pub fn remove(&mut self, addr: &ResourceAddr) -> Option<ResourceState> {
        self.resources.remove(&addr.to_string())
    }
}

/// State for a single managed resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub resource_type: String,
    pub resource_name: String,
    /// Encoded remote handle. Only ever set from a confirmed create or import.
    pub resource_id: String,
    pub status: ResourceStatus,
    /// Last remote record seen.
    pub properties: serde_json::Value,
    pub last_synced_at: jiff::Timestamp,
}

impl ResourceState {
    pub fn addr(&self) -> ResourceAddr {
        ResourceAddr::new(&self.resource_type, &self.resource_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Created,
    Imported,
    InSync,
}
