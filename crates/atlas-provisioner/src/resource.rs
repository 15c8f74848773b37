use atlas_core::BoxFuture;

use crate::addr::ResourceAddr;
use crate::error::ProvisionerError;

/// Result of a confirmed create or import.
pub struct ResourceResult {
    /// Encoded handle to persist.
    pub resource_id: String,
    /// The remote record as observed.
    pub properties: serde_json::Value,
}

/// A remote object whose lifecycle is bound to a persisted handle.
///
/// Implementations own the convergence: `create` returns only once the
/// object is confirmed to exist, `delete` only once it is confirmed gone.
/// Methods return boxed futures for dyn compatibility.
pub trait Resource: Send + Sync {
    /// The resource type identifier (e.g. "access_list_entry").
    fn resource_type(&self) -> &str;

    /// Name of this instance within its type, chosen by the configuration.
    fn resource_name(&self) -> &str;

    fn addr(&self) -> ResourceAddr {
        ResourceAddr::new(self.resource_type(), self.resource_name())
    }

    /// Create the remote object and wait until it is visible.
    fn create(&self) -> BoxFuture<'_, Result<ResourceResult, ProvisionerError>>;

    /// Re-read the object behind `resource_id`. `Ok(None)` means it no
    /// longer exists. `is_new` marks a read right after `create`, where
    /// "not found" only means "not visible yet".
    fn read<'a>(
        &'a self,
        resource_id: &'a str,
        is_new: bool,
    ) -> BoxFuture<'a, Result<Option<serde_json::Value>, ProvisionerError>>;

    /// Delete the object and wait until it is gone.
    fn delete<'a>(&'a self, resource_id: &'a str) -> BoxFuture<'a, Result<(), ProvisionerError>>;

    /// Adopt an existing object from a user-supplied import id.
    fn import<'a>(
        &'a self,
        import_id: &'a str,
    ) -> BoxFuture<'a, Result<ResourceResult, ProvisionerError>> {
        let resource_type = self.resource_type().to_string();
        Box::pin(async move {
            Err(ProvisionerError::ImportFailed(format!(
                "{resource_type} does not support import (id {import_id:?})"
            )))
        })
    }
}
