use std::sync::Arc;

use atlas_core::{BoxFuture, CompositeId, DesiredEntry};

use crate::access_list::AccessListEngine;
use crate::error::ProvisionerError;
use crate::resource::{Resource, ResourceResult};

/// One desired entry in a project's IP access list.
pub struct AccessListResource {
    engine: Arc<AccessListEngine>,
    name: String,
    project_id: String,
    desired: DesiredEntry,
}

impl AccessListResource {
    pub fn new(
        engine: Arc<AccessListEngine>,
        name: impl Into<String>,
        project_id: impl Into<String>,
        desired: DesiredEntry,
    ) -> Self {
        Self {
            engine,
            name: name.into(),
            project_id: project_id.into(),
            desired,
        }
    }
}

impl Resource for AccessListResource {
    fn resource_type(&self) -> &str {
        "access_list_entry"
    }

    fn resource_name(&self) -> &str {
        &self.name
    }

    fn create(&self) -> BoxFuture<'_, Result<ResourceResult, ProvisionerError>> {
        Box::pin(async {
            let key = self.desired.validate()?;
            let entry = self
                .engine
                .create_and_converge(&self.project_id, &self.desired, None)
                .await
                .into_result("create", &self.project_id, key.as_str())?;

            Ok(ResourceResult {
                resource_id: entry.id.to_string(),
                properties: serde_json::to_value(&entry.record)?,
            })
        })
    }

    fn read<'a>(
        &'a self,
        resource_id: &'a str,
        is_new: bool,
    ) -> BoxFuture<'a, Result<Option<serde_json::Value>, ProvisionerError>> {
        Box::pin(async move {
            let id = CompositeId::from_raw(resource_id);
            match self.engine.reconcile(&id, is_new, None).await? {
                Some(record) => Ok(Some(serde_json::to_value(&record)?)),
                None => Ok(None),
            }
        })
    }

    fn delete<'a>(&'a self, resource_id: &'a str) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            let id = CompositeId::from_raw(resource_id);
            let (project_id, entry) = id.decode()?;
            self.engine
                .delete_and_converge(&id, None)
                .await
                .into_result("delete", &project_id, &entry)
        })
    }

    fn import<'a>(
        &'a self,
        import_id: &'a str,
    ) -> BoxFuture<'a, Result<ResourceResult, ProvisionerError>> {
        Box::pin(async move {
            let entry = self.engine.import(import_id).await?;
            Ok(ResourceResult {
                resource_id: entry.id.to_string(),
                properties: serde_json::to_value(&entry.record)?,
            })
        })
    }
}
