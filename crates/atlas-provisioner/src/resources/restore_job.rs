use std::sync::Arc;

use atlas_core::{BoxFuture, RestoreJobId, RestoreJobRequest};

use crate::error::ProvisionerError;
use crate::resource::{Resource, ResourceResult};
use crate::restore_job::RestoreJobEngine;

/// A cloud backup restore job started from a snapshot of one cluster.
///
/// Restore jobs are not importable: their ids are server-assigned and the
/// job itself is short-lived.
pub struct RestoreJobResource {
    engine: Arc<RestoreJobEngine>,
    name: String,
    project_id: String,
    cluster_name: String,
    request: RestoreJobRequest,
}

impl RestoreJobResource {
    pub fn new(
        engine: Arc<RestoreJobEngine>,
        name: impl Into<String>,
        project_id: impl Into<String>,
        cluster_name: impl Into<String>,
        request: RestoreJobRequest,
    ) -> Self {
        Self {
            engine,
            name: name.into(),
            project_id: project_id.into(),
            cluster_name: cluster_name.into(),
            request,
        }
    }
}

impl Resource for RestoreJobResource {
    fn resource_type(&self) -> &str {
        "cloud_backup_restore_job"
    }

    fn resource_name(&self) -> &str {
        &self.name
    }

    fn create(&self) -> BoxFuture<'_, Result<ResourceResult, ProvisionerError>> {
        Box::pin(async {
            let scope = format!("{}/{}", self.project_id, self.cluster_name);
            let managed = self
                .engine
                .create_and_converge(&self.project_id, &self.cluster_name, &self.request, None)
                .await
                .into_result("create", &scope, &self.request.snapshot_id)?;

            Ok(ResourceResult {
                resource_id: managed.id.to_string(),
                properties: serde_json::to_value(&managed.job)?,
            })
        })
    }

    fn read<'a>(
        &'a self,
        resource_id: &'a str,
        is_new: bool,
    ) -> BoxFuture<'a, Result<Option<serde_json::Value>, ProvisionerError>> {
        Box::pin(async move {
            let id = RestoreJobId::from_raw(resource_id);
            match self.engine.reconcile(&id, is_new, None).await? {
                Some(job) => Ok(Some(serde_json::to_value(&job)?)),
                None => Ok(None),
            }
        })
    }

    fn delete<'a>(&'a self, resource_id: &'a str) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            let id = RestoreJobId::from_raw(resource_id);
            let addr = id.decode()?;
            let scope = format!("{}/{}", addr.project_id, addr.cluster_name);
            self.engine
                .delete_and_converge(&id, None)
                .await
                .into_result("delete", &scope, &addr.job_id)
        })
    }
}
