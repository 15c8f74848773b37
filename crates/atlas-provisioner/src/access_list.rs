//! Convergence engine for project IP access list entries.
//!
//! Access list writes are accepted long before they are visible: a created
//! entry can be missing from listings for minutes, and a deleted one can
//! still be returned by a direct Get. Each operation here drives one such
//! write to a confirmed remote state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use atlas_core::{AccessListApi, AccessListEntry, CompositeId, DesiredEntry, EntryKey};

use crate::classify::{classify, ErrorCategory};
use crate::clock::{Clock, TokioClock};
use crate::config::ConvergenceConfig;
use crate::convergence::{converge, log_outcome, ConvergenceOutcome, Step};
use crate::error::ProvisionerError;
use crate::reconcile::read_step;
use crate::scan::{self, ScanContext};

const LABEL: &str = "access list entry";

/// An entry confirmed on the remote side, with the handle that addresses it.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedEntry {
    pub id: CompositeId,
    pub project_id: String,
    pub key: EntryKey,
    pub record: AccessListEntry,
}

pub struct AccessListEngine {
    api: Arc<dyn AccessListApi>,
    clock: Arc<dyn Clock>,
    config: ConvergenceConfig,
}

impl AccessListEngine {
    pub fn new(api: Arc<dyn AccessListApi>, config: ConvergenceConfig) -> Self {
        Self {
            api,
            clock: Arc::new(TokioClock),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ConvergenceConfig {
        &self.config
    }

    /// Create `desired` in `project_id` and wait until a listing shows it.
    ///
    /// The create call is re-issued on every pass. `timeout` overrides the
    /// configured create budget.
    pub async fn create_and_converge(
        &self,
        project_id: &str,
        desired: &DesiredEntry,
        timeout: Option<Duration>,
    ) -> ConvergenceOutcome<ManagedEntry> {
        let key = match desired.validate() {
            Ok(key) => key,
            Err(e) => {
                return ConvergenceOutcome::Failed {
                    error: e.into(),
                    attempts: 0,
                };
            }
        };

        let policy = &self.config.create;
        let deadline = self.deadline(timeout.unwrap_or(policy.timeout));
        tracing::info!(project_id, key = %key, "creating access list entry");

        let key_ref = &key;
        let outcome = converge(self.clock.as_ref(), policy, deadline, move |attempt| {
            self.create_pass(project_id, desired, key_ref, deadline, attempt)
        })
        .await;

        log_outcome("create", project_id, key.as_str(), &outcome);
        outcome.map(|record| ManagedEntry {
            id: CompositeId::encode(project_id, key.as_str()),
            project_id: project_id.to_string(),
            key,
            record,
        })
    }

    async fn create_pass(
        &self,
        project_id: &str,
        desired: &DesiredEntry,
        key: &EntryKey,
        deadline: Instant,
        attempt: u32,
    ) -> Step<AccessListEntry> {
        let resource = format!("{project_id}/{key}");
        match self.api.create(project_id, desired).await {
            Ok(_) => tracing::debug!(project_id, key = %key, attempt, "create accepted"),
            Err(e) if classify(&e).is_transient() => {
                // The call may still have been applied; look before retrying.
                tracing::warn!(project_id, key = %key, attempt, error = %e, "transient create failure");
            }
            Err(e) => {
                return Step::Failed(
                    ProvisionerError::CreateFailed(e.to_string()).with_resource(LABEL, &resource),
                );
            }
        }

        match self.scan(project_id, key, deadline).await {
            ConvergenceOutcome::Converged {
                value: Some(record),
                ..
            } => Step::Ready(record),
            ConvergenceOutcome::Converged { value: None, .. } => {
                Step::Pending(format!("{key} not yet visible in the access list"))
            }
            ConvergenceOutcome::Failed { error, .. } => Step::Failed(
                ProvisionerError::CreateFailed(error.to_string()).with_resource(LABEL, &resource),
            ),
            ConvergenceOutcome::DeadlineExceeded { last_pending, .. } => Step::Pending(format!(
                "existence scan incomplete: {}",
                last_pending.unwrap_or_default()
            )),
        }
    }

    /// Walk the project's access list for `key`.
    ///
    /// Bounded by the scan policy and never runs past `deadline`.
    pub async fn scan(
        &self,
        project_id: &str,
        key: &EntryKey,
        deadline: Instant,
    ) -> ConvergenceOutcome<Option<AccessListEntry>> {
        let policy = &self.config.scan;
        let target = format!("project {project_id}");
        let ctx = ScanContext {
            clock: self.clock.as_ref(),
            policy,
            page_delay: self.config.page_delay,
            deadline: deadline.min(self.deadline(policy.timeout)),
            target: &target,
        };
        scan::find_first(
            &ctx,
            |page_num| self.api.list(project_id, page_num),
            |entry| key.matches(entry),
        )
        .await
    }

    /// Delete the entry behind `id` and wait until a direct Get no longer
    /// returns it.
    pub async fn delete_and_converge(
        &self,
        id: &CompositeId,
        timeout: Option<Duration>,
    ) -> ConvergenceOutcome<()> {
        let (project_id, entry) = match id.decode() {
            Ok(parts) => parts,
            Err(e) => {
                return ConvergenceOutcome::Failed {
                    error: e.into(),
                    attempts: 0,
                };
            }
        };

        let policy = &self.config.delete;
        let deadline = self.deadline(timeout.unwrap_or(policy.timeout));
        tracing::info!(project_id = %project_id, entry = %entry, "deleting access list entry");

        let (project_ref, entry_ref) = (project_id.as_str(), entry.as_str());
        let outcome = converge(self.clock.as_ref(), policy, deadline, move |attempt| {
            self.delete_pass(project_ref, entry_ref, attempt)
        })
        .await;

        log_outcome("delete", &project_id, &entry, &outcome);
        outcome
    }

    async fn delete_pass(&self, project_id: &str, entry: &str, attempt: u32) -> Step<()> {
        let resource = format!("{project_id}/{entry}");
        if let Err(e) = self.api.delete(project_id, entry).await {
            match classify(&e) {
                ErrorCategory::Transient => {
                    tracing::warn!(project_id, entry, attempt, error = %e, "transient delete failure");
                    return Step::Pending(format!("delete: {e}"));
                }
                // Already gone, possibly by an earlier pass. Confirm below.
                ErrorCategory::NotFoundExisting => {
                    tracing::debug!(project_id, entry, attempt, "delete reported entry absent");
                }
                ErrorCategory::PermanentFailure => {
                    return Step::Failed(
                        ProvisionerError::DeleteFailed(e.to_string())
                            .with_resource(LABEL, &resource),
                    );
                }
            }
        }

        match self.api.get(project_id, entry).await {
            Ok(None) => Step::Ready(()),
            Ok(Some(_)) => Step::Pending(format!("{entry} still present after delete")),
            Err(e) if classify(&e) == ErrorCategory::NotFoundExisting => Step::Ready(()),
            Err(e) => {
                tracing::warn!(project_id, entry, attempt, error = %e, "get after delete failed");
                Step::Pending(format!("get after delete: {e}"))
            }
        }
    }

    /// Re-read the entry behind `id`.
    ///
    /// `Ok(None)` means the entry is gone and the handle should be dropped.
    /// A freshly created entry that is not yet visible is retried instead.
    /// An undecodable handle is also reported as gone, with a warning.
    /// `timeout` overrides the read policy's budget.
    pub async fn reconcile(
        &self,
        id: &CompositeId,
        is_new: bool,
        timeout: Option<Duration>,
    ) -> Result<Option<AccessListEntry>, ProvisionerError> {
        let (project_id, entry) = match id.decode() {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "dropping undecodable access list handle");
                return Ok(None);
            }
        };

        let policy = &self.config.read;
        let deadline = self.deadline(timeout.unwrap_or(policy.timeout));
        let (project_ref, entry_ref) = (project_id.as_str(), entry.as_str());
        let outcome = converge(self.clock.as_ref(), policy, deadline, move |attempt| {
            self.read_pass(project_ref, entry_ref, is_new, attempt)
        })
        .await;

        let record = outcome.into_result("read", &project_id, &entry)?;
        if record.is_none() {
            tracing::info!(project_id = %project_id, entry = %entry, "access list entry no longer exists");
        }
        Ok(record)
    }

    async fn read_pass(
        &self,
        project_id: &str,
        entry: &str,
        is_new: bool,
        attempt: u32,
    ) -> Step<Option<AccessListEntry>> {
        let resource = format!("{project_id}/{entry}");
        let result = self.api.get(project_id, entry).await;
        read_step(result, is_new, &resource, attempt).map_err(|e| e.with_resource(LABEL, &resource))
    }

    /// Adopt an existing entry from the `{project_id}-{entry}` import form.
    pub async fn import(&self, raw: &str) -> Result<ManagedEntry, ProvisionerError> {
        let (project_id, entry) = CompositeId::parse_import(raw)?;
        let fail = |detail: String| {
            ProvisionerError::ImportFailed(format!(
                "couldn't import entry {entry} in project {project_id}: {detail}"
            ))
        };

        let record = match self.api.get(&project_id, &entry).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(fail("not found".into())),
            Err(e) => return Err(fail(e.to_string())),
        };

        tracing::info!(project_id = %project_id, entry = %entry, "imported access list entry");
        Ok(ManagedEntry {
            id: CompositeId::encode(&project_id, &entry),
            key: EntryKey::new(entry.as_str()),
            project_id,
            record,
        })
    }

    fn deadline(&self, timeout: Duration) -> Instant {
        self.clock.now() + timeout
    }
}
