//! Convergence engine for cloud backup restore jobs.
//!
//! Unlike access list entries, a restore job gets a server-assigned id, so
//! the create call is not idempotent and is only repeated while it fails
//! transiently. Once accepted, the job is polled by id until it is readable.
//! Jobs cannot be deleted, only cancelled; a job that already ended counts
//! as removed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use atlas_core::{RestoreJob, RestoreJobApi, RestoreJobId, RestoreJobRequest};

use crate::classify::{classify, ErrorCategory};
use crate::clock::{Clock, TokioClock};
use crate::config::ConvergenceConfig;
use crate::convergence::{converge, log_outcome, ConvergenceOutcome, Step};
use crate::error::ProvisionerError;
use crate::reconcile::read_step;
use crate::scan::{self, ScanContext};

const LABEL: &str = "restore job";

/// A restore job confirmed on the remote side.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedRestoreJob {
    pub id: RestoreJobId,
    pub job: RestoreJob,
}

pub struct RestoreJobEngine {
    api: Arc<dyn RestoreJobApi>,
    clock: Arc<dyn Clock>,
    config: ConvergenceConfig,
}

impl RestoreJobEngine {
    pub fn new(api: Arc<dyn RestoreJobApi>, config: ConvergenceConfig) -> Self {
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

    /// Start a restore job and wait until a Get by id returns it.
    pub async fn create_and_converge(
        &self,
        project_id: &str,
        cluster_name: &str,
        request: &RestoreJobRequest,
        timeout: Option<Duration>,
    ) -> ConvergenceOutcome<ManagedRestoreJob> {
        if let Err(e) = request.validate() {
            return ConvergenceOutcome::Failed {
                error: e.into(),
                attempts: 0,
            };
        }

        let policy = self.config.create;
        let deadline = self.deadline(timeout.unwrap_or(policy.timeout));
        let scope = format!("{project_id}/{cluster_name}");
        tracing::info!(
            project_id,
            cluster_name,
            snapshot_id = %request.snapshot_id,
            delivery_type = %request.delivery_type,
            "starting restore job"
        );

        let submit_policy = policy.with_delay(Duration::ZERO);
        let submitted = converge(self.clock.as_ref(), &submit_policy, deadline, move |attempt| {
            self.submit_pass(project_id, cluster_name, request, attempt)
        })
        .await;

        let (job_id, submit_attempts) = match submitted {
            ConvergenceOutcome::Converged { value, attempts } => (value.id, attempts),
            ConvergenceOutcome::Failed { error, attempts } => {
                tracing::error!(scope = %scope, attempts, error = %error, "restore job rejected");
                return ConvergenceOutcome::Failed { error, attempts };
            }
            ConvergenceOutcome::DeadlineExceeded {
                attempts,
                elapsed,
                last_pending,
            } => {
                tracing::warn!(scope = %scope, attempts, ?elapsed, "restore job never accepted");
                return ConvergenceOutcome::DeadlineExceeded {
                    attempts,
                    elapsed,
                    last_pending,
                };
            }
        };

        tracing::debug!(project_id, cluster_name, job_id = %job_id, "restore job accepted");
        let job_ref = job_id.as_str();
        let visible = converge(self.clock.as_ref(), &policy, deadline, move |attempt| {
            self.visible_pass(project_id, cluster_name, job_ref, attempt)
        })
        .await;

        let outcome = match visible {
            ConvergenceOutcome::Converged { value, attempts } => ConvergenceOutcome::Converged {
                value: ManagedRestoreJob {
                    id: RestoreJobId::encode(project_id, cluster_name, &value.id),
                    job: value,
                },
                attempts: submit_attempts + attempts,
            },
            ConvergenceOutcome::Failed { error, attempts } => ConvergenceOutcome::Failed {
                error,
                attempts: submit_attempts + attempts,
            },
            ConvergenceOutcome::DeadlineExceeded {
                attempts,
                elapsed,
                last_pending,
            } => ConvergenceOutcome::DeadlineExceeded {
                attempts: submit_attempts + attempts,
                elapsed,
                last_pending,
            },
        };
        log_outcome("create", &scope, &job_id, &outcome);
        outcome
    }

    async fn submit_pass(
        &self,
        project_id: &str,
        cluster_name: &str,
        request: &RestoreJobRequest,
        attempt: u32,
    ) -> Step<RestoreJob> {
        match self.api.create(project_id, cluster_name, request).await {
            Ok(job) => Step::Ready(job),
            Err(e) if classify(&e).is_transient() => {
                tracing::warn!(project_id, cluster_name, attempt, error = %e, "transient restore job create failure");
                Step::Pending(format!("create: {e}"))
            }
            Err(e) => Step::Failed(
                ProvisionerError::CreateFailed(e.to_string())
                    .with_resource(LABEL, &format!("{project_id}/{cluster_name}")),
            ),
        }
    }

    async fn visible_pass(
        &self,
        project_id: &str,
        cluster_name: &str,
        job_id: &str,
        attempt: u32,
    ) -> Step<RestoreJob> {
        let resource = format!("{project_id}/{cluster_name}/{job_id}");
        let result = self.api.get(project_id, cluster_name, job_id).await;
        match read_step(result, true, &resource, attempt) {
            Step::Ready(Some(job)) => Step::Ready(job),
            Step::Ready(None) => Step::Pending(format!("{resource} not yet visible")),
            Step::Pending(reason) => Step::Pending(reason),
            Step::Failed(e) => Step::Failed(e.with_resource(LABEL, &resource)),
        }
    }

    /// Cancel the job behind `id` and wait until it is cancelled, ended or
    /// gone.
    pub async fn delete_and_converge(
        &self,
        id: &RestoreJobId,
        timeout: Option<Duration>,
    ) -> ConvergenceOutcome<()> {
        let addr = match id.decode() {
            Ok(addr) => addr,
            Err(e) => {
                return ConvergenceOutcome::Failed {
                    error: e.into(),
                    attempts: 0,
                };
            }
        };

        let policy = &self.config.delete;
        let deadline = self.deadline(timeout.unwrap_or(policy.timeout));
        let scope = format!("{}/{}", addr.project_id, addr.cluster_name);
        tracing::info!(
            project_id = %addr.project_id,
            cluster_name = %addr.cluster_name,
            job_id = %addr.job_id,
            "cancelling restore job"
        );

        let addr_ref = &addr;
        let outcome = converge(self.clock.as_ref(), policy, deadline, move |attempt| {
            self.cancel_pass(
                &addr_ref.project_id,
                &addr_ref.cluster_name,
                &addr_ref.job_id,
                attempt,
            )
        })
        .await;

        log_outcome("delete", &scope, &addr.job_id, &outcome);
        outcome
    }

    async fn cancel_pass(
        &self,
        project_id: &str,
        cluster_name: &str,
        job_id: &str,
        attempt: u32,
    ) -> Step<()> {
        let resource = format!("{project_id}/{cluster_name}/{job_id}");

        // A job that already ended rejects the cancel; that is decided by
        // the Get below.
        let mut refused = None;
        if let Err(e) = self.api.cancel(project_id, cluster_name, job_id).await {
            match classify(&e) {
                ErrorCategory::Transient => {
                    tracing::warn!(resource = %resource, attempt, error = %e, "transient cancel failure");
                    return Step::Pending(format!("cancel: {e}"));
                }
                ErrorCategory::NotFoundExisting => return Step::Ready(()),
                ErrorCategory::PermanentFailure => refused = Some(e),
            }
        }

        match self.api.get(project_id, cluster_name, job_id).await {
            Ok(None) => Step::Ready(()),
            Ok(Some(job)) if job.is_terminal() => Step::Ready(()),
            Ok(Some(_)) => match refused {
                Some(e) => Step::Failed(
                    ProvisionerError::DeleteFailed(e.to_string()).with_resource(LABEL, &resource),
                ),
                None => Step::Pending(format!("{job_id} not yet cancelled")),
            },
            Err(e) => match (classify(&e), refused) {
                (ErrorCategory::NotFoundExisting, _) => Step::Ready(()),
                (ErrorCategory::PermanentFailure, Some(refused)) => Step::Failed(
                    ProvisionerError::DeleteFailed(format!("{refused} (then get: {e})"))
                        .with_resource(LABEL, &resource),
                ),
                // An accepted cancel is only confirmed by the Get, so any
                // other failure there is retried until the deadline.
                _ => {
                    tracing::warn!(resource = %resource, attempt, error = %e, "get after cancel failed");
                    Step::Pending(format!("get after cancel: {e}"))
                }
            },
        }
    }

    /// Re-read the job behind `id`. Same rules as the access list
    /// reconcile: `Ok(None)` means the handle should be dropped.
    pub async fn reconcile(
        &self,
        id: &RestoreJobId,
        is_new: bool,
        timeout: Option<Duration>,
    ) -> Result<Option<RestoreJob>, ProvisionerError> {
        let addr = match id.decode() {
            Ok(addr) => addr,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "dropping undecodable restore job handle");
                return Ok(None);
            }
        };
        self.read(&addr.project_id, &addr.cluster_name, &addr.job_id, is_new, timeout)
            .await
    }

    /// Look up one job by its server id.
    pub async fn get_job(
        &self,
        project_id: &str,
        cluster_name: &str,
        job_id: &str,
    ) -> Result<Option<RestoreJob>, ProvisionerError> {
        self.read(project_id, cluster_name, job_id, false, None).await
    }

    /// Every restore job of a cluster, across all pages.
    pub async fn list_jobs(
        &self,
        project_id: &str,
        cluster_name: &str,
    ) -> Result<Vec<RestoreJob>, ProvisionerError> {
        let policy = &self.config.scan;
        let target = format!("cluster {project_id}/{cluster_name}");
        let ctx = ScanContext {
            clock: self.clock.as_ref(),
            policy,
            page_delay: self.config.page_delay,
            deadline: self.deadline(policy.timeout),
            target: &target,
        };
        let jobs = scan::collect_all(&ctx, |page_num| {
            self.api.list(project_id, cluster_name, page_num)
        })
        .await
        .into_result("list", project_id, cluster_name)?;

        tracing::debug!(project_id, cluster_name, count = jobs.len(), "listed restore jobs");
        Ok(jobs)
    }

    async fn read(
        &self,
        project_id: &str,
        cluster_name: &str,
        job_id: &str,
        is_new: bool,
        timeout: Option<Duration>,
    ) -> Result<Option<RestoreJob>, ProvisionerError> {
        let policy = &self.config.read;
        let deadline = self.deadline(timeout.unwrap_or(policy.timeout));
        let resource = format!("{project_id}/{cluster_name}/{job_id}");
        let resource_ref = resource.as_str();

        let outcome = converge(self.clock.as_ref(), policy, deadline, move |attempt| async move {
            let result = self.api.get(project_id, cluster_name, job_id).await;
            read_step(result, is_new, resource_ref, attempt)
                .map_err(|e| e.with_resource(LABEL, resource_ref))
        })
        .await;

        outcome.into_result("read", &format!("{project_id}/{cluster_name}"), job_id)
    }

    fn deadline(&self, timeout: Duration) -> Instant {
        self.clock.now() + timeout
    }
}
