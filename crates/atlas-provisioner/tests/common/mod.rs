//! Test helpers for atlas-provisioner integration tests: a clock that
//! advances instantly and scripted in-memory stand-ins for the Atlas API.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use atlas_core::{
    AccessListApi, AccessListEntry, ApiError, ApiResult, BoxFuture, DesiredEntry, Page,
    RestoreJob, RestoreJobApi, RestoreJobRequest,
};
use atlas_provisioner::{Clock, ConvergenceConfig, WaitPolicy};

pub const SEC: Duration = Duration::from_secs(1);

/// Clock whose sleeps advance virtual time and return at once.
pub struct ManualClock {
    start: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        })
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        *self.elapsed.lock().unwrap() += duration;
        self.sleeps.lock().unwrap().push(duration);
        Box::pin(tokio::task::yield_now())
    }
}

/// One-second fixed spacing everywhere, no initial delay, no page delay.
pub fn test_config() -> ConvergenceConfig {
    let policy = WaitPolicy::fixed(60 * SEC, SEC);
    ConvergenceConfig {
        create: policy,
        delete: policy,
        read: WaitPolicy::fixed(10 * SEC, SEC),
        scan: WaitPolicy::fixed(10 * SEC, SEC),
        page_delay: Duration::ZERO,
        ..ConvergenceConfig::default()
    }
}

pub fn transient() -> ApiError {
    ApiError::new("Unexpected error.")
        .with_status(500)
        .with_code("UNEXPECTED_ERROR")
}

pub fn not_found() -> ApiError {
    ApiError::new("IP address not on access list")
        .with_status(404)
        .with_code("ATLAS_NETWORK_PERMISSION_ENTRY_NOT_FOUND")
}

pub fn permanent() -> ApiError {
    ApiError::new("Invalid IP address or CIDR notation")
        .with_status(400)
        .with_code("INVALID_IP_ADDRESS_OR_CIDR_NOTATION")
}

pub fn cidr_entry(project_id: &str, cidr: &str) -> AccessListEntry {
    AccessListEntry::from_desired(project_id, &DesiredEntry::cidr(cidr))
}

/// Responses handed out in order. The last one repeats once the rest are
/// used up; an empty script defers to the mock's default behavior.
pub struct Script<T>(Mutex<VecDeque<T>>);

impl<T: Clone> Script<T> {
    pub fn new() -> Self {
        Self(Mutex::new(VecDeque::new()))
    }

    pub fn set(&self, responses: impl IntoIterator<Item = T>) {
        *self.0.lock().unwrap() = responses.into_iter().collect();
    }

    fn next(&self) -> Option<T> {
        let mut queue = self.0.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

/// In-memory access list with scripted failures and visibility lag.
pub struct MockAccessListApi {
    pub entries: Mutex<Vec<AccessListEntry>>,
    pub create_script: Script<ApiResult<()>>,
    pub get_script: Script<ApiResult<Option<AccessListEntry>>>,
    pub list_script: Script<ApiResult<Page<AccessListEntry>>>,
    pub delete_script: Script<ApiResult<()>>,
    /// Page-1 listings that still hide every entry.
    pub list_lag: Mutex<u32>,
    pub page_size: usize,
    pub calls: Mutex<Vec<String>>,
}

impl MockAccessListApi {
    pub fn new() -> Arc<Self> {
        Self::with_page_size(100)
    }

    pub fn with_page_size(page_size: usize) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(Vec::new()),
            create_script: Script::new(),
            get_script: Script::new(),
            list_script: Script::new(),
            delete_script: Script::new(),
            list_lag: Mutex::new(0),
            page_size,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn seed(&self, entry: AccessListEntry) {
        self.entries.lock().unwrap().push(entry);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn lookup(&self, key: &str) -> Option<AccessListEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| {
                [&e.cidr_block, &e.ip_address, &e.aws_security_group]
                    .into_iter()
                    .any(|f| f.as_deref() == Some(key))
            })
            .cloned()
    }
}

impl AccessListApi for MockAccessListApi {
    fn create<'a>(
        &'a self,
        project_id: &'a str,
        entry: &'a DesiredEntry,
    ) -> BoxFuture<'a, ApiResult<AccessListEntry>> {
        Box::pin(async move {
            self.record(format!("create {project_id}"));
            self.create_script.next().unwrap_or(Ok(()))?;

            let record = AccessListEntry::from_desired(project_id, entry);
            let mut entries = self.entries.lock().unwrap();
            if !entries.contains(&record) {
                entries.push(record.clone());
            }
            Ok(record)
        })
    }

    fn get<'a>(
        &'a self,
        project_id: &'a str,
        entry: &'a str,
    ) -> BoxFuture<'a, ApiResult<Option<AccessListEntry>>> {
        Box::pin(async move {
            self.record(format!("get {project_id} {entry}"));
            match self.get_script.next() {
                Some(response) => response,
                None => Ok(self.lookup(entry)),
            }
        })
    }

    fn list<'a>(
        &'a self,
        project_id: &'a str,
        page_num: u32,
    ) -> BoxFuture<'a, ApiResult<Page<AccessListEntry>>> {
        Box::pin(async move {
            self.record(format!("list {project_id} {page_num}"));
            if let Some(response) = self.list_script.next() {
                return response;
            }

            if page_num == 1 {
                let mut lag = self.list_lag.lock().unwrap();
                if *lag > 0 {
                    *lag -= 1;
                    return Ok(Page::new(Vec::new(), 1, true));
                }
            }

            let entries = self.entries.lock().unwrap();
            let start = (page_num as usize - 1) * self.page_size;
            let results: Vec<_> = entries.iter().skip(start).take(self.page_size).cloned().collect();
            let last_page = start + self.page_size >= entries.len();
            Ok(Page::new(results, page_num, last_page))
        })
    }

    fn delete<'a>(&'a self, project_id: &'a str, entry: &'a str) -> BoxFuture<'a, ApiResult<()>> {
        Box::pin(async move {
            self.record(format!("delete {project_id} {entry}"));
            self.delete_script.next().unwrap_or(Ok(()))?;
            self.entries.lock().unwrap().retain(|e| {
                ![&e.cidr_block, &e.ip_address, &e.aws_security_group]
                    .into_iter()
                    .any(|f| f.as_deref() == Some(entry))
            });
            Ok(())
        })
    }
}

/// In-memory restore jobs for one or more clusters.
pub struct MockRestoreJobApi {
    pub jobs: Mutex<Vec<RestoreJob>>,
    pub create_script: Script<ApiResult<()>>,
    pub get_script: Script<ApiResult<Option<RestoreJob>>>,
    pub list_script: Script<ApiResult<Page<RestoreJob>>>,
    pub cancel_script: Script<ApiResult<()>>,
    /// Gets that still miss a freshly created job.
    pub get_lag: Mutex<u32>,
    pub page_size: usize,
    pub calls: Mutex<Vec<String>>,
}

impl MockRestoreJobApi {
    pub fn new() -> Arc<Self> {
        Self::with_page_size(100)
    }

    pub fn with_page_size(page_size: usize) -> Arc<Self> {
        Arc::new(Self {
            jobs: Mutex::new(Vec::new()),
            create_script: Script::new(),
            get_script: Script::new(),
            list_script: Script::new(),
            cancel_script: Script::new(),
            get_lag: Mutex::new(0),
            page_size,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn seed(&self, job: RestoreJob) {
        self.jobs.lock().unwrap().push(job);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn job(id: &str, request: &RestoreJobRequest) -> RestoreJob {
    RestoreJob {
        id: id.to_string(),
        snapshot_id: request.snapshot_id.clone(),
        delivery_type: request.delivery_type,
        target_cluster_name: request.target_cluster_name.clone(),
        target_project_id: request.target_project_id.clone(),
        cancelled: false,
        expired: false,
        created_at: Some(jiff::Timestamp::UNIX_EPOCH),
        finished_at: None,
        expires_at: None,
        timestamp: None,
        links: Vec::new(),
    }
}

impl RestoreJobApi for MockRestoreJobApi {
    fn create<'a>(
        &'a self,
        project_id: &'a str,
        cluster_name: &'a str,
        request: &'a RestoreJobRequest,
    ) -> BoxFuture<'a, ApiResult<RestoreJob>> {
        Box::pin(async move {
            self.record(format!("create {project_id} {cluster_name}"));
            self.create_script.next().unwrap_or(Ok(()))?;

            let mut jobs = self.jobs.lock().unwrap();
            let created = job(&format!("job-{}", jobs.len() + 1), request);
            jobs.push(created.clone());
            Ok(created)
        })
    }

    fn get<'a>(
        &'a self,
        project_id: &'a str,
        cluster_name: &'a str,
        job_id: &'a str,
    ) -> BoxFuture<'a, ApiResult<Option<RestoreJob>>> {
        Box::pin(async move {
            self.record(format!("get {project_id} {cluster_name} {job_id}"));
            if let Some(response) = self.get_script.next() {
                return response;
            }

            let mut lag = self.get_lag.lock().unwrap();
            if *lag > 0 {
                *lag -= 1;
                return Err(ApiError::new("restore job not found")
                    .with_status(404)
                    .with_code("RESTORE_JOB_NOT_FOUND"));
            }
            Ok(self.jobs.lock().unwrap().iter().find(|j| j.id == job_id).cloned())
        })
    }

    fn list<'a>(
        &'a self,
        project_id: &'a str,
        cluster_name: &'a str,
        page_num: u32,
    ) -> BoxFuture<'a, ApiResult<Page<RestoreJob>>> {
        Box::pin(async move {
            self.record(format!("list {project_id} {cluster_name} {page_num}"));
            if let Some(response) = self.list_script.next() {
                return response;
            }

            let jobs = self.jobs.lock().unwrap();
            let start = (page_num as usize - 1) * self.page_size;
            let results: Vec<_> = jobs.iter().skip(start).take(self.page_size).cloned().collect();
            let last_page = start + self.page_size >= jobs.len();
            Ok(Page::new(results, page_num, last_page))
        })
    }

    fn cancel<'a>(
        &'a self,
        project_id: &'a str,
        cluster_name: &'a str,
        job_id: &'a str,
    ) -> BoxFuture<'a, ApiResult<()>> {
        Box::pin(async move {
            self.record(format!("cancel {project_id} {cluster_name} {job_id}"));
            self.cancel_script.next().unwrap_or(Ok(()))?;

            let mut jobs = self.jobs.lock().unwrap();
            match jobs.iter_mut().find(|j| j.id == job_id) {
                Some(job) => {
                    job.cancelled = true;
                    Ok(())
                }
                None => Err(ApiError::new("restore job not found")
                    .with_status(404)
                    .with_code("RESTORE_JOB_NOT_FOUND")),
            }
        })
    }
}
