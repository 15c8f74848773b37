//! Remote capabilities consumed by the convergence engine.
//!
//! These traits describe the Atlas Admin API calls the engine needs and
//! nothing more. HTTP, digest auth and JSON decoding live in whatever
//! transport implements them. Methods return boxed futures for dyn
//! compatibility so the engine can hold `Arc<dyn AccessListApi>`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::models::access_list::{AccessListEntry, DesiredEntry};
use crate::models::restore_job::{RestoreJob, RestoreJobRequest};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type ApiResult<T> = Result<T, ApiError>;

/// A failed remote call, as loosely typed as the API reports it.
///
/// The upstream API does not guarantee a structured error contract: some
/// failures carry an HTTP status and an error code, some only a message.
/// `Display` renders every marker that is present so callers can match
/// against the full text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub status: Option<u16>,
    pub code: Option<String>,
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(status) = self.status {
            write!(f, "{status} ")?;
        }
        if let Some(code) = &self.code {
            write!(f, "({code}) ")?;
        }
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

/// Pagination metadata returned alongside every listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    /// 1-based page number the server says it returned.
    pub page_num: u32,
    pub last_page: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, page_num: u32, last_page: bool) -> Self {
        Self {
            results,
            meta: PageMeta {
                page_num,
                last_page,
            },
        }
    }
}

/// Project IP access list endpoints.
pub trait AccessListApi: Send + Sync {
    /// Add one entry to the project's access list.
    fn create<'a>(
        &'a self,
        project_id: &'a str,
        entry: &'a DesiredEntry,
    ) -> BoxFuture<'a, ApiResult<AccessListEntry>>;

    /// Fetch one entry by its key. `Ok(None)` and a not-found error both
    /// mean the entry is absent; transports may report either.
    fn get<'a>(
        &'a self,
        project_id: &'a str,
        entry: &'a str,
    ) -> BoxFuture<'a, ApiResult<Option<AccessListEntry>>>;

    fn list<'a>(
        &'a self,
        project_id: &'a str,
        page_num: u32,
    ) -> BoxFuture<'a, ApiResult<Page<AccessListEntry>>>;

    fn delete<'a>(&'a self, project_id: &'a str, entry: &'a str) -> BoxFuture<'a, ApiResult<()>>;
}

/// Cloud backup restore job endpoints, scoped to a project and cluster.
pub trait RestoreJobApi: Send + Sync {
    fn create<'a>(
        &'a self,
        project_id: &'a str,
        cluster_name: &'a str,
        request: &'a RestoreJobRequest,
    ) -> BoxFuture<'a, ApiResult<RestoreJob>>;

    fn get<'a>(
        &'a self,
        project_id: &'a str,
        cluster_name: &'a str,
        job_id: &'a str,
    ) -> BoxFuture<'a, ApiResult<Option<RestoreJob>>>;

    fn list<'a>(
        &'a self,
        project_id: &'a str,
        cluster_name: &'a str,
        page_num: u32,
    ) -> BoxFuture<'a, ApiResult<Page<RestoreJob>>>;

    /// Cancel a running restore job. Atlas has no hard delete for jobs.
    fn cancel<'a>(
        &'a self,
        project_id: &'a str,
        cluster_name: &'a str,
        job_id: &'a str,
    ) -> BoxFuture<'a, ApiResult<()>>;
}
