//! atlas-core
//!
//! Pure domain types for Atlas project access lists and cloud backup restore
//! jobs, the remote capability traits the convergence engine consumes, and
//! the state-id codec. No async runtime dependency. This is the shared
//! vocabulary of the provisioner and whatever transport implements the API.

pub mod api;
pub mod error;
pub mod identity;
pub mod models;

pub use crate::api::{AccessListApi, ApiError, ApiResult, BoxFuture, Page, PageMeta, RestoreJobApi};
pub use crate::error::{CoreError, ValidationError};
pub use crate::identity::{CompositeId, RestoreJobAddr, RestoreJobId};
pub use crate::models::access_list::{AccessListEntry, DesiredEntry, EntryKey};
pub use crate::models::restore_job::{DeliveryType, RestoreJob, RestoreJobRequest};
