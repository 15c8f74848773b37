//! Read-after-write reconciliation.
//!
//! A direct Get is the only way to refresh a handle, and right after a
//! create it can still answer "not found". How a missing object is read
//! depends on whether the caller just created it.

use atlas_core::ApiResult;

use crate::classify::{classify, ErrorCategory};
use crate::convergence::Step;
use crate::error::ProvisionerError;

/// Interpret one Get for a reconcile pass.
///
/// A missing object is `Ready(None)` for an existing handle and `Pending`
/// for a freshly created one. Server faults are always `Pending`.
pub(crate) fn read_step<T>(
    result: ApiResult<Option<T>>,
    is_new: bool,
    resource: &str,
    attempt: u32,
) -> Step<Option<T>> {
    let missing = |detail: &str| {
        if is_new {
            Step::Pending(format!("{resource} not yet visible: {detail}"))
        } else {
            Step::Ready(None)
        }
    };

    match result {
        Ok(Some(record)) => Step::Ready(Some(record)),
        Ok(None) => missing("absent"),
        Err(e) => match classify(&e) {
            ErrorCategory::Transient => {
                tracing::warn!(resource, attempt, error = %e, "transient read failure");
                Step::Pending(format!("read: {e}"))
            }
            ErrorCategory::NotFoundExisting => missing(&e.to_string()),
            ErrorCategory::PermanentFailure => Step::Failed(ProvisionerError::ReadFailed(e.to_string())),
        },
    }
}
