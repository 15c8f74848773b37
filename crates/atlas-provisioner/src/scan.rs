//! Paginated listing walks.
//!
//! Listings on an eventually consistent control plane are not stable: while
//! an entry propagates, earlier pages can gain or lose rows and shift the
//! rest. A walk is therefore never resumed mid-way. Any retriable failure
//! abandons the traversal and the next attempt starts again from page 1, so
//! "not found" is only ever reported after a complete pass over every page.

use std::future::Future;
use std::time::{Duration, Instant};

use atlas_core::{ApiResult, Page};

use crate::classify::{classify, ErrorCategory};
use crate::clock::{sleep_bounded, Clock};
use crate::convergence::{converge, ConvergenceOutcome, Step, WaitPolicy};
use crate::error::ProvisionerError;

/// Shared settings for one scan.
pub struct ScanContext<'a> {
    pub clock: &'a dyn Clock,
    pub policy: &'a WaitPolicy,
    pub page_delay: Duration,
    pub deadline: Instant,
    /// Used in error messages, e.g. "project proj1".
    pub target: &'a str,
}

/// Walk pages until `matches` accepts an item.
///
/// Converges to `Some(item)` on the first match, or `None` once the last
/// page has been scanned without one.
pub async fn find_first<T, F, Fut, M>(
    ctx: &ScanContext<'_>,
    fetch: F,
    matches: M,
) -> ConvergenceOutcome<Option<T>>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = ApiResult<Page<T>>>,
    M: Fn(&T) -> bool,
{
    let fetch = &fetch;
    let matches = &matches;
    converge(ctx.clock, ctx.policy, ctx.deadline, move |attempt| async move {
        let mut page_num = 1;
        loop {
            let page = match fetch_page(ctx, fetch, page_num, attempt).await {
                Ok(page) => page,
                Err(step) => return step,
            };

            if let Some(hit) = page.results.into_iter().find(|item| matches(item)) {
                tracing::debug!(target_scope = %ctx.target, page_num, "match found");
                return Step::Ready(Some(hit));
            }

            match advance(ctx, &page.meta, page_num).await {
                Ok(Some(next)) => page_num = next,
                Ok(None) if page.meta.last_page => return Step::Ready(None),
                Ok(None) => return Step::Pending(format!("deadline reached after page {page_num}")),
                Err(e) => return Step::Failed(e),
            }
        }
    })
    .await
}

/// Walk every page and return all items.
pub async fn collect_all<T, F, Fut>(ctx: &ScanContext<'_>, fetch: F) -> ConvergenceOutcome<Vec<T>>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = ApiResult<Page<T>>>,
{
    let fetch = &fetch;
    converge(ctx.clock, ctx.policy, ctx.deadline, move |attempt| async move {
        let mut items = Vec::new();
        let mut page_num = 1;
        loop {
            let page = match fetch_page(ctx, fetch, page_num, attempt).await {
                Ok(page) => page,
                Err(step) => return step,
            };
            let meta = page.meta;
            items.extend(page.results);

            match advance(ctx, &meta, page_num).await {
                Ok(Some(next)) => page_num = next,
                Ok(None) if meta.last_page => return Step::Ready(items),
                Ok(None) => return Step::Pending(format!("deadline reached after page {page_num}")),
                Err(e) => return Step::Failed(e),
            }
        }
    })
    .await
}

/// Fetch one page, turning a failure into the step that ends this pass.
async fn fetch_page<T, U, F, Fut>(
    ctx: &ScanContext<'_>,
    fetch: &F,
    page_num: u32,
    attempt: u32,
) -> Result<Page<T>, Step<U>>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = ApiResult<Page<T>>>,
{
    fetch(page_num).await.map_err(|e| match classify(&e) {
        ErrorCategory::Transient => {
            tracing::warn!(
                target_scope = %ctx.target,
                page_num,
                attempt,
                error = %e,
                "transient listing failure, restarting from page 1"
            );
            Step::Pending(format!("listing page {page_num}: {e}"))
        }
        // A listing of a valid scope has nothing to be missing; a 404 here
        // means the scope itself is wrong.
        ErrorCategory::NotFoundExisting | ErrorCategory::PermanentFailure => {
            Step::Failed(ProvisionerError::ReadFailed(format!(
                "listing {} page {page_num}: {e}",
                ctx.target
            )))
        }
    })
}

/// Next page number, after the inter-page pause. `None` on the last page or
/// when the deadline ran out during the pause.
async fn advance(
    ctx: &ScanContext<'_>,
    meta: &atlas_core::PageMeta,
    page_num: u32,
) -> Result<Option<u32>, ProvisionerError> {
    if meta.last_page {
        return Ok(None);
    }
    // Trust the server's page number, but never walk backwards.
    let next = meta.page_num.max(page_num).checked_add(1).ok_or_else(|| {
        ProvisionerError::ReadFailed(format!(
            "listing {} reported page {} without a last page",
            ctx.target, meta.page_num
        ))
    })?;

    sleep_bounded(ctx.clock, ctx.page_delay, ctx.deadline).await;
    if ctx.clock.now() >= ctx.deadline {
        return Ok(None);
    }
    Ok(Some(next))
}
