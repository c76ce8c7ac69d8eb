//! Bounded wait-for-condition helpers.
//!
//! Every helper polls the context until the condition holds or the policy's
//! timeout elapses; none of them block indefinitely.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::driver::{BrowserContext, ElementRef, Locator};
use crate::error::{BrowserError, Result};

const DEFAULT_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll: Duration,
}

impl WaitPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll: DEFAULT_POLL,
        }
    }
}

/// Poll `check` until it yields `Some`, failing with `Timeout` at the deadline.
///
/// Errors from `check` end the wait immediately.
pub async fn poll_until<T, F, Fut>(policy: WaitPolicy, what: &str, mut check: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + policy.timeout;
    loop {
        if let Some(found) = check().await? {
            return Ok(found);
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(BrowserError::Timeout {
                what: what.to_string(),
                ms: policy.timeout.as_millis() as u64,
            });
        }
        trace!(%what, "condition not met yet");
        tokio::time::sleep(policy.poll.min(deadline - now)).await;
    }
}

async fn find_lenient(ctx: &dyn BrowserContext, locator: &Locator) -> Result<Vec<ElementRef>> {
    match ctx.find_all(locator).await {
        Err(BrowserError::ElementMissing(_)) => Ok(Vec::new()),
        other => other,
    }
}

/// At least one element matches; returns all matches.
pub async fn presence_of_all(
    ctx: &dyn BrowserContext,
    locator: &Locator,
    policy: WaitPolicy,
) -> Result<Vec<ElementRef>> {
    let what = format!("presence of {locator}");
    poll_until(policy, &what, || async move {
        let found = find_lenient(ctx, locator).await?;
        Ok((!found.is_empty()).then_some(found))
    })
    .await
}

/// The first matching element once one exists.
pub async fn presence_of(
    ctx: &dyn BrowserContext,
    locator: &Locator,
    policy: WaitPolicy,
) -> Result<ElementRef> {
    let what = format!("presence of {locator}");
    poll_until(policy, &what, || async move {
        Ok(find_lenient(ctx, locator).await?.into_iter().next())
    })
    .await
}

async fn ready(ctx: &dyn BrowserContext, element: &ElementRef) -> Result<bool> {
    Ok(ctx.is_displayed(element).await? && ctx.is_enabled(element).await?)
}

/// The first matching element that is both visible and enabled.
pub async fn clickable(
    ctx: &dyn BrowserContext,
    locator: &Locator,
    policy: WaitPolicy,
) -> Result<ElementRef> {
    let what = format!("clickable {locator}");
    poll_until(policy, &what, || async move {
        for element in find_lenient(ctx, locator).await? {
            if ready(ctx, &element).await? {
                return Ok(Some(element));
            }
        }
        Ok(None)
    })
    .await
}

/// Wait until an already located element becomes visible and enabled.
pub async fn element_clickable(
    ctx: &dyn BrowserContext,
    element: &ElementRef,
    policy: WaitPolicy,
) -> Result<()> {
    let what = format!("element {} to become clickable", element.as_str());
    poll_until(policy, &what, || async move {
        Ok(ready(ctx, element).await?.then_some(()))
    })
    .await
}
