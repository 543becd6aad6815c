//! DOM stability wait.

use std::future::Future;
use std::time::Duration;

use super::{RenderError, RenderOptions};

/// Poll `quiet_for` until the page has been free of DOM mutations for
/// `opts.stable_after`, giving up after `opts.stability_timeout`.
///
/// `quiet_for` reports how long the document has been quiet as of the call.
/// Errors from it abort the wait immediately.
pub async fn wait_until_stable<F, Fut>(mut quiet_for: F, opts: &RenderOptions) -> Result<Duration, RenderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Duration, RenderError>>,
{
    let waited = tokio::time::timeout(opts.stability_timeout, async {
        let start = tokio::time::Instant::now();
        loop {
            let quiet = quiet_for().await?;
            if quiet >= opts.stable_after {
                return Ok(start.elapsed());
            }
            tokio::time::sleep(opts.poll_interval).await;
        }
    })
    .await;

    match waited {
        Ok(result) => result,
        Err(_) => Err(RenderError::StabilityTimeout(opts.stability_timeout.as_millis() as u64)),
    }
}
