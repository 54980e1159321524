use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep};

/// Polls `check` every `interval` until it yields `true` or `deadline`
/// passes. Returns whether the condition was met; check errors end the wait.
pub(crate) async fn wait_until<F, Fut, E>(
    deadline: Instant,
    interval: Duration,
    mut check: F,
) -> Result<bool, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    loop {
        if check().await? {
            return Ok(true);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(false);
        }
        sleep(interval.min(deadline - now)).await;
    }
}
