//! Retry discipline around navigation.
//!
//! Every navigation, listing or article, goes through [`render_with_retry`]:
//!
//! - each attempt is bounded by the caller's timeout
//! - transient failures wait `delay_ms` and try again, up to `max_attempts`
//! - permanent failures (404, blocked resource) stop immediately
//!
//! The returned error carries one history line per attempt so callers can
//! log exactly what happened.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout as with_timeout};
use tracing::{error, info, instrument, warn};
use url::Url;

use super::{RenderClient, RenderedPage};
use crate::error::HarvestError;

/// How many times to try a navigation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Render `url`, retrying transient failures according to `policy`.
///
/// On failure returns [`HarvestError::RetriesExhausted`] wrapping the last
/// attempt's error.
#[instrument(level = "info", skip_all, fields(url = %url))]
pub async fn render_with_retry<C: RenderClient>(
    client: &C,
    url: &Url,
    policy: &RetryPolicy,
    timeout: Duration,
) -> Result<RenderedPage, HarvestError> {
    let total_t0 = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut history = Vec::new();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let attempt_t0 = Instant::now();
        let result = match with_timeout(timeout, client.render(url, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(HarvestError::Timeout {
                url: url.to_string(),
                timeout,
            }),
        };

        match result {
            Ok(page) => {
                if attempt > 1 {
                    info!(
                        attempt,
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        "Navigation recovered after retry"
                    );
                }
                return Ok(page);
            }
            Err(e) => {
                let elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64;
                history.push(format!(
                    "attempt {}/{} failed after {} ms: {}",
                    attempt, max_attempts, elapsed_ms_attempt, e
                ));

                if !e.is_transient() || attempt >= max_attempts {
                    error!(
                        attempt,
                        max = max_attempts,
                        transient = e.is_transient(),
                        elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                        error = %e,
                        "Navigation failed; giving up"
                    );
                    return Err(HarvestError::RetriesExhausted {
                        url: url.to_string(),
                        attempts: attempt,
                        last: Box::new(e),
                        history,
                    });
                }

                let delay = policy.delay();
                warn!(
                    attempt,
                    max = max_attempts,
                    elapsed_ms_attempt,
                    ?delay,
                    error = %e,
                    "Navigation attempt failed; retrying"
                );
                if !delay.is_zero() {
                    sleep(delay).await;
                }
            }
        }
    }
}
