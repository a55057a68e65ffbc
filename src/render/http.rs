//! HTTP render client.
//!
//! Fetches server-rendered markup with `reqwest`. Sites that only build their
//! listing client-side need a browser-backed [`RenderClient`] instead; the
//! pipeline does not care which one it is given.

use reqwest::StatusCode;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{RenderClient, RenderOptions, RenderedPage};
use crate::error::HarvestError;
use crate::utils::truncate_for_log;

#[derive(Debug, Clone)]
pub struct HttpRenderClient {
    client: reqwest::Client,
    options: RenderOptions,
}

impl HttpRenderClient {
    pub fn new(options: RenderOptions) -> Result<Self, HarvestError> {
        let client = reqwest::Client::builder()
            .user_agent(&options.user_agent)
            .build()
            .map_err(|e| HarvestError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, options })
    }
}

/// Server errors, throttling, and request timeouts are worth retrying;
/// other failure statuses are not.
fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn classify_reqwest_error(url: &Url, timeout: Duration, e: reqwest::Error) -> HarvestError {
    if e.is_timeout() {
        HarvestError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else {
        HarvestError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
            transient: !e.is_builder(),
        }
    }
}

impl RenderClient for HttpRenderClient {
    #[instrument(level = "debug", skip_all, fields(url = %url))]
    async fn render(&self, url: &Url, timeout: Duration) -> Result<RenderedPage, HarvestError> {
        if self.options.is_blocked(url) {
            return Err(HarvestError::Blocked(url.to_string()));
        }

        let t0 = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                %status,
                elapsed_ms = t0.elapsed().as_millis() as u64,
                body_preview = %truncate_for_log(&body, 200),
                "Navigation returned failure status"
            );
            return Err(HarvestError::Navigation {
                url: url.to_string(),
                reason: format!("HTTP {}", status),
                transient: is_transient_status(status),
            });
        }

        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(url, timeout, e))?;

        debug!(
            %final_url,
            bytes = html.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Rendered page"
        );
        Ok(RenderedPage::new(final_url, html))
    }
}
