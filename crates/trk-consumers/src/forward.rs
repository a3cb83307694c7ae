//! Forwards the tagged raw statements of each batch to a remote record store.
//!
//! A non-2xx answer is surfaced with the remote status so the collector can
//! echo it to the client. Transport failures carry no status.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use tracing::{debug, warn};

use crate::consumer::{Consumer, ConsumerRejection, Delivery};

const XAPI_VERSION_HEADER: &str = "X-Experience-API-Version";
const XAPI_VERSION: &str = "1.0.3";

/// Auth secret is resolved by the caller; never logged.
#[derive(Debug, Clone)]
pub struct ForwardConsumer {
    http: reqwest::Client,
    url: String,
    auth: Option<String>,
}

impl ForwardConsumer {
    pub fn new(url: impl Into<String>, auth: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            auth,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Consumer for ForwardConsumer {
    fn name(&self) -> &str {
        "forward"
    }

    async fn accept(&self, delivery: Delivery<'_>) -> Result<(), ConsumerRejection> {
        if delivery.raw.is_empty() {
            return Ok(());
        }

        let mut req = self
            .http
            .post(&self.url)
            .header(XAPI_VERSION_HEADER, XAPI_VERSION)
            .json(delivery.raw);
        if let Some(auth) = &self.auth {
            req = req.header(AUTHORIZATION, format!("Bearer {auth}"));
        }

        let resp = req.send().await.map_err(|e| {
            warn!(url = %self.url, "forward request failed: {e}");
            ConsumerRejection::new(format!("forward request failed: {e}"))
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(url = %self.url, status = status.as_u16(), "forward rejected");
            let message = if body.trim().is_empty() {
                format!("record store answered {}", status.as_u16())
            } else {
                body
            };
            return Err(ConsumerRejection::with_status(status.as_u16(), message));
        }

        debug!(url = %self.url, statements = delivery.raw.len(), "statements forwarded");
        Ok(())
    }
}
