//! Outcome callback: best-effort POST of the delivery outcome to the caller's URL.

use crate::relay::payload::DeliveryOutcome;
use std::time::Duration;

/// Total time allowed for one callback request.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Posts outcomes; every failure is logged and dropped.
#[derive(Clone)]
pub struct CallbackReporter {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for CallbackReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackReporter {
    pub fn new() -> Self {
        Self::with_timeout(CALLBACK_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// POST `outcome` as JSON to `url`. Never retries and never returns an error.
    pub async fn report(&self, url: &str, outcome: &DeliveryOutcome) {
        let res = self
            .client
            .post(url)
            .json(outcome)
            .timeout(self.timeout)
            .send()
            .await;
        match res {
            Ok(resp) if resp.status().as_u16() >= 400 => {
                log::warn!(
                    "message {}: callback to {} rejected with status {}",
                    outcome.message_id(),
                    url,
                    resp.status()
                );
            }
            Ok(_) => {
                log::debug!("message {}: callback delivered to {}", outcome.message_id(), url);
            }
            Err(e) => {
                log::error!("message {}: callback to {} failed: {}", outcome.message_id(), url, e);
            }
        }
    }
}
