//! Admin notification for manual escalation.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::NotifyConfig;

/// Everything an administrator needs to finish a purchase by hand.
///
/// Carries the masked instrument identifier only; full credentials stay with
/// the issuer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EscalationNotice {
    pub request_id: String,
    pub event_id: String,
    pub event_name: String,
    /// Why the automated chain could not finish.
    pub reason: String,
    /// Vendor platform host, as far as it could be determined.
    pub platform: String,
    pub purchase_url: String,
    pub units: i64,
    pub expected_cost_cents: i64,
    pub masked_instrument: String,
}

/// Error type for notification delivery.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("No administrators configured")]
    NoRecipients,

    #[error("Delivery failed to every administrator")]
    AllDeliveriesFailed,
}

/// Trait for escalation notification channels.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver the notice to every configured administrator. Returns the
    /// number of successful deliveries; fails only when nobody was reached.
    async fn notify_admins(&self, notice: &EscalationNotice) -> Result<usize, NotifyError>;
}

/// Notifier that posts the notice as JSON to each admin's webhook.
pub struct WebhookNotifier {
    client: Client,
    config: NotifyConfig,
}

impl WebhookNotifier {
    pub fn new(config: NotifyConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_admins(&self, notice: &EscalationNotice) -> Result<usize, NotifyError> {
        if self.config.admins.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        let mut delivered = 0usize;
        for admin in &self.config.admins {
            let result = self
                .client
                .post(&admin.webhook_url)
                .json(notice)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    debug!(admin = %admin.name, "escalation notice delivered");
                    delivered += 1;
                }
                Ok(response) => {
                    warn!(
                        admin = %admin.name,
                        status = response.status().as_u16(),
                        "escalation notice rejected"
                    );
                }
                Err(e) => {
                    warn!(admin = %admin.name, error = %e, "escalation notice delivery failed");
                }
            }
        }

        if delivered == 0 {
            return Err(NotifyError::AllDeliveriesFailed);
        }
        Ok(delivered)
    }
}
