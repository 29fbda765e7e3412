//! Terminal chain link: hand the purchase to a human.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::instrument::Instrument;
use crate::notify::{EscalationNotice, Notifier};
use crate::store::{AcquisitionRequest, Event};

use super::{PurchaseOutcome, PurchaseStrategy};

/// Notifies administrators with everything needed to finish the purchase by
/// hand. Always the last strategy in the chain; it never completes a purchase
/// itself, so the request rests with its instrument still usable.
pub struct ManualEscalationStrategy {
    notifier: Arc<dyn Notifier>,
}

impl ManualEscalationStrategy {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl PurchaseStrategy for ManualEscalationStrategy {
    fn name(&self) -> &str {
        "manual-escalation"
    }

    fn applies_to(&self, _target_url: &str) -> bool {
        true
    }

    async fn attempt(
        &self,
        request: &AcquisitionRequest,
        event: &Event,
        instrument: &Instrument,
    ) -> PurchaseOutcome {
        let platform = request
            .target_url
            .as_deref()
            .and_then(|u| reqwest::Url::parse(u).ok())
            .and_then(|u| u.host_str().map(|h| h.to_string()))
            .unwrap_or_else(|| "unknown".to_string());

        let notice = EscalationNotice {
            request_id: request.id.clone(),
            event_id: event.id.clone(),
            event_name: event.name.clone(),
            reason: request
                .error
                .clone()
                .unwrap_or_else(|| "automated purchase strategies exhausted".to_string()),
            platform,
            purchase_url: request.target_url.clone().unwrap_or_default(),
            units: request.units,
            expected_cost_cents: request.expected_cost_cents,
            masked_instrument: instrument.masked_identifier.clone(),
        };

        // Delivery failure does not fail the acquisition; the request rests
        // in a state an operator can still pick up from the store.
        match self.notifier.notify_admins(&notice).await {
            Ok(delivered) => {
                info!(request_id = %request.id, delivered, "escalated to administrators");
            }
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "escalation delivery failed");
            }
        }

        PurchaseOutcome::manual_handoff("escalated to administrators")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockNotifier};

    #[tokio::test]
    async fn test_escalation_notifies_and_hands_off() {
        let notifier = Arc::new(MockNotifier::new());
        let strategy = ManualEscalationStrategy::new(notifier.clone());

        let request = fixtures::acquisition_request("ev-1", 2, 10_000);
        let event = fixtures::event("ev-1", 5_000);
        let outcome = strategy
            .attempt(&request, &event, &fixtures::instrument())
            .await;

        assert!(!outcome.success);
        assert!(outcome.requires_manual_handoff);

        let notices = notifier.notices().await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].request_id, request.id);
        assert_eq!(notices[0].units, 2);
        assert_eq!(notices[0].platform, "tickets.example.com");
        assert_eq!(notices[0].masked_instrument, "****4242");
    }

    #[tokio::test]
    async fn test_delivery_failure_still_hands_off() {
        let notifier = Arc::new(MockNotifier::new());
        notifier.set_fail(true).await;
        let strategy = ManualEscalationStrategy::new(notifier);

        let outcome = strategy
            .attempt(
                &fixtures::acquisition_request("ev-1", 2, 10_000),
                &fixtures::event("ev-1", 5_000),
                &fixtures::instrument(),
            )
            .await;

        assert!(outcome.requires_manual_handoff);
    }

    #[test]
    fn test_applies_everywhere() {
        let strategy = ManualEscalationStrategy::new(Arc::new(MockNotifier::new()));
        assert!(strategy.applies_to("https://anything.example/x"));
        assert!(strategy.applies_to("not even a url"));
    }
}
