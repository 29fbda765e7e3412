//! Purchase path for vendors with a transactional API.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::VendorPlatform;
use crate::fraud::{ceiling_cents, FraudGate, RejectReason, TargetDecision};
use crate::instrument::{Instrument, InstrumentIssuer};
use crate::store::{AcquisitionRequest, Event};
use crate::vendor::{detect_platform, InventoryClass, Platform, VendorApi};

use super::{PurchaseOutcome, PurchaseStrategy};

/// Buys through a configured vendor API: pick a class, place an order, pay.
pub struct StructuredApiStrategy {
    vendor: Arc<dyn VendorApi>,
    issuer: Arc<dyn InstrumentIssuer>,
    gate: Arc<FraudGate>,
    platforms: Vec<VendorPlatform>,
}

impl StructuredApiStrategy {
    pub fn new(
        vendor: Arc<dyn VendorApi>,
        issuer: Arc<dyn InstrumentIssuer>,
        gate: Arc<FraudGate>,
        platforms: Vec<VendorPlatform>,
    ) -> Self {
        Self {
            vendor,
            issuer,
            gate,
            platforms,
        }
    }

    /// Cheapest paid class with enough availability, if any.
    fn pick_class(classes: &[InventoryClass], units: i64) -> Option<&InventoryClass> {
        classes
            .iter()
            .filter(|c| !c.free && c.price_cents > 0 && c.available >= units)
            .min_by_key(|c| c.price_cents)
    }
}

#[async_trait]
impl PurchaseStrategy for StructuredApiStrategy {
    fn name(&self) -> &str {
        "structured-api"
    }

    fn applies_to(&self, target_url: &str) -> bool {
        matches!(
            detect_platform(target_url, &self.platforms),
            Platform::Structured(_)
        )
    }

    async fn attempt(
        &self,
        request: &AcquisitionRequest,
        event: &Event,
        instrument: &Instrument,
    ) -> PurchaseOutcome {
        let url = match &request.target_url {
            Some(url) => url.clone(),
            None => return PurchaseOutcome::hard_failure("no target url on request"),
        };

        let classes = match self.vendor.list_inventory_classes(&url).await {
            Ok(classes) => classes,
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "vendor listing failed");
                return PurchaseOutcome::manual_handoff(format!("vendor listing failed: {}", e));
            }
        };

        let class = match Self::pick_class(&classes, request.units) {
            Some(class) => class.clone(),
            None => {
                debug!(
                    request_id = %request.id,
                    classes = classes.len(),
                    "no purchasable class with enough availability"
                );
                return PurchaseOutcome::manual_handoff("no purchasable inventory class");
            }
        };

        // Per-unit price check against the fraud ceiling.
        match self
            .gate
            .validate_target(&url, Some(class.price_cents), event.face_value_cents)
        {
            TargetDecision::Accept { .. } => {}
            TargetDecision::Reject(reason) => {
                return PurchaseOutcome::hard_failure(reason.to_string());
            }
        }

        let order = match self
            .vendor
            .create_order(&url, &class.id, request.units)
            .await
        {
            Ok(order) => order,
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "order creation failed");
                return PurchaseOutcome::manual_handoff(format!("order creation failed: {}", e));
            }
        };

        // The vendor prices the final total (fees included); hold it to the
        // same tolerance as the whole acquisition.
        let total_ceiling = ceiling_cents(
            request.expected_cost_cents,
            self.gate.max_overage_fraction(),
        );
        if order.total_cents > total_ceiling {
            let reason = RejectReason::PriceCeilingExceeded {
                observed_cents: order.total_cents,
                ceiling_cents: total_ceiling,
            };
            return PurchaseOutcome::hard_failure(reason.to_string());
        }

        let details = match self.issuer.retrieve_details(&instrument.id).await {
            Ok(details) => details,
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "instrument details unavailable");
                return PurchaseOutcome::manual_handoff(format!(
                    "instrument details unavailable: {}",
                    e
                ));
            }
        };

        match self.vendor.submit_payment(&url, &order.id, &details).await {
            Ok(confirmation) => {
                info!(
                    request_id = %request.id,
                    order_id = %order.id,
                    "structured purchase settled"
                );
                PurchaseOutcome::purchased(confirmation.reference)
            }
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "payment submission failed");
                PurchaseOutcome::manual_handoff(format!("payment submission failed: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FraudConfig;
    use crate::testing::{fixtures, MockInstrumentIssuer, MockVendorApi};

    fn platforms() -> Vec<VendorPlatform> {
        vec![VendorPlatform {
            host: "tickets.example.com".to_string(),
            api_base: "https://tickets.example.com/api/v1".to_string(),
            api_key: "key".to_string(),
        }]
    }

    fn gate() -> Arc<FraudGate> {
        Arc::new(FraudGate::new(&FraudConfig {
            blocklist: vec![],
            allowlist: vec![],
            max_overage_fraction: 0.15,
        }))
    }

    fn strategy(
        vendor: Arc<MockVendorApi>,
        issuer: Arc<MockInstrumentIssuer>,
    ) -> StructuredApiStrategy {
        StructuredApiStrategy::new(vendor, issuer, gate(), platforms())
    }

    fn class(id: &str, price_cents: i64, available: i64) -> InventoryClass {
        InventoryClass {
            id: id.to_string(),
            name: format!("class {}", id),
            price_cents,
            available,
            free: price_cents == 0,
        }
    }

    #[test]
    fn test_applies_only_to_configured_platforms() {
        let strategy = strategy(
            Arc::new(MockVendorApi::new()),
            Arc::new(MockInstrumentIssuer::new()),
        );
        assert!(strategy.applies_to("https://tickets.example.com/ev/1"));
        assert!(!strategy.applies_to("https://smallvenue.example.org/box"));
    }

    #[test]
    fn test_pick_class_skips_free_and_short_availability() {
        let classes = vec![
            class("free", 0, 100),
            class("sold-down", 4_000, 1),
            class("ok", 5_500, 10),
            class("cheaper", 5_000, 10),
        ];
        let picked = StructuredApiStrategy::pick_class(&classes, 4).unwrap();
        assert_eq!(picked.id, "cheaper");
    }

    #[tokio::test]
    async fn test_successful_purchase() {
        let vendor = Arc::new(MockVendorApi::new());
        vendor.set_classes(vec![class("ga", 5_000, 20)]).await;
        vendor.set_payment_reference("ORD-42").await;
        let strategy = strategy(vendor.clone(), Arc::new(MockInstrumentIssuer::new()));

        let event = fixtures::event("ev-1", 5_000);
        let request = fixtures::acquisition_request("ev-1", 4, 20_000);
        let outcome = strategy
            .attempt(&request, &event, &fixtures::instrument())
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.confirmation_reference.as_deref(), Some("ORD-42"));
        let orders = vendor.orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].class_id, "ga");
        assert_eq!(orders[0].units, 4);
    }

    #[tokio::test]
    async fn test_no_purchasable_class_hands_off() {
        let vendor = Arc::new(MockVendorApi::new());
        vendor.set_classes(vec![class("rsvp", 0, 100)]).await;
        let strategy = strategy(vendor.clone(), Arc::new(MockInstrumentIssuer::new()));

        let outcome = strategy
            .attempt(
                &fixtures::acquisition_request("ev-1", 2, 10_000),
                &fixtures::event("ev-1", 5_000),
                &fixtures::instrument(),
            )
            .await;

        assert!(!outcome.is_terminal());
        assert!(outcome.requires_manual_handoff);
        assert!(vendor.orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_class_price_above_ceiling_is_hard_failure() {
        let vendor = Arc::new(MockVendorApi::new());
        // Face 5000, ceiling 5750; class at 6000 violates the price rule.
        vendor.set_classes(vec![class("vip", 6_000, 20)]).await;
        let strategy = strategy(vendor.clone(), Arc::new(MockInstrumentIssuer::new()));

        let outcome = strategy
            .attempt(
                &fixtures::acquisition_request("ev-1", 2, 10_000),
                &fixtures::event("ev-1", 5_000),
                &fixtures::instrument(),
            )
            .await;

        assert!(outcome.is_terminal());
        assert!(!outcome.success);
        assert!(!outcome.requires_manual_handoff);
        assert!(vendor.orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_order_total_above_ceiling_is_hard_failure() {
        let vendor = Arc::new(MockVendorApi::new());
        vendor.set_classes(vec![class("ga", 5_000, 20)]).await;
        // Expected cost 20000, total ceiling 23000; fees push it past.
        vendor.set_order_total(24_000).await;
        let strategy = strategy(vendor.clone(), Arc::new(MockInstrumentIssuer::new()));

        let outcome = strategy
            .attempt(
                &fixtures::acquisition_request("ev-1", 4, 20_000),
                &fixtures::event("ev-1", 5_000),
                &fixtures::instrument(),
            )
            .await;

        assert!(outcome.is_terminal());
        assert!(!outcome.success);
        // Order placed but never paid.
        assert!(vendor.payments().await.is_empty());
    }

    #[tokio::test]
    async fn test_instrument_details_failure_hands_off() {
        let vendor = Arc::new(MockVendorApi::new());
        vendor.set_classes(vec![class("ga", 5_000, 20)]).await;
        let issuer = Arc::new(MockInstrumentIssuer::new());
        issuer.set_fail_details(true).await;
        let strategy = strategy(vendor.clone(), issuer);

        let outcome = strategy
            .attempt(
                &fixtures::acquisition_request("ev-1", 2, 10_000),
                &fixtures::event("ev-1", 5_000),
                &fixtures::instrument(),
            )
            .await;

        assert!(outcome.requires_manual_handoff);
        // The order was placed but no payment went out without credentials.
        assert_eq!(vendor.orders().await.len(), 1);
        assert!(vendor.payments().await.is_empty());
    }

    #[tokio::test]
    async fn test_payment_declined_hands_off() {
        let vendor = Arc::new(MockVendorApi::new());
        vendor.set_classes(vec![class("ga", 5_000, 20)]).await;
        vendor.set_fail_payment(true).await;
        let strategy = strategy(vendor.clone(), Arc::new(MockInstrumentIssuer::new()));

        let outcome = strategy
            .attempt(
                &fixtures::acquisition_request("ev-1", 2, 10_000),
                &fixtures::event("ev-1", 5_000),
                &fixtures::instrument(),
            )
            .await;

        assert!(!outcome.success);
        assert!(outcome.requires_manual_handoff);
        assert!(vendor.payments().await.is_empty());
    }

    #[tokio::test]
    async fn test_vendor_outage_hands_off() {
        let vendor = Arc::new(MockVendorApi::new());
        vendor.set_fail_listing(true).await;
        let strategy = strategy(vendor, Arc::new(MockInstrumentIssuer::new()));

        let outcome = strategy
            .attempt(
                &fixtures::acquisition_request("ev-1", 2, 10_000),
                &fixtures::event("ev-1", 5_000),
                &fixtures::instrument(),
            )
            .await;

        assert!(outcome.requires_manual_handoff);
    }
}
