//! The acquisition orchestrator: drives eligible events through the
//! instrument and purchase lifecycle.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::fraud::{FraudGate, TargetDecision};
use crate::funding::{EligibleEvent, FundingVerifier};
use crate::instrument::{identifying_digest, spend_cap_cents, Instrument, InstrumentIssuer};
use crate::inventory::InventoryMaterializer;
use crate::metrics;
use crate::store::{
    AcquisitionRequest, AcquisitionState, AcquisitionStore, CreateAcquisitionRequest, Event,
    StoreError,
};
use crate::strategy::{PurchaseOutcome, PurchaseStrategy};

use super::{CycleReport, OrchestratorConfig, OrchestratorError};

/// Coordinates funding verification, fraud gating, instrument issuance, the
/// strategy chain and inventory materialization.
pub struct AcquisitionOrchestrator {
    config: OrchestratorConfig,
    store: Arc<dyn AcquisitionStore>,
    verifier: FundingVerifier,
    gate: Arc<FraudGate>,
    issuer: Arc<dyn InstrumentIssuer>,
    strategies: Vec<Arc<dyn PurchaseStrategy>>,
    materializer: InventoryMaterializer,
    holder_id: String,
}

impl AcquisitionOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn AcquisitionStore>,
        gate: Arc<FraudGate>,
        issuer: Arc<dyn InstrumentIssuer>,
        strategies: Vec<Arc<dyn PurchaseStrategy>>,
        holder_id: String,
    ) -> Self {
        Self {
            config,
            verifier: FundingVerifier::new(store.clone()),
            materializer: InventoryMaterializer::new(store.clone()),
            store,
            gate,
            issuer,
            strategies,
            holder_id,
        }
    }

    /// Run one acquisition cycle over every eligible event.
    ///
    /// Per-event failures are contained: one bad event never aborts the
    /// cycle.
    pub async fn run_acquisition_cycle(&self) -> Result<CycleReport, OrchestratorError> {
        let start = Instant::now();
        metrics::ACQUISITION_CYCLES.inc();

        let mut eligible = self.verifier.find_eligible_events()?;
        if self.config.max_events_per_cycle > 0 {
            eligible.truncate(self.config.max_events_per_cycle);
        }
        info!(events = eligible.len(), "acquisition cycle started");

        let mut report = CycleReport::default();
        for entry in &eligible {
            match self.process_event(entry).await {
                Ok(outcome) => {
                    report.processed += 1;
                    if outcome.success {
                        report.succeeded += 1;
                        metrics::REQUEST_OUTCOMES
                            .with_label_values(&["completed"])
                            .inc();
                    } else if outcome.requires_manual_handoff {
                        report.flagged_for_manual += 1;
                        metrics::REQUEST_OUTCOMES
                            .with_label_values(&["manual_handoff"])
                            .inc();
                    } else {
                        report.failed += 1;
                        metrics::REQUEST_OUTCOMES.with_label_values(&["failed"]).inc();
                    }
                }
                Err(OrchestratorError::Store(StoreError::RequestInFlight { event_id })) => {
                    debug!(event_id = %event_id, "request already in flight, skipping");
                    report.skipped += 1;
                    metrics::REQUEST_OUTCOMES
                        .with_label_values(&["skipped"])
                        .inc();
                }
                Err(e) => {
                    warn!(event_id = %entry.event.id, error = %e, "event processing failed");
                    report.processed += 1;
                    report.failed += 1;
                    metrics::REQUEST_OUTCOMES.with_label_values(&["failed"]).inc();
                }
            }
        }

        metrics::CYCLE_DURATION.observe(start.elapsed().as_secs_f64());
        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            flagged_for_manual = report.flagged_for_manual,
            skipped = report.skipped,
            "acquisition cycle finished"
        );
        Ok(report)
    }

    /// Acquire for one specific event, regardless of cycle limits.
    pub async fn acquire_for_event(
        &self,
        event_id: &str,
    ) -> Result<PurchaseOutcome, OrchestratorError> {
        let event = self
            .store
            .get_event(event_id)?
            .ok_or_else(|| OrchestratorError::EventNotFound(event_id.to_string()))?;
        let eligible = self
            .verifier
            .eligibility_for(&event)?
            .ok_or_else(|| OrchestratorError::NoFundedUnits(event_id.to_string()))?;
        self.process_event(&eligible).await
    }

    async fn process_event(
        &self,
        eligible: &EligibleEvent,
    ) -> Result<PurchaseOutcome, OrchestratorError> {
        let event = &eligible.event;

        let Some(target_url) = event.target_url.clone() else {
            let request = self.store.create_request(CreateAcquisitionRequest {
                event_id: event.id.clone(),
                units: eligible.remaining_units,
                expected_cost_cents: eligible.expected_cost_cents,
                target_url: None,
            })?;
            let error = "no target url configured".to_string();
            self.store
                .update_state(&request.id, AcquisitionState::Failed { error: error.clone() })?;
            warn!(event_id = %event.id, "event has no target url, request failed");
            return Ok(PurchaseOutcome::hard_failure(error));
        };

        // The gate runs before the request carries any money or instrument.
        match self
            .gate
            .validate_target(&target_url, None, event.face_value_cents)
        {
            TargetDecision::Accept { allowlisted } => {
                if !allowlisted {
                    metrics::UNVETTED_TARGETS.inc();
                    warn!(
                        event_id = %event.id,
                        target_url = %target_url,
                        "target host is not allowlisted, proceeding under audit"
                    );
                }
            }
            TargetDecision::Reject(reason) => {
                metrics::FRAUD_REJECTIONS
                    .with_label_values(&[reason.rule()])
                    .inc();
                let request = self.store.create_request(CreateAcquisitionRequest {
                    event_id: event.id.clone(),
                    units: eligible.remaining_units,
                    expected_cost_cents: eligible.expected_cost_cents,
                    target_url: Some(target_url),
                })?;
                let error = reason.to_string();
                self.store
                    .update_state(&request.id, AcquisitionState::Failed { error: error.clone() })?;
                return Ok(PurchaseOutcome::hard_failure(error));
            }
        }

        let request = self.store.create_request(CreateAcquisitionRequest {
            event_id: event.id.clone(),
            units: eligible.remaining_units,
            expected_cost_cents: eligible.expected_cost_cents,
            target_url: Some(target_url.clone()),
        })?;
        info!(
            request_id = %request.id,
            event_id = %event.id,
            units = request.units,
            expected_cost_cents = request.expected_cost_cents,
            "acquisition request created"
        );

        let cap = spend_cap_cents(request.expected_cost_cents, self.gate.max_overage_fraction());
        let instrument = match self.issuer.issue(&self.holder_id, cap).await {
            Ok(instrument) => instrument,
            Err(e) => {
                let error = format!("instrument issuance failed: {}", e);
                self.store
                    .update_state(&request.id, AcquisitionState::Failed { error: error.clone() })?;
                warn!(request_id = %request.id, error = %e, "issuance failed");
                return Ok(PurchaseOutcome::hard_failure(error));
            }
        };
        metrics::INSTRUMENTS_ISSUED.inc();

        let digest = identifying_digest(&instrument.id);
        self.store.update_state(
            &request.id,
            AcquisitionState::CardCreated {
                instrument_id: instrument.id.clone(),
                instrument_digest: digest.clone(),
            },
        )?;
        let request = self
            .store
            .update_state(&request.id, AcquisitionState::Purchasing)?;

        let outcome = self
            .run_strategy_chain(&request, event, &instrument, &target_url)
            .await;
        self.settle(&request, event, &instrument, &digest, outcome)
            .await
    }

    async fn run_strategy_chain(
        &self,
        request: &AcquisitionRequest,
        event: &Event,
        instrument: &Instrument,
        target_url: &str,
    ) -> PurchaseOutcome {
        let mut last = PurchaseOutcome::manual_handoff("no applicable purchase strategy");
        for strategy in &self.strategies {
            if !strategy.applies_to(target_url) {
                debug!(
                    request_id = %request.id,
                    strategy = strategy.name(),
                    "strategy does not apply to target"
                );
                continue;
            }

            debug!(request_id = %request.id, strategy = strategy.name(), "attempting strategy");
            let outcome = strategy.attempt(request, event, instrument).await;
            let label = if outcome.success {
                "purchased"
            } else if outcome.requires_manual_handoff {
                "handoff"
            } else {
                "failed"
            };
            metrics::STRATEGY_ATTEMPTS
                .with_label_values(&[strategy.name(), label])
                .inc();

            last = outcome;
            if last.is_terminal() {
                break;
            }
        }
        last
    }

    /// Apply the chain outcome to the request, the instrument and inventory.
    async fn settle(
        &self,
        request: &AcquisitionRequest,
        event: &Event,
        instrument: &Instrument,
        digest: &str,
        outcome: PurchaseOutcome,
    ) -> Result<PurchaseOutcome, OrchestratorError> {
        if outcome.success {
            let reference = outcome
                .confirmation_reference
                .clone()
                .unwrap_or_default();
            if reference.is_empty() {
                // A success without proof is treated as no success at all.
                let error = "strategy reported success without a confirmation reference".to_string();
                self.store
                    .update_state(&request.id, AcquisitionState::Failed { error: error.clone() })?;
                self.freeze_instrument(&instrument.id).await;
                error!(request_id = %request.id, "empty confirmation reference on success");
                return Ok(PurchaseOutcome::hard_failure(error));
            }

            let request = self.store.update_state(
                &request.id,
                AcquisitionState::Completed {
                    confirmation_reference: reference,
                },
            )?;
            self.freeze_instrument(&instrument.id).await;

            match self.materializer.materialize(&request) {
                Ok(units) => {
                    metrics::INVENTORY_UNITS_CREATED.inc_by(units.len() as u64);
                }
                // The purchase settled; materialization is retryable from
                // the request row, so it never unwinds a completed state.
                Err(e) => {
                    error!(request_id = %request.id, error = %e, "inventory materialization failed")
                }
            }

            info!(request_id = %request.id, event_id = %event.id, "acquisition completed");
            return Ok(outcome);
        }

        if outcome.requires_manual_handoff {
            // Rest in CardCreated with the instrument live so a human can
            // finish the purchase.
            self.store.update_state(
                &request.id,
                AcquisitionState::CardCreated {
                    instrument_id: instrument.id.clone(),
                    instrument_digest: digest.to_string(),
                },
            )?;
            info!(request_id = %request.id, "acquisition awaiting manual completion");
            return Ok(outcome);
        }

        let error = outcome
            .error
            .clone()
            .unwrap_or_else(|| "purchase failed".to_string());
        self.store
            .update_state(&request.id, AcquisitionState::Failed { error })?;
        self.freeze_instrument(&instrument.id).await;
        warn!(request_id = %request.id, error = ?outcome.error, "acquisition failed");
        Ok(outcome)
    }

    async fn freeze_instrument(&self, instrument_id: &str) {
        match self.issuer.freeze(instrument_id).await {
            Ok(()) => {
                metrics::INSTRUMENTS_FROZEN.inc();
            }
            // The spend cap still bounds exposure if the freeze is lost.
            Err(e) => {
                warn!(instrument_id, error = %e, "instrument freeze failed");
            }
        }
    }
}
