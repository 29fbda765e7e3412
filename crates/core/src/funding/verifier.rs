//! Funding verification: which events have verified money behind them, and
//! how many units that money covers.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::store::{AcquisitionStore, Event, StoreError};

/// An event with verified funding for at least one not-yet-acquired unit.
#[derive(Debug, Clone, PartialEq)]
pub struct EligibleEvent {
    pub event: Event,
    /// Fully funded units not yet covered by a live or completed request.
    pub remaining_units: i64,
    /// Expected cost of acquiring the remaining units, at face value.
    pub expected_cost_cents: i64,
}

/// Computes per-event acquisition eligibility from the funding ledger.
pub struct FundingVerifier {
    store: Arc<dyn AcquisitionStore>,
}

impl FundingVerifier {
    pub fn new(store: Arc<dyn AcquisitionStore>) -> Self {
        Self { store }
    }

    /// All published future events with at least one fundable unit remaining.
    pub fn find_eligible_events(&self) -> Result<Vec<EligibleEvent>, StoreError> {
        let events = self.store.list_open_events(Utc::now())?;
        let mut eligible = Vec::new();
        for event in events {
            if let Some(entry) = self.eligibility_for(&event)? {
                eligible.push(entry);
            }
        }
        Ok(eligible)
    }

    /// Eligibility for a single event, or `None` when no fully funded unit
    /// remains.
    ///
    /// Only verified contributions count. The funded unit count is the
    /// verified total divided by face value, rounded down. A partially
    /// funded unit is never acquired.
    pub fn eligibility_for(&self, event: &Event) -> Result<Option<EligibleEvent>, StoreError> {
        if event.face_value_cents <= 0 {
            warn!(
                event_id = %event.id,
                face_value_cents = event.face_value_cents,
                "event has a non-positive face value, skipping"
            );
            return Ok(None);
        }

        let records = self.store.funding_records(&event.id)?;
        let mut verified_cents = 0i64;
        let mut unverified = 0usize;
        for record in &records {
            if record.is_verified() {
                verified_cents += record.amount_cents;
            } else {
                unverified += 1;
            }
        }
        if unverified > 0 {
            warn!(
                event_id = %event.id,
                unverified,
                "funding records without settlement proof excluded from eligibility"
            );
        }

        let funded_units = verified_cents / event.face_value_cents;
        let acquired = self.store.acquired_units(&event.id)?;
        let remaining = (funded_units - acquired).max(0);

        debug!(
            event_id = %event.id,
            verified_cents,
            funded_units,
            acquired,
            remaining,
            "funding eligibility computed"
        );

        if remaining == 0 {
            return Ok(None);
        }

        Ok(Some(EligibleEvent {
            expected_cost_cents: remaining * event.face_value_cents,
            remaining_units: remaining,
            event: event.clone(),
        }))
    }
}
