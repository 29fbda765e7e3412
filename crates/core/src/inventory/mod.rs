//! Inventory materialization: turn a completed acquisition into
//! redistributable ticket units, each traced back to a funding record.

use std::sync::Arc;

use tracing::{info, warn};

use crate::store::{
    AcquisitionRequest, AcquisitionStatus, AcquisitionStore, FundingRecord, InventoryUnit,
    NewInventoryUnit, StoreError,
};

/// Creates inventory units for completed acquisition requests.
pub struct InventoryMaterializer {
    store: Arc<dyn AcquisitionStore>,
}

impl InventoryMaterializer {
    pub fn new(store: Arc<dyn AcquisitionStore>) -> Self {
        Self { store }
    }

    /// Create one inventory unit per acquired unit, assigning each to a
    /// verified funding record oldest-verification-first.
    ///
    /// A funding record's capacity is its declared unit count minus the
    /// units already assigned to it by earlier acquisitions. If the request
    /// exceeds the total remaining capacity (funding arithmetic drifted),
    /// the overflow is pinned to the newest verified record and logged.
    pub fn materialize(
        &self,
        request: &AcquisitionRequest,
    ) -> Result<Vec<InventoryUnit>, StoreError> {
        if request.status != AcquisitionStatus::Completed {
            return Err(StoreError::InvalidRequest(format!(
                "cannot materialize inventory for request {} in status {}",
                request.id,
                request.status.as_str()
            )));
        }

        let mut verified: Vec<FundingRecord> = self
            .store
            .funding_records(&request.event_id)?
            .into_iter()
            .filter(|r| r.is_verified())
            .collect();
        verified.sort_by_key(|r| r.verified_at.unwrap_or(r.created_at));

        if verified.is_empty() {
            return Err(StoreError::InvalidRequest(format!(
                "no verified funding records for event {}",
                request.event_id
            )));
        }

        // Capacity already consumed per record by earlier acquisitions.
        let existing = self.store.inventory_units(&request.event_id)?;
        let used = |record_id: &str| -> i64 {
            existing
                .iter()
                .filter(|u| u.funding_record_id == record_id)
                .count() as i64
        };

        let mut capacities: Vec<(String, i64)> = verified
            .iter()
            .map(|r| (r.id.clone(), (r.units - used(&r.id)).max(0)))
            .collect();

        let mut units = Vec::with_capacity(request.units as usize);
        for _ in 0..request.units {
            let record_id = match capacities.iter().position(|(_, cap)| *cap > 0) {
                Some(i) => {
                    capacities[i].1 -= 1;
                    capacities[i].0.clone()
                }
                None => {
                    // Last resort, should not happen when funding and
                    // acquisition stay in step.
                    let newest = capacities[capacities.len() - 1].0.clone();
                    warn!(
                        request_id = %request.id,
                        funding_record_id = %newest,
                        "funding capacity exhausted, assigning overflow unit to newest record"
                    );
                    newest
                }
            };

            units.push(self.store.insert_inventory_unit(NewInventoryUnit {
                event_id: request.event_id.clone(),
                funding_record_id: record_id,
                acquisition_request_id: request.id.clone(),
            })?);
        }

        info!(
            request_id = %request.id,
            event_id = %request.event_id,
            units = units.len(),
            "inventory materialized"
        );
        Ok(units)
    }
}
