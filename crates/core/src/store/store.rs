//! Acquisition storage trait and error type.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::{
    AcquisitionRequest, AcquisitionState, CreateAcquisitionRequest, Event, FundingRecord,
    InventoryUnit, NewFundingRecord, NewInventoryUnit, RequestFilter,
};

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Entity not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A non-terminal acquisition request already exists for the event.
    /// All work for one event is serialized through this invariant.
    #[error("acquisition already in flight for event {event_id}")]
    RequestInFlight { event_id: String },

    /// Illegal state machine transition.
    #[error("cannot move request {request_id} from {from} to {to}")]
    InvalidTransition {
        request_id: String,
        from: String,
        to: String,
    },

    /// Invalid input (e.g., zero units).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

/// Trait for acquisition storage backends.
///
/// Covers the funding store boundary: events and funding records written by
/// the (out of scope) ingestion pipeline, acquisition requests and inventory
/// units owned by the orchestrator.
pub trait AcquisitionStore: Send + Sync {
    // --- events ---

    /// Insert or replace an event.
    fn upsert_event(&self, event: &Event) -> Result<(), StoreError>;

    /// Get an event by id.
    fn get_event(&self, id: &str) -> Result<Option<Event>, StoreError>;

    /// List published events starting after `now`.
    fn list_open_events(&self, now: DateTime<Utc>) -> Result<Vec<Event>, StoreError>;

    // --- funding records ---

    /// Record a contribution.
    fn add_funding_record(&self, record: NewFundingRecord) -> Result<FundingRecord, StoreError>;

    /// All funding records for an event, oldest first.
    fn funding_records(&self, event_id: &str) -> Result<Vec<FundingRecord>, StoreError>;

    // --- acquisition requests ---

    /// Create a new acquisition request in `Pending`.
    ///
    /// Fails with [`StoreError::RequestInFlight`] if the event already has a
    /// non-terminal request.
    fn create_request(
        &self,
        request: CreateAcquisitionRequest,
    ) -> Result<AcquisitionRequest, StoreError>;

    /// Get a request by id.
    fn get_request(&self, id: &str) -> Result<Option<AcquisitionRequest>, StoreError>;

    /// List requests matching the filter, newest first.
    fn list_requests(&self, filter: &RequestFilter) -> Result<Vec<AcquisitionRequest>, StoreError>;

    /// Apply a state transition, enforcing the state machine rules.
    fn update_state(
        &self,
        id: &str,
        new_state: AcquisitionState,
    ) -> Result<AcquisitionRequest, StoreError>;

    /// Units already acquired for an event: sum across requests whose status
    /// is anything but `Failed`.
    fn acquired_units(&self, event_id: &str) -> Result<i64, StoreError>;

    // --- inventory units ---

    /// Create one inventory unit in `Available`.
    fn insert_inventory_unit(&self, unit: NewInventoryUnit) -> Result<InventoryUnit, StoreError>;

    /// All inventory units for an event.
    fn inventory_units(&self, event_id: &str) -> Result<Vec<InventoryUnit>, StoreError>;

    /// Number of units produced by one acquisition request.
    fn count_inventory_for_request(&self, request_id: &str) -> Result<i64, StoreError>;
}
