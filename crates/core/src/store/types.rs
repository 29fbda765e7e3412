//! Core acquisition data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A published event tickets can be acquired for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Event id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Venue name, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    /// When the event takes place.
    pub starts_at: DateTime<Utc>,
    /// Only published events are considered for acquisition.
    pub published: bool,
    /// Artist/venue-set nominal ticket price in minor units (cents).
    pub face_value_cents: i64,
    /// Where tickets are sold. Optional; without it no strategy can run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
}

/// A contribution toward an event's acquisition cost.
///
/// Only records with a verified external settlement proof count as funding;
/// everything else is excluded from eligibility sums.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FundingRecord {
    /// Record id.
    pub id: String,
    /// Event the contribution targets.
    pub event_id: String,
    /// Ticket units this contribution covers.
    pub units: i64,
    /// Contributed amount in cents.
    pub amount_cents: i64,
    /// Reference to the external payment settlement proof.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement_ref: Option<String>,
    /// Whether the settlement proof has been verified.
    pub settlement_verified: bool,
    /// When the settlement was verified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    /// When the contribution was recorded.
    pub created_at: DateTime<Utc>,
}

impl FundingRecord {
    /// A record with no settlement proof is never counted as funding.
    pub fn is_verified(&self) -> bool {
        self.settlement_verified && self.settlement_ref.is_some()
    }
}

/// Input for recording a new contribution.
#[derive(Debug, Clone)]
pub struct NewFundingRecord {
    pub event_id: String,
    pub units: i64,
    pub amount_cents: i64,
    pub settlement_ref: Option<String>,
    pub settlement_verified: bool,
}

/// Status of an acquisition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionStatus {
    /// Created, no instrument yet.
    Pending,
    /// Instrument issued. Also the resting state for manual handoff.
    CardCreated,
    /// Strategy chain executing.
    Purchasing,
    /// Purchase confirmed, inventory materialized. Terminal.
    Completed,
    /// No further action possible. Terminal.
    Failed,
}

impl AcquisitionStatus {
    /// Returns the string representation used in the database and filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionStatus::Pending => "pending",
            AcquisitionStatus::CardCreated => "card_created",
            AcquisitionStatus::Purchasing => "purchasing",
            AcquisitionStatus::Completed => "completed",
            AcquisitionStatus::Failed => "failed",
        }
    }

    /// Terminal states are immutable.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AcquisitionStatus::Completed | AcquisitionStatus::Failed)
    }

    /// Legal transitions of the acquisition state machine.
    pub fn can_transition_to(&self, next: AcquisitionStatus) -> bool {
        use AcquisitionStatus::*;
        matches!(
            (self, next),
            (Pending, CardCreated)
                | (Pending, Failed)
                | (CardCreated, Purchasing)
                | (CardCreated, Failed)
                | (Purchasing, Completed)
                | (Purchasing, CardCreated)
                | (Purchasing, Failed)
        )
    }
}

/// A state transition with the data it carries onto the request row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AcquisitionState {
    Pending,
    CardCreated {
        instrument_id: String,
        instrument_digest: String,
    },
    Purchasing,
    Completed {
        confirmation_reference: String,
    },
    Failed {
        error: String,
    },
}

impl AcquisitionState {
    /// The status this state maps to.
    pub fn status(&self) -> AcquisitionStatus {
        match self {
            AcquisitionState::Pending => AcquisitionStatus::Pending,
            AcquisitionState::CardCreated { .. } => AcquisitionStatus::CardCreated,
            AcquisitionState::Purchasing => AcquisitionStatus::Purchasing,
            AcquisitionState::Completed { .. } => AcquisitionStatus::Completed,
            AcquisitionState::Failed { .. } => AcquisitionStatus::Failed,
        }
    }
}

/// One attempt to acquire a batch of tickets for an event.
///
/// Never deleted; retained as an audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AcquisitionRequest {
    /// Request id.
    pub id: String,
    /// Event being acquired for.
    pub event_id: String,
    /// Units requested (always > 0).
    pub units: i64,
    /// Expected total cost in cents (units × face value).
    pub expected_cost_cents: i64,
    /// Target source URL at creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    /// Current status.
    pub status: AcquisitionStatus,
    /// Assigned payment instrument, once issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument_id: Option<String>,
    /// Identifying digest of the instrument (never the full credential).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument_digest: Option<String>,
    /// Vendor confirmation reference, once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_reference: Option<String>,
    /// Error detail, once failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to create a new acquisition request.
#[derive(Debug, Clone)]
pub struct CreateAcquisitionRequest {
    pub event_id: String,
    pub units: i64,
    pub expected_cost_cents: i64,
    pub target_url: Option<String>,
}

/// Filter for querying acquisition requests.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    /// Filter by event.
    pub event_id: Option<String>,
    /// Filter by status.
    pub status: Option<AcquisitionStatus>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl RequestFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            event_id: None,
            status: None,
            limit: 100,
            offset: 0,
        }
    }

    /// Filter by event.
    pub fn with_event(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    /// Filter by status.
    pub fn with_status(mut self, status: AcquisitionStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Status of a redistributable inventory unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryStatus {
    /// Ready for redistribution.
    Available,
    /// Handed to an end user.
    Assigned,
}

impl InventoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryStatus::Available => "available",
            InventoryStatus::Assigned => "assigned",
        }
    }
}

/// One redistributable ticket, created only after a confirmed acquisition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryUnit {
    /// Unit id.
    pub id: String,
    /// Event the ticket is for.
    pub event_id: String,
    /// Funding record this unit traces back to.
    pub funding_record_id: String,
    /// Acquisition that produced the unit.
    pub acquisition_request_id: String,
    /// Current status.
    pub status: InventoryStatus,
    pub created_at: DateTime<Utc>,
}

/// Input for creating one inventory unit.
#[derive(Debug, Clone)]
pub struct NewInventoryUnit {
    pub event_id: String,
    pub funding_record_id: String,
    pub acquisition_request_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_as_str() {
        assert_eq!(AcquisitionStatus::Pending.as_str(), "pending");
        assert_eq!(AcquisitionStatus::CardCreated.as_str(), "card_created");
        assert_eq!(AcquisitionStatus::Purchasing.as_str(), "purchasing");
        assert_eq!(AcquisitionStatus::Completed.as_str(), "completed");
        assert_eq!(AcquisitionStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!AcquisitionStatus::Pending.is_terminal());
        assert!(!AcquisitionStatus::CardCreated.is_terminal());
        assert!(!AcquisitionStatus::Purchasing.is_terminal());
        assert!(AcquisitionStatus::Completed.is_terminal());
        assert!(AcquisitionStatus::Failed.is_terminal());
    }

    #[test]
    fn test_legal_transitions() {
        use AcquisitionStatus::*;
        assert!(Pending.can_transition_to(CardCreated));
        assert!(Pending.can_transition_to(Failed));
        assert!(CardCreated.can_transition_to(Purchasing));
        assert!(CardCreated.can_transition_to(Failed));
        assert!(Purchasing.can_transition_to(Completed));
        // Manual handoff rests back in CardCreated
        assert!(Purchasing.can_transition_to(CardCreated));
        assert!(Purchasing.can_transition_to(Failed));
    }

    #[test]
    fn test_no_backward_transitions_from_terminal() {
        use AcquisitionStatus::*;
        for next in [Pending, CardCreated, Purchasing, Completed, Failed] {
            assert!(!Completed.can_transition_to(next));
            assert!(!Failed.can_transition_to(next));
        }
    }

    #[test]
    fn test_state_maps_to_status() {
        let state = AcquisitionState::CardCreated {
            instrument_id: "ins-1".to_string(),
            instrument_digest: "abcd".to_string(),
        };
        assert_eq!(state.status(), AcquisitionStatus::CardCreated);
        assert_eq!(
            AcquisitionState::Purchasing.status(),
            AcquisitionStatus::Purchasing
        );
    }

    #[test]
    fn test_funding_record_verification() {
        let mut record = FundingRecord {
            id: "fr-1".to_string(),
            event_id: "ev-1".to_string(),
            units: 2,
            amount_cents: 10_000,
            settlement_ref: Some("stl_123".to_string()),
            settlement_verified: true,
            verified_at: Some(Utc::now()),
            created_at: Utc::now(),
        };
        assert!(record.is_verified());

        record.settlement_ref = None;
        assert!(!record.is_verified());

        record.settlement_ref = Some("stl_123".to_string());
        record.settlement_verified = false;
        assert!(!record.is_verified());
    }

    #[test]
    fn test_state_serialization_tag() {
        let state = AcquisitionState::Failed {
            error: "blocklisted".to_string(),
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"type\":\"failed\""));
        let parsed: AcquisitionState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }
}
