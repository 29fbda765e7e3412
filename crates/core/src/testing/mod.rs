//! Test doubles and fixtures shared by unit and integration tests.

mod mock_browser;
mod mock_issuer;
mod mock_notifier;
mod mock_vendor;

pub use mock_browser::MockBrowserEngine;
pub use mock_issuer::{IssuedInstrument, MockInstrumentIssuer};
pub use mock_notifier::MockNotifier;
pub use mock_vendor::{MockVendorApi, RecordedOrder};

/// Canned domain objects for tests.
pub mod fixtures {
    use chrono::{Duration, Utc};

    use crate::instrument::Instrument;
    use crate::store::{AcquisitionRequest, AcquisitionStatus, Event};

    pub fn event(id: &str, face_value_cents: i64) -> Event {
        Event {
            id: id.to_string(),
            name: "Midnight Choir: World Tour".to_string(),
            venue: Some("Velvet Hall".to_string()),
            starts_at: Utc::now() + Duration::days(30),
            published: true,
            face_value_cents,
            target_url: Some("https://tickets.example.com/midnight-choir".to_string()),
        }
    }

    /// A request as the strategy chain sees it: instrument assigned, in
    /// `Purchasing`.
    pub fn acquisition_request(
        event_id: &str,
        units: i64,
        expected_cost_cents: i64,
    ) -> AcquisitionRequest {
        AcquisitionRequest {
            id: uuid::Uuid::new_v4().to_string(),
            event_id: event_id.to_string(),
            units,
            expected_cost_cents,
            target_url: Some("https://tickets.example.com/midnight-choir".to_string()),
            status: AcquisitionStatus::Purchasing,
            instrument_id: Some("ins-1".to_string()),
            instrument_digest: Some("a1b2c3d4e5f6".to_string()),
            confirmation_reference: None,
            error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn instrument() -> Instrument {
        Instrument {
            id: "ins-1".to_string(),
            masked_identifier: "****4242".to_string(),
        }
    }
}
