//! Payment instrument types and the issuer service trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::fraud::ceiling_cents;

/// A single-use payment instrument issued for one acquisition.
///
/// Carries no full credential; sensitive details are fetched separately and
/// never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instrument {
    /// Issuer-side instrument id.
    pub id: String,
    /// Masked identifier safe for logs and notifications (e.g. "****4242").
    pub masked_identifier: String,
}

/// Full instrument credentials, held in memory only for the duration of a
/// payment submission.
#[derive(Clone, Serialize, Deserialize)]
pub struct InstrumentDetails {
    pub number: String,
    pub expiry_month: u8,
    pub expiry_year: u16,
    pub cvc: String,
}

// Keep credentials out of debug output.
impl std::fmt::Debug for InstrumentDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentDetails")
            .field("number", &"<redacted>")
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("cvc", &"<redacted>")
            .finish()
    }
}

/// Error type for issuer operations.
#[derive(Debug, Error)]
pub enum IssuerError {
    #[error("Issuer API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to connect to issuer: {0}")]
    ConnectionFailed(String),

    #[error("Issuer request timed out")]
    Timeout,

    #[error("Invalid issuer response: {0}")]
    InvalidResponse(String),
}

/// Trait for payment instrument issuance providers.
#[async_trait]
pub trait InstrumentIssuer: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Issue a new instrument with a hard spend cap.
    async fn issue(&self, holder_id: &str, max_spend_cents: i64)
        -> Result<Instrument, IssuerError>;

    /// Retrieve the full credentials of an instrument.
    async fn retrieve_details(&self, instrument_id: &str)
        -> Result<InstrumentDetails, IssuerError>;

    /// Permanently freeze an instrument so no further charges clear.
    async fn freeze(&self, instrument_id: &str) -> Result<(), IssuerError>;
}

/// Spend cap for an expected cost: face cost plus the tolerated overage,
/// rounded up so the cap never undercuts an in-tolerance price.
pub fn spend_cap_cents(expected_cost_cents: i64, overage_fraction: f64) -> i64 {
    ceiling_cents(expected_cost_cents, overage_fraction)
}

/// Short identifying digest of an instrument id, safe to persist on the
/// request row.
pub fn identifying_digest(instrument_id: &str) -> String {
    let digest = Sha256::digest(instrument_id.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spend_cap() {
        // $400 expected at 15% overage caps at $460.
        assert_eq!(spend_cap_cents(40_000, 0.15), 46_000);
        assert_eq!(spend_cap_cents(0, 0.15), 0);
        // Fractional cents round up.
        assert_eq!(spend_cap_cents(3_333, 0.15), 3_833);
    }

    #[test]
    fn test_identifying_digest_is_stable_and_short() {
        let a = identifying_digest("ins-1");
        let b = identifying_digest("ins-1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert_ne!(a, identifying_digest("ins-2"));
    }

    #[test]
    fn test_details_debug_redacts_credentials() {
        let details = InstrumentDetails {
            number: "4242424242424242".to_string(),
            expiry_month: 12,
            expiry_year: 2030,
            cvc: "123".to_string(),
        };
        let debug = format!("{:?}", details);
        assert!(!debug.contains("4242"));
        assert!(!debug.contains("123"));
        assert!(debug.contains("<redacted>"));
    }
}
