//! Purchase strategy chain types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::instrument::Instrument;
use crate::store::{AcquisitionRequest, Event};

/// Result of one strategy attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseOutcome {
    /// Whether the purchase completed.
    pub success: bool,
    /// Vendor confirmation reference on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_reference: Option<String>,
    /// What went wrong, on failure or handoff.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether a human can still finish this purchase. A handoff lets the
    /// chain continue; a hard failure stops it.
    pub requires_manual_handoff: bool,
}

impl PurchaseOutcome {
    /// The purchase settled with the given confirmation reference.
    pub fn purchased(reference: impl Into<String>) -> Self {
        Self {
            success: true,
            confirmation_reference: Some(reference.into()),
            error: None,
            requires_manual_handoff: false,
        }
    }

    /// The purchase must not proceed at all (policy violation, bad target).
    pub fn hard_failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            confirmation_reference: None,
            error: Some(error.into()),
            requires_manual_handoff: false,
        }
    }

    /// This strategy cannot finish, but a later strategy or a human can.
    pub fn manual_handoff(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            confirmation_reference: None,
            error: Some(reason.into()),
            requires_manual_handoff: true,
        }
    }

    /// Whether the chain should stop after this outcome.
    pub fn is_terminal(&self) -> bool {
        self.success || !self.requires_manual_handoff
    }
}

/// One way of turning an issued instrument into purchased tickets.
///
/// Strategies are tried in configuration order; the first terminal outcome
/// wins.
#[async_trait]
pub trait PurchaseStrategy: Send + Sync {
    /// Strategy name for logging and metrics.
    fn name(&self) -> &str;

    /// Whether this strategy can operate on the given target URL.
    fn applies_to(&self, target_url: &str) -> bool;

    /// Attempt the purchase. Never panics; every failure mode maps to an
    /// outcome.
    async fn attempt(
        &self,
        request: &AcquisitionRequest,
        event: &Event,
        instrument: &Instrument,
    ) -> PurchaseOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purchased_is_terminal() {
        let outcome = PurchaseOutcome::purchased("ORD-1");
        assert!(outcome.success);
        assert!(outcome.is_terminal());
        assert_eq!(outcome.confirmation_reference.as_deref(), Some("ORD-1"));
    }

    #[test]
    fn test_hard_failure_is_terminal() {
        let outcome = PurchaseOutcome::hard_failure("blocklisted");
        assert!(!outcome.success);
        assert!(outcome.is_terminal());
        assert!(!outcome.requires_manual_handoff);
    }

    #[test]
    fn test_manual_handoff_continues_chain() {
        let outcome = PurchaseOutcome::manual_handoff("no purchasable class");
        assert!(!outcome.is_terminal());
        assert!(outcome.requires_manual_handoff);
    }
}
