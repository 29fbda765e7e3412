//! Mock instrument issuer that records calls.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::instrument::{Instrument, InstrumentDetails, InstrumentIssuer, IssuerError};

/// One recorded `issue` call.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedInstrument {
    pub id: String,
    pub holder_id: String,
    pub max_spend_cents: i64,
}

/// Mock issuer with configurable failures and recorded calls.
pub struct MockInstrumentIssuer {
    issued: RwLock<Vec<IssuedInstrument>>,
    frozen: RwLock<Vec<String>>,
    fail_issue: RwLock<bool>,
    fail_details: RwLock<bool>,
    fail_freeze: RwLock<bool>,
}

impl MockInstrumentIssuer {
    pub fn new() -> Self {
        Self {
            issued: RwLock::new(Vec::new()),
            frozen: RwLock::new(Vec::new()),
            fail_issue: RwLock::new(false),
            fail_details: RwLock::new(false),
            fail_freeze: RwLock::new(false),
        }
    }

    pub async fn set_fail_issue(&self, fail: bool) {
        *self.fail_issue.write().await = fail;
    }

    pub async fn set_fail_details(&self, fail: bool) {
        *self.fail_details.write().await = fail;
    }

    pub async fn set_fail_freeze(&self, fail: bool) {
        *self.fail_freeze.write().await = fail;
    }

    /// All recorded `issue` calls.
    pub async fn issued(&self) -> Vec<IssuedInstrument> {
        self.issued.read().await.clone()
    }

    /// Ids of every frozen instrument.
    pub async fn frozen(&self) -> Vec<String> {
        self.frozen.read().await.clone()
    }
}

impl Default for MockInstrumentIssuer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InstrumentIssuer for MockInstrumentIssuer {
    fn name(&self) -> &str {
        "mock-issuer"
    }

    async fn issue(
        &self,
        holder_id: &str,
        max_spend_cents: i64,
    ) -> Result<Instrument, IssuerError> {
        if *self.fail_issue.read().await {
            return Err(IssuerError::Api {
                status: 503,
                message: "issuer unavailable".to_string(),
            });
        }

        let mut issued = self.issued.write().await;
        let id = format!("ins-{}", issued.len() + 1);
        issued.push(IssuedInstrument {
            id: id.clone(),
            holder_id: holder_id.to_string(),
            max_spend_cents,
        });

        Ok(Instrument {
            id,
            masked_identifier: "****4242".to_string(),
        })
    }

    async fn retrieve_details(
        &self,
        _instrument_id: &str,
    ) -> Result<InstrumentDetails, IssuerError> {
        if *self.fail_details.read().await {
            return Err(IssuerError::Api {
                status: 503,
                message: "issuer unavailable".to_string(),
            });
        }

        Ok(InstrumentDetails {
            number: "4242424242424242".to_string(),
            expiry_month: 12,
            expiry_year: 2030,
            cvc: "123".to_string(),
        })
    }

    async fn freeze(&self, instrument_id: &str) -> Result<(), IssuerError> {
        if *self.fail_freeze.read().await {
            return Err(IssuerError::Api {
                status: 503,
                message: "issuer unavailable".to_string(),
            });
        }

        self.frozen.write().await.push(instrument_id.to_string());
        Ok(())
    }
}
