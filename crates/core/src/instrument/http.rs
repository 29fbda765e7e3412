//! HTTP adapter for the instrument issuance provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::IssuerConfig;

use super::{Instrument, InstrumentDetails, InstrumentIssuer, IssuerError};

/// Instrument issuer backed by the provider's REST API.
pub struct HttpInstrumentIssuer {
    client: Client,
    config: IssuerConfig,
}

impl HttpInstrumentIssuer {
    /// Create a new issuer client with the given configuration.
    pub fn new(config: IssuerConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn map_send_error(e: reqwest::Error) -> IssuerError {
        if e.is_timeout() {
            IssuerError::Timeout
        } else if e.is_connect() {
            IssuerError::ConnectionFailed(e.to_string())
        } else {
            IssuerError::Api {
                status: 0,
                message: e.to_string(),
            }
        }
    }

    async fn error_from_response(response: reqwest::Response) -> IssuerError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        IssuerError::Api {
            status,
            message: body.chars().take(200).collect(),
        }
    }
}

#[derive(Serialize)]
struct IssueRequest<'a> {
    holder_id: &'a str,
    max_spend_cents: i64,
    single_use: bool,
}

#[derive(Deserialize)]
struct IssueResponse {
    id: String,
    masked_identifier: String,
}

#[derive(Deserialize)]
struct DetailsResponse {
    number: String,
    expiry_month: u8,
    expiry_year: u16,
    cvc: String,
}

#[async_trait]
impl InstrumentIssuer for HttpInstrumentIssuer {
    fn name(&self) -> &str {
        "http-issuer"
    }

    async fn issue(
        &self,
        holder_id: &str,
        max_spend_cents: i64,
    ) -> Result<Instrument, IssuerError> {
        debug!(holder_id, max_spend_cents, "issuing payment instrument");

        let response = self
            .client
            .post(self.url("/v1/instruments"))
            .bearer_auth(&self.config.api_key)
            .json(&IssueRequest {
                holder_id,
                max_spend_cents,
                single_use: true,
            })
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let issued: IssueResponse = response
            .json()
            .await
            .map_err(|e| IssuerError::InvalidResponse(e.to_string()))?;

        Ok(Instrument {
            id: issued.id,
            masked_identifier: issued.masked_identifier,
        })
    }

    async fn retrieve_details(
        &self,
        instrument_id: &str,
    ) -> Result<InstrumentDetails, IssuerError> {
        let response = self
            .client
            .get(self.url(&format!(
                "/v1/instruments/{}/details",
                urlencoding::encode(instrument_id)
            )))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        let details: DetailsResponse = response
            .json()
            .await
            .map_err(|e| IssuerError::InvalidResponse(e.to_string()))?;

        Ok(InstrumentDetails {
            number: details.number,
            expiry_month: details.expiry_month,
            expiry_year: details.expiry_year,
            cvc: details.cvc,
        })
    }

    async fn freeze(&self, instrument_id: &str) -> Result<(), IssuerError> {
        debug!(instrument_id, "freezing payment instrument");

        let response = self
            .client
            .post(self.url(&format!(
                "/v1/instruments/{}/freeze",
                urlencoding::encode(instrument_id)
            )))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        Ok(())
    }
}
