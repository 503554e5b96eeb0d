use crate::errors::ServiceError;
use crate::payments::descriptor::{
    parse_metadata, CheckoutMetadata, InitializedPayment, PaymentDescriptor, PaymentProvider,
    VerifiedStatus,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::instrument;

/// Flutterwave API client. Webhooks carry a static `verif-hash` header that
/// only proves the sender knows the configured hash; the reported status is
/// therefore re-verified with a server-to-server call before reconciliation
/// trusts it.
#[derive(Clone)]
pub struct FlutterwaveClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
    secret_hash: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct PaymentRequest<'a> {
    tx_ref: &'a str,
    amount: Decimal,
    currency: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_url: Option<&'a str>,
    customer: CustomerInfo<'a>,
    meta: &'a CheckoutMetadata,
}

#[derive(Debug, Serialize)]
struct CustomerInfo<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phonenumber: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
struct PaymentData {
    link: String,
}

/// Transaction shape returned by the verify endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct FlutterwaveTransaction {
    pub tx_ref: String,
    pub status: String,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

impl FlutterwaveTransaction {
    pub fn into_descriptor(self) -> PaymentDescriptor {
        let verified_status = if self.status == "successful" {
            VerifiedStatus::Success
        } else {
            VerifiedStatus::Other
        };

        PaymentDescriptor {
            provider: PaymentProvider::Flutterwave,
            reference: self.tx_ref,
            verified_status,
            metadata: parse_metadata(self.meta),
            // Flutterwave reports non-RFC3339 timestamps; the materializer
            // stamps paid_at itself.
            paid_at: None,
        }
    }
}

/// Webhook envelope. Only the reference is read from the push payload; the
/// status that drives reconciliation comes from the verify call.
#[derive(Debug, Deserialize)]
pub struct FlutterwaveEvent {
    pub event: String,
    pub data: FlutterwaveEventData,
}

#[derive(Debug, Deserialize)]
pub struct FlutterwaveEventData {
    #[serde(alias = "txRef")]
    pub tx_ref: String,
}

impl FlutterwaveEvent {
    pub fn from_body(payload: &[u8]) -> Result<Self, ServiceError> {
        serde_json::from_slice(payload)
            .map_err(|e| ServiceError::InvalidInput(format!("invalid webhook payload: {}", e)))
    }
}

impl FlutterwaveClient {
    pub fn new(
        secret_key: String,
        secret_hash: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
            secret_hash,
        })
    }

    /// Creates a hosted-payment transaction and returns the checkout link.
    #[instrument(skip(self, metadata), fields(reference))]
    pub async fn initialize_payment(
        &self,
        email: &str,
        name: Option<&str>,
        phone: Option<&str>,
        total: Decimal,
        currency: &str,
        reference: &str,
        redirect_url: Option<&str>,
        metadata: &CheckoutMetadata,
    ) -> Result<InitializedPayment, ServiceError> {
        let body = PaymentRequest {
            tx_ref: reference,
            amount: total,
            currency,
            redirect_url,
            customer: CustomerInfo {
                email,
                name,
                phonenumber: phone,
            },
            meta: metadata,
        };

        let response = self
            .http
            .post(format!("{}/v3/payments", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "flutterwave initialize returned {}",
                response.status()
            )));
        }

        let envelope: Envelope<PaymentData> = response.json().await?;
        let data = match (envelope.status.as_str(), envelope.data) {
            ("success", Some(data)) => data,
            _ => {
                return Err(ServiceError::PaymentFailed(
                    envelope
                        .message
                        .unwrap_or_else(|| "flutterwave rejected the transaction".to_string()),
                ))
            }
        };

        Ok(InitializedPayment {
            reference: reference.to_string(),
            authorization_url: data.link,
        })
    }

    /// Server-to-server status check by reference. `Ok(None)` means
    /// Flutterwave does not know the reference.
    #[instrument(skip(self))]
    pub async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<Option<PaymentDescriptor>, ServiceError> {
        let response = self
            .http
            .get(format!(
                "{}/v3/transactions/verify_by_reference",
                self.base_url
            ))
            .query(&[("tx_ref", reference)])
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "flutterwave verify returned {}",
                response.status()
            )));
        }

        let envelope: Envelope<FlutterwaveTransaction> = response.json().await?;
        match (envelope.status.as_str(), envelope.data) {
            ("success", Some(transaction)) => Ok(Some(transaction.into_descriptor())),
            _ => Ok(None),
        }
    }

    /// Constant-time check of the `verif-hash` header against the configured
    /// hash. Runs before any parsing of the payload.
    pub fn verify_webhook_hash(&self, header_value: Option<&str>) -> bool {
        match header_value {
            Some(value) => constant_time_eq(value.as_bytes(), self.secret_hash.as_bytes()),
            None => false,
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b) {
        acc |= x ^ y;
    }
    acc == 0
}
