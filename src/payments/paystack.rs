use crate::errors::ServiceError;
use crate::payments::descriptor::{
    parse_metadata, CheckoutMetadata, InitializedPayment, PaymentDescriptor, PaymentProvider,
    VerifiedStatus,
};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use std::time::Duration;
use tracing::instrument;

type HmacSha512 = Hmac<Sha512>;

/// Paystack API client. Webhook authenticity is an HMAC-SHA512 of the raw
/// request body under the account secret key, carried in the
/// `x-paystack-signature` header; amounts are charged in minor units.
#[derive(Clone)]
pub struct PaystackClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct InitializeRequest<'a> {
    email: &'a str,
    /// Minor units (kobo for NGN).
    amount: i64,
    reference: &'a str,
    currency: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_url: Option<&'a str>,
    metadata: &'a CheckoutMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct InitializeData {
    authorization_url: String,
    reference: String,
}

/// Transaction shape shared by the `charge.success` webhook payload and the
/// verify endpoint's `data` object.
#[derive(Debug, Default, Deserialize)]
pub struct PaystackTransaction {
    pub reference: String,
    pub status: String,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl PaystackTransaction {
    pub fn into_descriptor(self) -> PaymentDescriptor {
        let verified_status = if self.status == "success" {
            VerifiedStatus::Success
        } else {
            VerifiedStatus::Other
        };

        PaymentDescriptor {
            provider: PaymentProvider::Paystack,
            reference: self.reference,
            verified_status,
            metadata: parse_metadata(self.metadata),
            paid_at: self.paid_at,
        }
    }
}

/// Webhook envelope; `data` stays untyped until the event type is known
/// because non-charge events carry different shapes.
#[derive(Debug, Deserialize)]
pub struct PaystackEvent {
    pub event: String,
    pub data: serde_json::Value,
}

impl PaystackEvent {
    pub fn from_body(payload: &[u8]) -> Result<Self, ServiceError> {
        serde_json::from_slice(payload)
            .map_err(|e| ServiceError::InvalidInput(format!("invalid webhook payload: {}", e)))
    }

    pub fn into_transaction(self) -> Result<PaystackTransaction, ServiceError> {
        serde_json::from_value(self.data)
            .map_err(|e| ServiceError::InvalidInput(format!("invalid charge payload: {}", e)))
    }
}

impl PaystackClient {
    pub fn new(
        secret_key: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key,
        })
    }

    /// Creates a transaction for the resolved cart total and returns the
    /// authorization URL the client is redirected to.
    #[instrument(skip(self, metadata), fields(reference))]
    pub async fn initialize_transaction(
        &self,
        email: &str,
        total: Decimal,
        currency: &str,
        reference: &str,
        callback_url: Option<&str>,
        metadata: &CheckoutMetadata,
    ) -> Result<InitializedPayment, ServiceError> {
        let body = InitializeRequest {
            email,
            amount: to_minor_units(total)?,
            reference,
            currency,
            callback_url,
            metadata,
        };

        let response = self
            .http
            .post(format!("{}/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "paystack initialize returned {}",
                response.status()
            )));
        }

        let envelope: Envelope<InitializeData> = response.json().await?;
        let data = match (envelope.status, envelope.data) {
            (true, Some(data)) => data,
            _ => {
                return Err(ServiceError::PaymentFailed(
                    envelope
                        .message
                        .unwrap_or_else(|| "paystack rejected the transaction".to_string()),
                ))
            }
        };

        Ok(InitializedPayment {
            reference: data.reference,
            authorization_url: data.authorization_url,
        })
    }

    /// Server-to-server status check. `Ok(None)` means Paystack does not
    /// know the reference.
    #[instrument(skip(self))]
    pub async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<Option<PaymentDescriptor>, ServiceError> {
        let response = self
            .http
            .get(format!("{}/transaction/verify/{}", self.base_url, reference))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "paystack verify returned {}",
                response.status()
            )));
        }

        let envelope: Envelope<PaystackTransaction> = response.json().await?;
        match (envelope.status, envelope.data) {
            (true, Some(transaction)) => Ok(Some(transaction.into_descriptor())),
            _ => Ok(None),
        }
    }

    /// Constant-time verification of the raw body signature. Must run before
    /// any JSON parsing of the payload.
    pub fn verify_webhook_signature(&self, payload: &[u8], signature_header: &str) -> bool {
        let Ok(signature) = hex::decode(signature_header.trim()) else {
            return false;
        };
        let Ok(mut mac) = HmacSha512::new_from_slice(self.secret_key.as_bytes()) else {
            return false;
        };
        mac.update(payload);
        mac.verify_slice(&signature).is_ok()
    }
}

fn to_minor_units(total: Decimal) -> Result<i64, ServiceError> {
    (total * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| {
            ServiceError::InternalError(format!("cart total {} overflows minor units", total))
        })
}
