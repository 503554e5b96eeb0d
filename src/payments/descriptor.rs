use crate::services::pricing::NormalizedCart;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Supported payment gateways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Paystack,
    Flutterwave,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Paystack => "paystack",
            Self::Flutterwave => "flutterwave",
        }
    }
}

impl fmt::Display for PaymentProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "paystack" => Ok(Self::Paystack),
            "flutterwave" => Ok(Self::Flutterwave),
            other => Err(format!("unknown payment provider: {}", other)),
        }
    }
}

/// Outcome of provider-side status checking, collapsed to the one question
/// reconciliation asks: did the charge definitely succeed?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifiedStatus {
    Success,
    Other,
}

/// Checkout context embedded as opaque metadata on the provider transaction
/// at initialization time, and replayed verbatim by webhooks and verify
/// calls. Carrying the priced cart here is what makes reconciliation immune
/// to catalog price changes between authorization and delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutMetadata {
    pub user_id: Uuid,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub cart: NormalizedCart,
}

/// Provider-agnostic view of one gateway notification or verify response.
/// Adapters build this at the boundary; everything past the boundary is
/// strongly typed.
#[derive(Debug, Clone)]
pub struct PaymentDescriptor {
    pub provider: PaymentProvider,
    pub reference: String,
    pub verified_status: VerifiedStatus,
    pub metadata: Option<CheckoutMetadata>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Result of creating a transaction with a provider.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InitializedPayment {
    pub reference: String,
    pub authorization_url: String,
}

/// Parses provider-echoed metadata back into the typed form. Providers
/// return whatever was stored, so anything non-conforming (manual dashboard
/// payments, older formats) degrades to None and is caught downstream by
/// materializer validation.
pub(crate) fn parse_metadata(value: Option<serde_json::Value>) -> Option<CheckoutMetadata> {
    let value = value?;
    if !value.is_object() {
        return None;
    }
    match serde_json::from_value(value) {
        Ok(meta) => Some(meta),
        Err(err) => {
            tracing::warn!("discarding unparseable transaction metadata: {}", err);
            None
        }
    }
}
