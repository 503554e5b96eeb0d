pub mod descriptor;
pub mod flutterwave;
pub mod paystack;

pub use descriptor::{
    CheckoutMetadata, InitializedPayment, PaymentDescriptor, PaymentProvider, VerifiedStatus,
};
pub use flutterwave::FlutterwaveClient;
pub use paystack::PaystackClient;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use std::time::Duration;

/// Both gateway clients, built once from config and shared by handlers.
#[derive(Clone)]
pub struct PaymentGateways {
    pub paystack: PaystackClient,
    pub flutterwave: FlutterwaveClient,
}

impl PaymentGateways {
    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        let timeout = Duration::from_secs(config.provider_timeout_secs);

        Ok(Self {
            paystack: PaystackClient::new(
                config.paystack_secret_key.clone(),
                config.paystack_base_url.clone(),
                timeout,
            )?,
            flutterwave: FlutterwaveClient::new(
                config.flutterwave_secret_key.clone(),
                config.flutterwave_secret_hash.clone(),
                config.flutterwave_base_url.clone(),
                timeout,
            )?,
        })
    }
}
