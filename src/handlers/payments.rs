use crate::{
    entities::order,
    errors::ServiceError,
    handlers::AppState,
    payments::{CheckoutMetadata, PaymentProvider},
    services::{pricing::CartLineInput, reconciliation::ReconcileOutcome},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InitializePaymentRequest {
    pub provider: PaymentProvider,
    /// Authenticated customer identity (token verification happens upstream)
    pub user_id: Uuid,
    #[validate(email)]
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    /// Product ids and quantities only; prices are recomputed server-side
    #[validate(length(min = 1))]
    pub cart: Vec<CartLineInput>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InitializePaymentResponse {
    pub provider: PaymentProvider,
    pub reference: String,
    pub authorization_url: String,
    /// Server-resolved amount the provider was asked to authorize
    pub total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStatus {
    AlreadyProcessed,
    Processed,
    InProgress,
    NotSuccess,
    Unknown,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyPaymentResponse {
    pub status: VerifyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderSummary {
    pub id: Uuid,
    pub order_number: String,
    pub payment_reference: Option<String>,
    pub payment_provider: Option<String>,
    pub payment_status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub status: i32,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<order::Model> for OrderSummary {
    fn from(order: order::Model) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            payment_reference: order.payment_reference,
            payment_provider: order.payment_provider,
            payment_status: order.payment_status,
            paid_at: order.paid_at,
            status: order.status,
            total: order.total,
            created_at: order.created_at,
        }
    }
}

impl VerifyPaymentResponse {
    fn from_outcome(outcome: ReconcileOutcome) -> Self {
        match outcome {
            ReconcileOutcome::Processed(order) => Self {
                status: VerifyStatus::Processed,
                order: Some(order.into()),
            },
            ReconcileOutcome::AlreadyProcessed(order) => Self {
                status: VerifyStatus::AlreadyProcessed,
                order: Some(order.into()),
            },
            ReconcileOutcome::InProgress => Self {
                status: VerifyStatus::InProgress,
                order: None,
            },
            ReconcileOutcome::NotSuccessful => Self {
                status: VerifyStatus::NotSuccess,
                order: None,
            },
        }
    }
}

// POST /api/v1/payments/initialize
#[utoipa::path(
    post,
    path = "/api/v1/payments/initialize",
    request_body = InitializePaymentRequest,
    responses(
        (status = 200, description = "Transaction created", body = InitializePaymentResponse),
        (status = 400, description = "Invalid cart or customer data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product in cart", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment provider unreachable", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn initialize_payment(
    State(state): State<AppState>,
    Json(req): Json<InitializePaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    req.validate()?;
    if req.user_id.is_nil() {
        return Err(ServiceError::InvalidInput("user id is required".to_string()));
    }

    // Authoritative prices; whatever the client thinks things cost is gone
    // by this point.
    let cart = state.services.pricing.resolve(&req.cart).await?;

    let reference = format!("SF-{}", Uuid::new_v4().simple());
    let metadata = CheckoutMetadata {
        user_id: req.user_id,
        email: req.email.clone(),
        name: req.name,
        phone: req.phone,
        address: req.address,
        cart: cart.clone(),
    };

    let redirect_url = state.config.payment_redirect_url.as_deref();
    let currency = state.config.currency.as_str();

    let initialized = match req.provider {
        PaymentProvider::Paystack => {
            state
                .services
                .gateways
                .paystack
                .initialize_transaction(
                    &req.email,
                    cart.total,
                    currency,
                    &reference,
                    redirect_url,
                    &metadata,
                )
                .await?
        }
        PaymentProvider::Flutterwave => {
            state
                .services
                .gateways
                .flutterwave
                .initialize_payment(
                    &req.email,
                    metadata.name.as_deref(),
                    metadata.phone.as_deref(),
                    cart.total,
                    currency,
                    &reference,
                    redirect_url,
                    &metadata,
                )
                .await?
        }
    };

    info!(%reference, provider = %req.provider, total = %cart.total, "payment initialized");

    Ok((
        StatusCode::OK,
        Json(InitializePaymentResponse {
            provider: req.provider,
            reference: initialized.reference,
            authorization_url: initialized.authorization_url,
            total: cart.total,
        }),
    ))
}

// GET /api/v1/payments/verify/:provider/:reference
#[utoipa::path(
    get,
    path = "/api/v1/payments/verify/{provider}/{reference}",
    params(
        ("provider" = String, Path, description = "Payment provider: paystack or flutterwave"),
        ("reference" = String, Path, description = "Transaction reference")
    ),
    responses(
        (status = 200, description = "Verification outcome", body = VerifyPaymentResponse),
        (status = 422, description = "Stock ran out before reconciliation", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment provider unreachable", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    Path((provider, reference)): Path<(PaymentProvider, String)>,
) -> Result<Json<VerifyPaymentResponse>, ServiceError> {
    let descriptor = match provider {
        PaymentProvider::Paystack => {
            state
                .services
                .gateways
                .paystack
                .verify_transaction(&reference)
                .await?
        }
        PaymentProvider::Flutterwave => {
            state
                .services
                .gateways
                .flutterwave
                .verify_transaction(&reference)
                .await?
        }
    };

    let Some(descriptor) = descriptor else {
        return Ok(Json(VerifyPaymentResponse {
            status: VerifyStatus::Unknown,
            order: None,
        }));
    };

    let outcome = state.services.reconciliation.reconcile(&descriptor).await?;
    Ok(Json(VerifyPaymentResponse::from_outcome(outcome)))
}
