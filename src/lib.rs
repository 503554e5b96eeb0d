//! Storefront API Library
//!
//! Payment reconciliation core for an e-commerce storefront: cart pricing,
//! idempotency locks, atomic inventory decrement and exactly-once order
//! materialization, driven by Paystack and Flutterwave adapters.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod payments;
pub mod services;

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// All v1 API routes, nested under /api/v1 by the binary.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/payments/initialize",
            post(handlers::payments::initialize_payment),
        )
        .route(
            "/payments/verify/:provider/:reference",
            get(handlers::payments::verify_payment),
        )
        .route(
            "/payments/webhooks/paystack",
            post(handlers::payment_webhooks::paystack_webhook),
        )
        .route(
            "/payments/webhooks/flutterwave",
            post(handlers::payment_webhooks::flutterwave_webhook),
        )
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/by-reference/:reference",
            get(handlers::orders::get_order_by_reference),
        )
        .route("/products/:id", get(handlers::products::get_product))
}

/// Liveness plus a storage ping.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.db.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded", "database": e.to_string() })),
        ),
    }
}
