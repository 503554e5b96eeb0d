//! Shared test harness: in-memory SQLite with the real migrations, the real
//! service graph, and seed helpers.

#![allow(dead_code)]

use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use storefront_api::{
    api_v1_routes,
    config::AppConfig,
    db,
    entities::product,
    events::{process_events, EventSender},
    handlers::AppServices,
    payments::{CheckoutMetadata, PaymentDescriptor, PaymentProvider, VerifiedStatus},
    services::{
        inventory::InventoryService,
        orders::OrderService,
        payment_locks::PaymentLockService,
        pricing::{NormalizedCart, NormalizedCartLine, PricingService},
        reconciliation::ReconciliationService,
    },
    AppState,
};
use tokio::sync::mpsc;
use uuid::Uuid;

pub struct TestContext {
    pub db: Arc<DatabaseConnection>,
    pub pricing: PricingService,
    pub inventory: InventoryService,
    pub locks: PaymentLockService,
    pub orders: OrderService,
    pub reconciliation: ReconciliationService,
}

/// Single-connection pool so every task sees the same in-memory database.
pub async fn setup() -> TestContext {
    let mut opt = ConnectOptions::new("sqlite::memory:".to_string());
    opt.max_connections(1).min_connections(1).sqlx_logging(false);

    let pool = Database::connect(opt).await.expect("db connect");
    db::run_migrations(&pool).await.expect("migrations");

    let db = Arc::new(pool);
    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(process_events(rx));
    let event_sender = EventSender::new(tx);

    let inventory = InventoryService::new(db.clone());
    let locks = PaymentLockService::new(db.clone());
    let orders = OrderService::new(db.clone(), inventory.clone(), event_sender.clone());
    let reconciliation = ReconciliationService::new(locks.clone(), orders.clone(), event_sender);

    TestContext {
        pricing: PricingService::new(db.clone()),
        db,
        inventory,
        locks,
        orders,
        reconciliation,
    }
}

pub async fn seed_product(
    db: &DatabaseConnection,
    stock: i32,
    original_price: Decimal,
    discount_price: Option<Decimal>,
    wholesale_price: Option<Decimal>,
    wholesale_minimum_quantity: Option<i32>,
) -> product::Model {
    product::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("Seeded product".to_string()),
        image: Set(None),
        stock: Set(stock),
        original_price: Set(original_price),
        discount_price: Set(discount_price),
        wholesale_price: Set(wholesale_price),
        wholesale_minimum_quantity: Set(wholesale_minimum_quantity),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    }
    .insert(db)
    .await
    .expect("seed product")
}

/// One-line cart snapshot as the pricing resolver would have produced it.
pub fn cart_for(product: &product::Model, quantity: i32, unit_price: Decimal) -> NormalizedCart {
    NormalizedCart {
        products: vec![NormalizedCartLine {
            product_id: product.id,
            title: product.title.clone(),
            image: product.image.clone(),
            quantity,
            unit_price,
            is_wholesale: false,
        }],
        total: unit_price * Decimal::from(quantity),
    }
}

pub fn metadata_for(cart: NormalizedCart) -> CheckoutMetadata {
    CheckoutMetadata {
        user_id: Uuid::new_v4(),
        email: "buyer@example.com".to_string(),
        name: Some("Test Buyer".to_string()),
        phone: None,
        address: Some("12 Market Street".to_string()),
        cart,
    }
}

pub fn success_descriptor(reference: &str, cart: NormalizedCart) -> PaymentDescriptor {
    PaymentDescriptor {
        provider: PaymentProvider::Paystack,
        reference: reference.to_string(),
        verified_status: VerifiedStatus::Success,
        metadata: Some(metadata_for(cart)),
        paid_at: Some(Utc::now()),
    }
}

pub fn pending_descriptor(reference: &str) -> PaymentDescriptor {
    PaymentDescriptor {
        provider: PaymentProvider::Paystack,
        reference: reference.to_string(),
        verified_status: VerifiedStatus::Other,
        metadata: None,
        paid_at: None,
    }
}

/// Full HTTP app over the same database as the returned context, with both
/// provider clients pointed at the given base URL (a mock server).
pub async fn test_app(provider_base_url: &str) -> (TestContext, Router) {
    let ctx = setup().await;
    let cfg = test_config(provider_base_url);

    let (tx, rx) = mpsc::channel(256);
    tokio::spawn(process_events(rx));
    let event_sender = EventSender::new(tx);

    let services =
        AppServices::new(ctx.db.clone(), event_sender.clone(), &cfg).expect("build services");
    let state = AppState {
        db: ctx.db.clone(),
        config: cfg,
        event_sender,
        services,
    };

    let app = Router::new()
        .nest("/api/v1", api_v1_routes())
        .with_state(state);

    (ctx, app)
}

/// Test AppConfig pointing providers at the given base URL (a mock server).
pub fn test_config(provider_base_url: &str) -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        db_max_connections: 1,
        db_min_connections: 1,
        auto_migrate: false,
        host: "127.0.0.1".to_string(),
        port: 0,
        environment: "test".to_string(),
        log_level: "info".to_string(),
        log_json: false,
        cors_allowed_origins: None,
        paystack_secret_key: "sk_test_webhook_secret".to_string(),
        paystack_base_url: provider_base_url.to_string(),
        flutterwave_secret_key: "FLWSECK_TEST-secret".to_string(),
        flutterwave_secret_hash: "flw-verif-hash".to_string(),
        flutterwave_base_url: provider_base_url.to_string(),
        provider_timeout_secs: 5,
        currency: "NGN".to_string(),
        payment_redirect_url: None,
    }
}
