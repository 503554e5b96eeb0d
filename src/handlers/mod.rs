pub mod orders;
pub mod payment_webhooks;
pub mod payments;
pub mod products;

use crate::{
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    events::EventSender,
    payments::PaymentGateways,
    services::{
        inventory::InventoryService, orders::OrderService, payment_locks::PaymentLockService,
        pricing::PricingService, reconciliation::ReconciliationService,
    },
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer used by the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub pricing: Arc<PricingService>,
    pub inventory: Arc<InventoryService>,
    pub locks: Arc<PaymentLockService>,
    pub orders: Arc<OrderService>,
    pub reconciliation: Arc<ReconciliationService>,
    pub gateways: Arc<PaymentGateways>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        config: &AppConfig,
    ) -> Result<Self, ServiceError> {
        let pricing = PricingService::new(db.clone());
        let inventory = InventoryService::new(db.clone());
        let locks = PaymentLockService::new(db.clone());
        let orders = OrderService::new(db.clone(), inventory.clone(), event_sender.clone());
        let reconciliation =
            ReconciliationService::new(locks.clone(), orders.clone(), event_sender);
        let gateways = PaymentGateways::from_config(config)?;

        Ok(Self {
            pricing: Arc::new(pricing),
            inventory: Arc::new(inventory),
            locks: Arc::new(locks),
            orders: Arc::new(orders),
            reconciliation: Arc::new(reconciliation),
            gateways: Arc::new(gateways),
        })
    }
}
