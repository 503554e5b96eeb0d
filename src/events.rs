use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the reconciliation pipeline. Consumers are best-effort:
/// a full channel never blocks or fails payment processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        payment_reference: String,
    },
    PaymentProcessed {
        provider: String,
        reference: String,
    },
    PaymentFailed {
        provider: String,
        reference: String,
        reason: String,
    },
    StockDecremented {
        product_id: Uuid,
        quantity: i32,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event without blocking the caller; a lagging consumer only
    /// costs the event, never the request.
    pub fn send(&self, event: Event) {
        if let Err(e) = self.sender.try_send(event) {
            warn!("Dropping event, channel unavailable: {}", e);
        }
    }
}

/// Drains the event channel, logging each event. The place to fan out to
/// notification or analytics consumers later.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated {
                order_id,
                payment_reference,
            } => {
                info!(%order_id, %payment_reference, "order created");
            }
            Event::PaymentProcessed {
                provider,
                reference,
            } => {
                info!(%provider, %reference, "payment processed");
            }
            Event::PaymentFailed {
                provider,
                reference,
                reason,
            } => {
                warn!(%provider, %reference, %reason, "payment failed");
            }
            Event::StockDecremented {
                product_id,
                quantity,
            } => {
                info!(%product_id, quantity, "stock decremented");
            }
        }
    }
}
