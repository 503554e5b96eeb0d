use crate::{
    entities::{order, order_item, Order, OrderItem},
    errors::ServiceError,
    events::{Event, EventSender},
    payments::{CheckoutMetadata, PaymentProvider},
    services::inventory::InventoryService,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, ModelTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// The only writer of payment-originated orders. `materialize` must run
/// inside the lock-acquired critical section of the reconciliation
/// algorithm; the unique index on `payment_reference` backstops that rule.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    inventory: InventoryService,
    event_sender: EventSender,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        inventory: InventoryService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            db,
            inventory,
            event_sender,
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<order::Model>, ServiceError> {
        Ok(Order::find_by_id(id).one(&*self.db).await?)
    }

    pub async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<order::Model>, ServiceError> {
        Ok(Order::find()
            .filter(order::Column::PaymentReference.eq(reference))
            .one(&*self.db)
            .await?)
    }

    pub async fn items_for(
        &self,
        order: &order::Model,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        Ok(order
            .find_related(OrderItem)
            .order_by_asc(order_item::Column::Position)
            .all(&*self.db)
            .await?)
    }

    /// Creates the order for a verified payment exactly once.
    ///
    /// Idempotent on re-entry: an order already recorded for the reference
    /// is returned unchanged, which covers a lock stuck in Processing after
    /// a crash between order insert and mark_processed. Stock decrements and
    /// the order insert share one transaction, so a mid-cart
    /// InsufficientStock leaves no partial decrement behind.
    #[instrument(skip(self, metadata))]
    pub async fn materialize(
        &self,
        provider: PaymentProvider,
        reference: &str,
        metadata: Option<&CheckoutMetadata>,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<order::Model, ServiceError> {
        if let Some(existing) = self.find_by_reference(reference).await? {
            return Ok(existing);
        }

        let meta = metadata.ok_or_else(|| {
            ServiceError::ValidationError(format!("payment {} carries no metadata", reference))
        })?;
        if meta.user_id.is_nil() {
            return Err(ServiceError::ValidationError(format!(
                "payment {} metadata has no user id",
                reference
            )));
        }
        if meta.cart.products.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "payment {} metadata has an empty cart",
                reference
            )));
        }
        if meta.cart.total <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "payment {} metadata has an invalid total",
                reference
            )));
        }

        let txn = self.db.begin().await?;
        let order = match self
            .materialize_in(&txn, provider, reference, meta, paid_at)
            .await
        {
            Ok(order) => {
                txn.commit().await?;
                order
            }
            Err(err) => {
                let _ = txn.rollback().await;
                return Err(err);
            }
        };

        for line in &meta.cart.products {
            self.event_sender.send(Event::StockDecremented {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }
        self.event_sender.send(Event::OrderCreated {
            order_id: order.id,
            payment_reference: reference.to_string(),
        });

        Ok(order)
    }

    async fn materialize_in(
        &self,
        txn: &DatabaseTransaction,
        provider: PaymentProvider,
        reference: &str,
        meta: &CheckoutMetadata,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<order::Model, ServiceError> {
        self.inventory
            .reduce_stock_on(txn, &meta.cart.products)
            .await?;

        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let order = order::ActiveModel {
            id: Set(order_id),
            order_number: Set(format!("ORD-{}", order_id.to_string()[..8].to_uppercase())),
            user_id: Set(meta.user_id),
            payment_reference: Set(Some(reference.to_string())),
            payment_provider: Set(Some(provider.as_str().to_string())),
            payment_status: Set("paid".to_string()),
            paid_at: Set(Some(paid_at.unwrap_or(now))),
            status: Set(0),
            total: Set(meta.cart.total),
            email: Set(Some(meta.email.clone())),
            name: Set(meta.name.clone()),
            phone: Set(meta.phone.clone()),
            address: Set(meta.address.clone()),
            shipped_at: Set(None),
            delivered_at: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(txn)
        .await?;

        let items = meta
            .cart
            .products
            .iter()
            .enumerate()
            .map(|(position, line)| order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                position: Set(position as i32),
                product_id: Set(line.product_id),
                title: Set(line.title.clone()),
                image: Set(line.image.clone()),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                is_wholesale: Set(line.is_wholesale),
            });
        OrderItem::insert_many(items).exec(txn).await?;

        Ok(order)
    }
}
