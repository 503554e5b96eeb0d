use crate::{
    entities::{product, Product},
    errors::ServiceError,
    services::pricing::NormalizedCartLine,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::instrument;

/// Guards the one piece of truly shared mutable state: `products.stock`.
/// Every decrement is a single conditional update, so the predicate is
/// evaluated and applied atomically by the storage layer and correctness
/// holds under arbitrary concurrent callers.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DatabaseConnection>,
}

impl InventoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Decrements stock for every line on the given connection. Pass a
    /// transaction to make the whole set all-or-nothing; the order
    /// materializer does exactly that.
    #[instrument(skip(self, conn, lines))]
    pub async fn reduce_stock_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        lines: &[NormalizedCartLine],
    ) -> Result<(), ServiceError> {
        for line in lines {
            let result = Product::update_many()
                .col_expr(
                    product::Column::Stock,
                    Expr::col(product::Column::Stock).sub(line.quantity),
                )
                .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(product::Column::Id.eq(line.product_id))
                .filter(product::Column::Stock.gte(line.quantity))
                .exec(conn)
                .await?;

            if result.rows_affected == 0 {
                return Err(ServiceError::InsufficientStock(format!(
                    "insufficient stock for product {} (requested {})",
                    line.product_id, line.quantity
                )));
            }
        }

        Ok(())
    }

    /// Standalone variant that wraps the decrements in their own
    /// transaction: either every line succeeds or none are applied.
    pub async fn reduce_stock(&self, lines: &[NormalizedCartLine]) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        match self.reduce_stock_on(&txn, lines).await {
            Ok(()) => {
                txn.commit().await?;
                Ok(())
            }
            Err(err) => {
                let _ = txn.rollback().await;
                Err(err)
            }
        }
    }
}
