use crate::{
    entities::{
        payment_lock::{self, PaymentLockStatus},
        PaymentLock,
    },
    errors::ServiceError,
    payments::PaymentProvider,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, SqlErr,
};
use std::sync::Arc;
use tracing::instrument;

/// Result of a lock acquisition attempt. `freshly_acquired` is true only
/// when this call won the right to materialize: a brand-new Processing row,
/// or a Failed row this call flipped back to Processing.
#[derive(Debug, Clone)]
pub struct AcquiredLock {
    pub lock: payment_lock::Model,
    pub freshly_acquired: bool,
}

/// Persistent idempotency lock store, keyed by payment reference.
///
/// All coordination happens in storage: the primary key rejects duplicate
/// inserts, and the Failed -> Processing transition is a conditional update.
/// Nothing here depends on process-local state, so correctness survives
/// restarts and horizontal scaling.
#[derive(Clone)]
pub struct PaymentLockService {
    db: Arc<DatabaseConnection>,
}

impl PaymentLockService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create-or-read acquisition. Never errors on the insert race itself:
    /// losing the insert means another delivery got there first, and the
    /// existing row decides what this caller may do.
    #[instrument(skip(self))]
    pub async fn acquire(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<AcquiredLock, ServiceError> {
        let now = Utc::now();
        let candidate = payment_lock::ActiveModel {
            reference: Set(reference.to_string()),
            provider: Set(provider.as_str().to_string()),
            status: Set(PaymentLockStatus::Processing),
            processed_at: Set(None),
            last_error: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        match candidate.insert(&*self.db).await {
            Ok(lock) => Ok(AcquiredLock {
                lock,
                freshly_acquired: true,
            }),
            Err(err) if is_unique_violation(&err) => self.acquire_existing(reference).await,
            Err(err) => Err(err.into()),
        }
    }

    async fn acquire_existing(&self, reference: &str) -> Result<AcquiredLock, ServiceError> {
        let existing = self.require(reference).await?;

        match existing.status {
            PaymentLockStatus::Processed | PaymentLockStatus::Processing => Ok(AcquiredLock {
                lock: existing,
                freshly_acquired: false,
            }),
            PaymentLockStatus::Failed => {
                // Retry path: only one caller can flip Failed back to
                // Processing, decided by the conditional update.
                let result = PaymentLock::update_many()
                    .set(payment_lock::ActiveModel {
                        status: Set(PaymentLockStatus::Processing),
                        updated_at: Set(Some(Utc::now())),
                        ..Default::default()
                    })
                    .filter(payment_lock::Column::Reference.eq(reference))
                    .filter(payment_lock::Column::Status.eq(PaymentLockStatus::Failed))
                    .exec(&*self.db)
                    .await?;

                let lock = self.require(reference).await?;
                Ok(AcquiredLock {
                    lock,
                    freshly_acquired: result.rows_affected == 1,
                })
            }
        }
    }

    pub async fn get(&self, reference: &str) -> Result<Option<payment_lock::Model>, ServiceError> {
        Ok(PaymentLock::find_by_id(reference).one(&*self.db).await?)
    }

    async fn require(&self, reference: &str) -> Result<payment_lock::Model, ServiceError> {
        self.get(reference).await?.ok_or_else(|| {
            // Locks are never deleted, so a vanished row is a store fault.
            ServiceError::InternalError(format!("payment lock for {} disappeared", reference))
        })
    }

    /// Terminal-success transition. Unconditional: the caller holds the
    /// critical section.
    #[instrument(skip(self))]
    pub async fn mark_processed(&self, reference: &str) -> Result<(), ServiceError> {
        let now = Utc::now();
        PaymentLock::update_many()
            .set(payment_lock::ActiveModel {
                status: Set(PaymentLockStatus::Processed),
                processed_at: Set(Some(now)),
                last_error: Set(None),
                updated_at: Set(Some(now)),
                ..Default::default()
            })
            .filter(payment_lock::Column::Reference.eq(reference))
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    /// Retryable-failure transition; records the error for operators.
    #[instrument(skip(self))]
    pub async fn mark_failed(&self, reference: &str, error: &str) -> Result<(), ServiceError> {
        PaymentLock::update_many()
            .set(payment_lock::ActiveModel {
                status: Set(PaymentLockStatus::Failed),
                last_error: Set(Some(error.to_string())),
                updated_at: Set(Some(Utc::now())),
                ..Default::default()
            })
            .filter(payment_lock::Column::Reference.eq(reference))
            .exec(&*self.db)
            .await?;
        Ok(())
    }

    /// Repair helper for the order-exists fast path: when an order already
    /// exists for a reference, the lock must read Processed regardless of
    /// what (if anything) the lock row says.
    #[instrument(skip(self))]
    pub async fn ensure_processed(
        &self,
        provider: PaymentProvider,
        reference: &str,
    ) -> Result<(), ServiceError> {
        if self.get(reference).await?.is_some() {
            return self.mark_processed(reference).await;
        }

        let now = Utc::now();
        let repaired = payment_lock::ActiveModel {
            reference: Set(reference.to_string()),
            provider: Set(provider.as_str().to_string()),
            status: Set(PaymentLockStatus::Processed),
            processed_at: Set(Some(now)),
            last_error: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        match repaired.insert(&*self.db).await {
            Ok(_) => Ok(()),
            // Lost an insert race with a concurrent repair or delivery; the
            // unconditional update settles it.
            Err(err) if is_unique_violation(&err) => self.mark_processed(reference).await,
            Err(err) => Err(err.into()),
        }
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}
