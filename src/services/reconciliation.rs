use crate::{
    entities::{order, payment_lock::PaymentLockStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    payments::{PaymentDescriptor, VerifiedStatus},
    services::{orders::OrderService, payment_locks::PaymentLockService},
};
use tracing::{error, info, instrument};

/// What one reconciliation attempt concluded. `InProgress` and
/// `AlreadyProcessed` are successful short-circuits, not errors: under
/// at-least-once delivery most invocations land here.
#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    /// This attempt materialized the order.
    Processed(order::Model),
    /// A previous attempt already materialized it.
    AlreadyProcessed(order::Model),
    /// Another in-flight attempt holds the lock.
    InProgress,
    /// The provider has not (yet) confirmed the charge.
    NotSuccessful,
}

/// Shared reconciliation algorithm driven by both the webhook push path and
/// the verify pull path. Per-reference linearizability comes entirely from
/// the lock store's storage-level primitives; this type adds no locking of
/// its own and is safe to run from any number of processes.
#[derive(Clone)]
pub struct ReconciliationService {
    locks: PaymentLockService,
    orders: OrderService,
    event_sender: EventSender,
}

impl ReconciliationService {
    pub fn new(
        locks: PaymentLockService,
        orders: OrderService,
        event_sender: EventSender,
    ) -> Self {
        Self {
            locks,
            orders,
            event_sender,
        }
    }

    #[instrument(
        skip(self, descriptor),
        fields(provider = %descriptor.provider, reference = %descriptor.reference)
    )]
    pub async fn reconcile(
        &self,
        descriptor: &PaymentDescriptor,
    ) -> Result<ReconcileOutcome, ServiceError> {
        if descriptor.verified_status != VerifiedStatus::Success {
            return Ok(ReconcileOutcome::NotSuccessful);
        }

        let reference = descriptor.reference.as_str();

        // Order-exists fast path: the order is the ground truth. If it is
        // there but the lock row is missing or stale, repair the lock.
        if let Some(existing) = self.orders.find_by_reference(reference).await? {
            self.locks
                .ensure_processed(descriptor.provider, reference)
                .await?;
            return Ok(ReconcileOutcome::AlreadyProcessed(existing));
        }

        let acquired = self.locks.acquire(descriptor.provider, reference).await?;

        if acquired.lock.status == PaymentLockStatus::Processed {
            let existing = self
                .orders
                .find_by_reference(reference)
                .await?
                .ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "lock for {} is processed but no order exists",
                        reference
                    ))
                })?;
            return Ok(ReconcileOutcome::AlreadyProcessed(existing));
        }

        if !acquired.freshly_acquired {
            info!("reconciliation already in progress, skipping");
            return Ok(ReconcileOutcome::InProgress);
        }

        match self
            .orders
            .materialize(
                descriptor.provider,
                reference,
                descriptor.metadata.as_ref(),
                descriptor.paid_at,
            )
            .await
        {
            Ok(created) => {
                self.locks.mark_processed(reference).await?;
                self.event_sender.send(Event::PaymentProcessed {
                    provider: descriptor.provider.to_string(),
                    reference: reference.to_string(),
                });
                Ok(ReconcileOutcome::Processed(created))
            }
            Err(err) => {
                // Once acquired, every failure path must leave the lock
                // Failed so the next delivery can retry.
                if let Err(mark_err) = self.locks.mark_failed(reference, &err.to_string()).await {
                    error!(%mark_err, "failed to mark payment lock as failed");
                }
                self.event_sender.send(Event::PaymentFailed {
                    provider: descriptor.provider.to_string(),
                    reference: reference.to_string(),
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }
}
