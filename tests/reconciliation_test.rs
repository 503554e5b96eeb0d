//! End-to-end reconciliation properties: exactly-once materialization,
//! oversell protection, retry after failure, repair paths.

mod common;

use common::{cart_for, seed_product, setup, success_descriptor};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use storefront_api::{
    entities::{order, payment_lock::PaymentLockStatus, product, Order, PaymentLock},
    errors::ServiceError,
    payments::PaymentProvider,
    services::{pricing::CartLineInput, reconciliation::ReconcileOutcome},
};

#[tokio::test]
async fn successful_webhook_materializes_order_once() {
    let ctx = setup().await;
    let seeded = seed_product(&ctx.db, 10, dec!(6000), Some(dec!(5000)), None, None).await;

    // Resolve through the real pricing path, as initialization would.
    let cart = ctx
        .pricing
        .resolve(&[CartLineInput {
            product_id: seeded.id,
            quantity: 2,
        }])
        .await
        .unwrap();
    assert_eq!(cart.total, dec!(10000));

    let descriptor = success_descriptor("REF1", cart);
    let outcome = ctx.reconciliation.reconcile(&descriptor).await.unwrap();

    let order = match outcome {
        ReconcileOutcome::Processed(order) => order,
        other => panic!("expected Processed, got {:?}", other),
    };
    assert_eq!(order.total, dec!(10000));
    assert_eq!(order.payment_status, "paid");
    assert_eq!(order.status, 0);
    assert_eq!(order.payment_reference.as_deref(), Some("REF1"));

    let stock = product::Entity::find_by_id(seeded.id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap()
        .stock;
    assert_eq!(stock, 8);

    let lock = ctx.locks.get("REF1").await.unwrap().unwrap();
    assert_eq!(lock.status, PaymentLockStatus::Processed);

    let items = ctx.orders.items_for(&order).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 2);
    assert_eq!(items[0].unit_price, dec!(5000));
}

#[tokio::test]
async fn duplicate_sequential_delivery_is_a_no_op() {
    let ctx = setup().await;
    let seeded = seed_product(&ctx.db, 10, dec!(5000), None, None, None).await;
    let cart = cart_for(&seeded, 2, dec!(5000));

    let descriptor = success_descriptor("SF-dup-1", cart);

    let first = ctx.reconciliation.reconcile(&descriptor).await.unwrap();
    assert!(matches!(first, ReconcileOutcome::Processed(_)));

    let second = ctx.reconciliation.reconcile(&descriptor).await.unwrap();
    let replay = match second {
        ReconcileOutcome::AlreadyProcessed(order) => order,
        other => panic!("expected AlreadyProcessed, got {:?}", other),
    };
    assert_eq!(replay.payment_reference.as_deref(), Some("SF-dup-1"));

    // Stock decremented exactly once.
    let stock = product::Entity::find_by_id(seeded.id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap()
        .stock;
    assert_eq!(stock, 8);

    let orders = Order::find()
        .filter(order::Column::PaymentReference.eq("SF-dup-1"))
        .all(&*ctx.db)
        .await
        .unwrap();
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
async fn duplicate_parallel_delivery_creates_one_order() {
    let ctx = setup().await;
    let seeded = seed_product(&ctx.db, 10, dec!(5000), None, None, None).await;
    let descriptor = success_descriptor("SF-dup-2", cart_for(&seeded, 2, dec!(5000)));

    let (a, b) = tokio::join!(
        ctx.reconciliation.reconcile(&descriptor),
        ctx.reconciliation.reconcile(&descriptor),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    let processed = [&a, &b]
        .iter()
        .filter(|o| matches!(o, ReconcileOutcome::Processed(_)))
        .count();
    assert_eq!(processed, 1, "exactly one delivery may materialize");
    for outcome in [&a, &b] {
        assert!(
            matches!(
                outcome,
                ReconcileOutcome::Processed(_)
                    | ReconcileOutcome::AlreadyProcessed(_)
                    | ReconcileOutcome::InProgress
            ),
            "unexpected outcome {:?}",
            outcome
        );
    }

    let stock = product::Entity::find_by_id(seeded.id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap()
        .stock;
    assert_eq!(stock, 8, "stock must be decremented exactly once");

    let orders = Order::find()
        .filter(order::Column::PaymentReference.eq("SF-dup-2"))
        .all(&*ctx.db)
        .await
        .unwrap();
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
async fn oversell_is_rejected_and_lock_fails() {
    let ctx = setup().await;
    let seeded = seed_product(&ctx.db, 10, dec!(100), None, None, None).await;

    let first = success_descriptor("SF-stock-1", cart_for(&seeded, 6, dec!(100)));
    let second = success_descriptor("SF-stock-2", cart_for(&seeded, 6, dec!(100)));

    assert!(matches!(
        ctx.reconciliation.reconcile(&first).await.unwrap(),
        ReconcileOutcome::Processed(_)
    ));

    let err = ctx.reconciliation.reconcile(&second).await.unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // First decrement stands, failed attempt left no partial decrement.
    let stock = product::Entity::find_by_id(seeded.id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap()
        .stock;
    assert_eq!(stock, 4);

    let lock = ctx.locks.get("SF-stock-2").await.unwrap().unwrap();
    assert_eq!(lock.status, PaymentLockStatus::Failed);
    assert!(lock.last_error.is_some());

    assert!(ctx
        .orders
        .find_by_reference("SF-stock-2")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn concurrent_oversell_never_exceeds_stock() {
    let ctx = setup().await;
    let seeded = seed_product(&ctx.db, 10, dec!(100), None, None, None).await;

    let descriptors: Vec<_> = (0..4)
        .map(|i| {
            success_descriptor(
                &format!("SF-burst-{}", i),
                cart_for(&seeded, 3, dec!(100)),
            )
        })
        .collect();

    let (a, b, c, d) = tokio::join!(
        ctx.reconciliation.reconcile(&descriptors[0]),
        ctx.reconciliation.reconcile(&descriptors[1]),
        ctx.reconciliation.reconcile(&descriptors[2]),
        ctx.reconciliation.reconcile(&descriptors[3]),
    );

    let successes = [a, b, c, d]
        .into_iter()
        .filter(|r| matches!(r, Ok(ReconcileOutcome::Processed(_))))
        .count();
    assert_eq!(successes, 3, "only 9 of 10 units fit three orders of three");

    let stock = product::Entity::find_by_id(seeded.id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap()
        .stock;
    assert_eq!(stock, 1, "total decrement must never exceed initial stock");
}

#[tokio::test]
async fn failed_lock_retries_to_processed_after_restock() {
    let ctx = setup().await;
    let seeded = seed_product(&ctx.db, 1, dec!(700), None, None, None).await;
    let descriptor = success_descriptor("SF-retry-1", cart_for(&seeded, 5, dec!(700)));

    let err = ctx.reconciliation.reconcile(&descriptor).await.unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));
    assert_eq!(
        ctx.locks.get("SF-retry-1").await.unwrap().unwrap().status,
        PaymentLockStatus::Failed
    );

    // Operator fixes the stock; the provider redelivers.
    let mut restock: product::ActiveModel = product::Entity::find_by_id(seeded.id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap()
        .into();
    restock.stock = Set(10);
    restock.update(&*ctx.db).await.unwrap();

    let outcome = ctx.reconciliation.reconcile(&descriptor).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Processed(_)));
    assert_eq!(
        ctx.locks.get("SF-retry-1").await.unwrap().unwrap().status,
        PaymentLockStatus::Processed
    );

    let stock = product::Entity::find_by_id(seeded.id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap()
        .stock;
    assert_eq!(stock, 5);
}

#[tokio::test]
async fn non_success_status_touches_nothing() {
    let ctx = setup().await;

    let outcome = ctx
        .reconciliation
        .reconcile(&common::pending_descriptor("SF-pending-1"))
        .await
        .unwrap();

    assert!(matches!(outcome, ReconcileOutcome::NotSuccessful));
    assert!(ctx.locks.get("SF-pending-1").await.unwrap().is_none());
    assert!(ctx
        .orders
        .find_by_reference("SF-pending-1")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn missing_metadata_fails_and_marks_lock() {
    let ctx = setup().await;

    let mut descriptor = common::pending_descriptor("SF-nometa-1");
    descriptor.verified_status = storefront_api::payments::VerifiedStatus::Success;

    let err = ctx.reconciliation.reconcile(&descriptor).await.unwrap_err();
    assert!(matches!(err, ServiceError::ValidationError(_)));

    let lock = ctx.locks.get("SF-nometa-1").await.unwrap().unwrap();
    assert_eq!(lock.status, PaymentLockStatus::Failed);
}

#[tokio::test]
async fn existing_order_with_lost_lock_is_repaired() {
    let ctx = setup().await;
    let seeded = seed_product(&ctx.db, 10, dec!(5000), None, None, None).await;
    let descriptor = success_descriptor("SF-repair-1", cart_for(&seeded, 1, dec!(5000)));

    assert!(matches!(
        ctx.reconciliation.reconcile(&descriptor).await.unwrap(),
        ReconcileOutcome::Processed(_)
    ));

    // Simulate a lost lock row; the order itself survives.
    PaymentLock::delete_by_id("SF-repair-1")
        .exec(&*ctx.db)
        .await
        .unwrap();
    assert!(ctx.locks.get("SF-repair-1").await.unwrap().is_none());

    let outcome = ctx.reconciliation.reconcile(&descriptor).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::AlreadyProcessed(_)));

    // Lock row recreated in terminal state, stock untouched.
    assert_eq!(
        ctx.locks.get("SF-repair-1").await.unwrap().unwrap().status,
        PaymentLockStatus::Processed
    );
    let stock = product::Entity::find_by_id(seeded.id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap()
        .stock;
    assert_eq!(stock, 9);
}

#[tokio::test]
async fn provider_tag_is_recorded_on_lock_and_order() {
    let ctx = setup().await;
    let seeded = seed_product(&ctx.db, 5, dec!(300), None, None, None).await;

    let mut descriptor = success_descriptor("SF-tag-1", cart_for(&seeded, 1, dec!(300)));
    descriptor.provider = PaymentProvider::Flutterwave;

    let order = match ctx.reconciliation.reconcile(&descriptor).await.unwrap() {
        ReconcileOutcome::Processed(order) => order,
        other => panic!("expected Processed, got {:?}", other),
    };

    assert_eq!(order.payment_provider.as_deref(), Some("flutterwave"));
    assert_eq!(
        ctx.locks.get("SF-tag-1").await.unwrap().unwrap().provider,
        "flutterwave"
    );
}
