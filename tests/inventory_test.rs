//! Inventory ledger: conditional decrement semantics.

mod common;

use common::{seed_product, setup};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use storefront_api::{
    entities::product, errors::ServiceError, services::pricing::NormalizedCartLine,
};

fn line(product: &product::Model, quantity: i32) -> NormalizedCartLine {
    NormalizedCartLine {
        product_id: product.id,
        title: product.title.clone(),
        image: None,
        quantity,
        unit_price: dec!(100),
        is_wholesale: false,
    }
}

async fn stock_of(ctx: &common::TestContext, id: uuid::Uuid) -> i32 {
    product::Entity::find_by_id(id)
        .one(&*ctx.db)
        .await
        .unwrap()
        .unwrap()
        .stock
}

#[tokio::test]
async fn decrements_every_line_when_stock_suffices() {
    let ctx = setup().await;
    let first = seed_product(&ctx.db, 10, dec!(100), None, None, None).await;
    let second = seed_product(&ctx.db, 7, dec!(100), None, None, None).await;

    ctx.inventory
        .reduce_stock(&[line(&first, 4), line(&second, 7)])
        .await
        .unwrap();

    assert_eq!(stock_of(&ctx, first.id).await, 6);
    assert_eq!(stock_of(&ctx, second.id).await, 0);
}

#[tokio::test]
async fn failing_line_rolls_back_earlier_decrements() {
    let ctx = setup().await;
    let first = seed_product(&ctx.db, 10, dec!(100), None, None, None).await;
    let second = seed_product(&ctx.db, 2, dec!(100), None, None, None).await;

    let err = ctx
        .inventory
        .reduce_stock(&[line(&first, 4), line(&second, 3)])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));

    // The first line's decrement must not survive the failed attempt.
    assert_eq!(stock_of(&ctx, first.id).await, 10);
    assert_eq!(stock_of(&ctx, second.id).await, 2);
}

#[tokio::test]
async fn missing_product_fails_like_insufficient_stock() {
    let ctx = setup().await;
    let ghost = product::Model {
        id: uuid::Uuid::new_v4(),
        title: "Ghost".to_string(),
        image: None,
        stock: 0,
        original_price: dec!(100),
        discount_price: None,
        wholesale_price: None,
        wholesale_minimum_quantity: None,
        created_at: chrono::Utc::now(),
        updated_at: None,
    };

    let err = ctx
        .inventory
        .reduce_stock(&[line(&ghost, 1)])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientStock(_)));
}

#[tokio::test]
async fn stock_never_goes_negative_under_concurrent_callers() {
    let ctx = setup().await;
    let seeded = seed_product(&ctx.db, 5, dec!(100), None, None, None).await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let inventory = ctx.inventory.clone();
        let one_unit = line(&seeded, 1);
        tasks.push(tokio::spawn(async move {
            inventory.reduce_stock(&[one_unit]).await.is_ok()
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 5, "exactly the available units may be taken");
    assert_eq!(stock_of(&ctx, seeded.id).await, 0);
}
