//! Integration tests for the cart pricing resolver against a real schema.

mod common;

use common::{seed_product, setup};
use rust_decimal_macros::dec;
use storefront_api::{errors::ServiceError, services::pricing::CartLineInput};
use uuid::Uuid;

#[tokio::test]
async fn wholesale_price_activates_at_minimum_quantity() {
    let ctx = setup().await;
    let product = seed_product(
        &ctx.db,
        100,
        dec!(1500),
        Some(dec!(1200)),
        Some(dec!(900)),
        Some(5),
    )
    .await;

    let below = ctx
        .pricing
        .resolve(&[CartLineInput {
            product_id: product.id,
            quantity: 4,
        }])
        .await
        .unwrap();
    assert_eq!(below.products[0].unit_price, dec!(1200));
    assert!(!below.products[0].is_wholesale);
    assert_eq!(below.total, dec!(4800));

    let at_threshold = ctx
        .pricing
        .resolve(&[CartLineInput {
            product_id: product.id,
            quantity: 5,
        }])
        .await
        .unwrap();
    assert_eq!(at_threshold.products[0].unit_price, dec!(900));
    assert!(at_threshold.products[0].is_wholesale);
    assert_eq!(at_threshold.total, dec!(4500));
}

#[tokio::test]
async fn forged_client_prices_are_ignored() {
    let ctx = setup().await;
    let product = seed_product(&ctx.db, 10, dec!(5000), Some(dec!(4000)), None, None).await;

    // A tampered payload claiming the product costs 1: the input type has no
    // price field, so deserialization drops it and the catalog wins.
    let lines: Vec<CartLineInput> = serde_json::from_value(serde_json::json!([
        { "id": product.id, "quantity": 2, "price": 1, "discountPrice": 1 }
    ]))
    .unwrap();

    let resolved = ctx.pricing.resolve(&lines).await.unwrap();
    assert_eq!(resolved.products[0].unit_price, dec!(4000));
    assert_eq!(resolved.total, dec!(8000));
}

#[tokio::test]
async fn unknown_product_fails_resolution() {
    let ctx = setup().await;

    let err = ctx
        .pricing
        .resolve(&[CartLineInput {
            product_id: Uuid::new_v4(),
            quantity: 1,
        }])
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test]
async fn empty_cart_is_rejected() {
    let ctx = setup().await;
    let err = ctx.pricing.resolve(&[]).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn zero_quantity_is_rejected() {
    let ctx = setup().await;
    let product = seed_product(&ctx.db, 10, dec!(100), None, None, None).await;

    let err = ctx
        .pricing
        .resolve(&[CartLineInput {
            product_id: product.id,
            quantity: 0,
        }])
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::InvalidInput(_)));
}

#[tokio::test]
async fn multi_line_total_sums_every_line() {
    let ctx = setup().await;
    let first = seed_product(&ctx.db, 10, dec!(1500), Some(dec!(1200)), None, None).await;
    let second = seed_product(&ctx.db, 10, dec!(250), None, None, None).await;

    let resolved = ctx
        .pricing
        .resolve(&[
            CartLineInput {
                product_id: first.id,
                quantity: 2,
            },
            CartLineInput {
                product_id: second.id,
                quantity: 3,
            },
        ])
        .await
        .unwrap();

    assert_eq!(resolved.products.len(), 2);
    assert_eq!(resolved.total, dec!(3150));
}
