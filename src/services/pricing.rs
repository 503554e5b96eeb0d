use crate::{
    entities::{product, Product},
    errors::ServiceError,
};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

/// Client-supplied cart line. Only the product id and quantity are
/// representable; any price the client attaches is dropped during
/// deserialization and recomputed from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartLineInput {
    #[serde(alias = "id")]
    pub product_id: Uuid,
    pub quantity: i32,
}

/// Server-priced cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NormalizedCartLine {
    pub product_id: Uuid,
    pub title: String,
    pub image: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub is_wholesale: bool,
}

/// Authoritative cart: normalized lines plus the total the provider will be
/// asked to charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NormalizedCart {
    pub products: Vec<NormalizedCartLine>,
    pub total: Decimal,
}

/// Recomputes line prices and totals from the catalog. Read-only; runs at
/// payment initialization so the amount authorized with the provider always
/// matches server truth.
#[derive(Clone)]
pub struct PricingService {
    db: Arc<DatabaseConnection>,
}

impl PricingService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, lines))]
    pub async fn resolve(&self, lines: &[CartLineInput]) -> Result<NormalizedCart, ServiceError> {
        if lines.is_empty() {
            return Err(ServiceError::InvalidInput("cart is empty".to_string()));
        }

        let mut products = Vec::with_capacity(lines.len());
        let mut total = Decimal::ZERO;

        for line in lines {
            if line.quantity < 1 {
                return Err(ServiceError::InvalidInput(format!(
                    "quantity for product {} must be at least 1",
                    line.product_id
                )));
            }

            let product = Product::find_by_id(line.product_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("Product {} not found", line.product_id))
                })?;

            let (unit_price, is_wholesale) = unit_price_for(&product, line.quantity)?;
            total += unit_price * Decimal::from(line.quantity);

            products.push(NormalizedCartLine {
                product_id: product.id,
                title: product.title,
                image: product.image,
                quantity: line.quantity,
                unit_price,
                is_wholesale,
            });
        }

        Ok(NormalizedCart {
            products,
            total: round_total(total),
        })
    }
}

/// Picks the unit price for one line: wholesale price once the quantity
/// meets the configured minimum, else the discount price when present and
/// positive, else the original price.
fn unit_price_for(product: &product::Model, quantity: i32) -> Result<(Decimal, bool), ServiceError> {
    if let (Some(wholesale_price), Some(minimum)) = (
        product.wholesale_price,
        product.wholesale_minimum_quantity,
    ) {
        if quantity >= minimum {
            return validated(product.id, wholesale_price).map(|p| (p, true));
        }
    }

    let price = match product.discount_price {
        Some(discount) if discount > Decimal::ZERO => discount,
        _ => product.original_price,
    };

    validated(product.id, price).map(|p| (p, false))
}

fn validated(product_id: Uuid, price: Decimal) -> Result<Decimal, ServiceError> {
    if price <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "Product {} has an invalid price",
            product_id
        )));
    }
    Ok(price)
}

/// Half-up rounding to 2 decimal places, applied at the total level only.
fn round_total(total: Decimal) -> Decimal {
    total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
