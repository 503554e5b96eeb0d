use crate::{
    entities::{order, order_item},
    errors::ServiceError,
    handlers::AppState,
};
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub payment_reference: Option<String>,
    pub payment_provider: Option<String>,
    pub payment_status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub status: i32,
    pub total: Decimal,
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub products: Vec<OrderLineResponse>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderLineResponse {
    pub product_id: Uuid,
    pub title: String,
    pub image: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub is_wholesale: bool,
}

impl OrderResponse {
    fn assemble(order: order::Model, items: Vec<order_item::Model>) -> Self {
        Self {
            id: order.id,
            order_number: order.order_number,
            user_id: order.user_id,
            payment_reference: order.payment_reference,
            payment_provider: order.payment_provider,
            payment_status: order.payment_status,
            paid_at: order.paid_at,
            status: order.status,
            total: order.total,
            email: order.email,
            name: order.name,
            phone: order.phone,
            address: order.address,
            products: items
                .into_iter()
                .map(|item| OrderLineResponse {
                    product_id: item.product_id,
                    title: item.title,
                    image: item.image,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    is_wholesale: item.is_wholesale,
                })
                .collect(),
            created_at: order.created_at,
        }
    }
}

// GET /api/v1/orders/:id
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "No such order", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, ServiceError> {
    let order = state
        .services
        .orders
        .find_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;

    let items = state.services.orders.items_for(&order).await?;
    Ok(Json(OrderResponse::assemble(order, items)))
}

// GET /api/v1/orders/by-reference/:reference
#[utoipa::path(
    get,
    path = "/api/v1/orders/by-reference/{reference}",
    params(("reference" = String, Path, description = "Payment reference")),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "No order for that reference", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order_by_reference(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<OrderResponse>, ServiceError> {
    let order = state
        .services
        .orders
        .find_by_reference(&reference)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("No order for reference {}", reference))
        })?;

    let items = state.services.orders.items_for(&order).await?;
    Ok(Json(OrderResponse::assemble(order, items)))
}
