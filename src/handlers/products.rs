use crate::{entities::Product, errors::ServiceError, handlers::AppState};
use axum::{
    extract::{Path, State},
    Json,
};
use rust_decimal::Decimal;
use sea_orm::EntityTrait;
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub title: String,
    pub image: Option<String>,
    pub stock: i32,
    pub original_price: Decimal,
    pub discount_price: Option<Decimal>,
    pub wholesale_price: Option<Decimal>,
    pub wholesale_minimum_quantity: Option<i32>,
}

// GET /api/v1/products/:id
#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product found", body = ProductResponse),
        (status = 404, description = "No such product", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductResponse>, ServiceError> {
    let product = Product::find_by_id(id)
        .one(&*state.db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

    Ok(Json(ProductResponse {
        id: product.id,
        title: product.title,
        image: product.image,
        stock: product.stock,
        original_price: product.original_price,
        discount_price: product.discount_price,
        wholesale_price: product.wholesale_price,
        wholesale_minimum_quantity: product.wholesale_minimum_quantity,
    }))
}
