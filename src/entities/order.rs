use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Commercial record of a completed purchase.
///
/// `payment_reference` is unique-sparse: payment-originated orders carry the
/// gateway reference exactly once; orders created through other channels
/// leave it null. The unique index is a second idempotency backstop,
/// independent of the payment lock store.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    #[sea_orm(unique)]
    pub payment_reference: Option<String>,
    pub payment_provider: Option<String>,
    pub payment_status: String,
    pub paid_at: Option<DateTime<Utc>>,
    /// Legacy numeric shipping pipeline stage; 0 = pending.
    pub status: i32,
    pub total: Decimal,
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
