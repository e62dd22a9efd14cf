//! Marketplace products.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    /// Ignored when `is_unlimited` is set.
    pub stock: i64,
    pub is_unlimited: bool,
    pub sold_count: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub fn has_stock_for(&self, quantity: i64) -> bool {
        self.is_unlimited || self.stock >= quantity
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub seller_id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: i64,
    pub is_unlimited: bool,
    pub sold_count: i64,
    pub is_active: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::orders::Entity")]
    Orders,
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Product> for ActiveModel {
    fn from(product: &Product) -> Self {
        Self {
            id: ActiveValue::Set(product.id.to_string()),
            seller_id: ActiveValue::Set(product.seller_id.to_string()),
            name: ActiveValue::Set(product.name.clone()),
            description: ActiveValue::Set(product.description.clone()),
            price: ActiveValue::Set(product.price),
            stock: ActiveValue::Set(product.stock),
            is_unlimited: ActiveValue::Set(product.is_unlimited),
            sold_count: ActiveValue::Set(product.sold_count),
            is_active: ActiveValue::Set(product.is_active),
            created_at: ActiveValue::Set(product.created_at),
            updated_at: ActiveValue::Set(product.updated_at),
        }
    }
}

impl TryFrom<Model> for Product {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "product")?,
            seller_id: parse_uuid(&model.seller_id, "user")?,
            name: model.name,
            description: model.description,
            price: model.price,
            stock: model.stock,
            is_unlimited: model.is_unlimited,
            sold_count: model.sold_count,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
