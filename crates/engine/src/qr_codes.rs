//! QR payment codes.
//!
//! A code is created ACTIVE, is paid at most once (ACTIVE → USED) and can be
//! cancelled by its creator while still ACTIVE. Expiry is lazy: the first read
//! past `expires_at` flips it to EXPIRED.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QrType {
    Payment,
    Product,
}

impl QrType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Payment => "PAYMENT",
            Self::Product => "PRODUCT",
        }
    }
}

impl TryFrom<&str> for QrType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "PAYMENT" => Ok(Self::Payment),
            "PRODUCT" => Ok(Self::Product),
            other => Err(EngineError::InvalidInput(format!("invalid qr type: {other}"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QrStatus {
    Active,
    Used,
    Expired,
    Cancelled,
}

impl QrStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Used => "USED",
            Self::Expired => "EXPIRED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl TryFrom<&str> for QrStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "ACTIVE" => Ok(Self::Active),
            "USED" => Ok(Self::Used),
            "EXPIRED" => Ok(Self::Expired),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(EngineError::InvalidInput(format!(
                "invalid qr status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrCode {
    pub id: Uuid,
    pub code: String,
    pub qr_type: QrType,
    /// Creator and payee of the code.
    pub creator_id: Uuid,
    pub amount: i64,
    pub description: Option<String>,
    pub signature: String,
    pub status: QrStatus,
    pub is_single_use: bool,
    pub max_uses: i32,
    pub current_uses: i32,
    pub used_by: Option<Uuid>,
    pub used_at: Option<DateTime<Utc>>,
    pub product_id: Option<Uuid>,
    pub transaction_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QrCode {
    /// True when an ACTIVE code has outlived `expires_at` and must be flipped.
    #[must_use]
    pub fn is_due_to_expire(&self, now: DateTime<Utc>) -> bool {
        self.status == QrStatus::Active && now > self.expires_at
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "qr_codes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub code: String,
    pub qr_type: String,
    pub creator_id: String,
    pub amount: i64,
    pub description: Option<String>,
    pub signature: String,
    pub status: String,
    pub is_single_use: bool,
    pub max_uses: i32,
    pub current_uses: i32,
    pub used_by: Option<String>,
    pub used_at: Option<DateTimeUtc>,
    pub product_id: Option<String>,
    pub transaction_id: Option<String>,
    pub expires_at: DateTimeUtc,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&QrCode> for ActiveModel {
    fn from(qr: &QrCode) -> Self {
        Self {
            id: ActiveValue::Set(qr.id.to_string()),
            code: ActiveValue::Set(qr.code.clone()),
            qr_type: ActiveValue::Set(qr.qr_type.as_str().to_string()),
            creator_id: ActiveValue::Set(qr.creator_id.to_string()),
            amount: ActiveValue::Set(qr.amount),
            description: ActiveValue::Set(qr.description.clone()),
            signature: ActiveValue::Set(qr.signature.clone()),
            status: ActiveValue::Set(qr.status.as_str().to_string()),
            is_single_use: ActiveValue::Set(qr.is_single_use),
            max_uses: ActiveValue::Set(qr.max_uses),
            current_uses: ActiveValue::Set(qr.current_uses),
            used_by: ActiveValue::Set(qr.used_by.map(|id| id.to_string())),
            used_at: ActiveValue::Set(qr.used_at),
            product_id: ActiveValue::Set(qr.product_id.map(|id| id.to_string())),
            transaction_id: ActiveValue::Set(qr.transaction_id.map(|id| id.to_string())),
            expires_at: ActiveValue::Set(qr.expires_at),
            created_at: ActiveValue::Set(qr.created_at),
            updated_at: ActiveValue::Set(qr.updated_at),
        }
    }
}

impl TryFrom<Model> for QrCode {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let opt = |value: Option<String>, label: &str| {
            value.as_deref().map(|v| parse_uuid(v, label)).transpose()
        };
        Ok(Self {
            id: parse_uuid(&model.id, "qr code")?,
            code: model.code,
            qr_type: QrType::try_from(model.qr_type.as_str())?,
            creator_id: parse_uuid(&model.creator_id, "user")?,
            amount: model.amount,
            description: model.description,
            signature: model.signature,
            status: QrStatus::try_from(model.status.as_str())?,
            is_single_use: model.is_single_use,
            max_uses: model.max_uses,
            current_uses: model.current_uses,
            used_by: opt(model.used_by, "user")?,
            used_at: model.used_at,
            product_id: opt(model.product_id, "product")?,
            transaction_id: opt(model.transaction_id, "transaction")?,
            expires_at: model.expires_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
