//! Wallet ledger.
//!
//! A [`LedgerEntry`] records one balance change of one wallet. Entries are
//! append-only: the engine inserts them next to the wallet update they explain
//! and never updates or deletes them.
//!
//! For every entry `balance_after = balance_before ± amount`, with the sign
//! given by [`EntryType`].

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{BalanceChange, EngineError, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    Credit,
    Debit,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Credit => "CREDIT",
            Self::Debit => "DEBIT",
        }
    }
}

impl TryFrom<&str> for EntryType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "CREDIT" => Ok(Self::Credit),
            "DEBIT" => Ok(Self::Debit),
            other => Err(EngineError::InvalidInput(format!(
                "invalid entry type: {other}"
            ))),
        }
    }
}

/// What a ledger entry points back to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    Transfer,
    QrPayment,
    MissionLog,
    Order,
    Adjustment,
}

impl ReferenceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::QrPayment => "qr_payment",
            Self::MissionLog => "mission_log",
            Self::Order => "order",
            Self::Adjustment => "adjustment",
        }
    }
}

impl TryFrom<&str> for ReferenceType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "transfer" => Ok(Self::Transfer),
            "qr_payment" => Ok(Self::QrPayment),
            "mission_log" => Ok(Self::MissionLog),
            "order" => Ok(Self::Order),
            "adjustment" => Ok(Self::Adjustment),
            other => Err(EngineError::InvalidInput(format!(
                "invalid reference type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub transaction_id: Option<Uuid>,
    pub entry_type: EntryType,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub description: Option<String>,
    pub reference_type: ReferenceType,
    pub reference_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        wallet_id: Uuid,
        transaction_id: Option<Uuid>,
        entry_type: EntryType,
        amount: i64,
        change: BalanceChange,
        description: Option<String>,
        reference: (ReferenceType, Uuid),
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id,
            transaction_id,
            entry_type,
            amount,
            balance_before: change.before,
            balance_after: change.after,
            description,
            reference_type: reference.0,
            reference_id: reference.1,
            created_at,
        }
    }

    /// Signed effect of the entry on the wallet balance.
    #[must_use]
    pub fn signed_amount(&self) -> i64 {
        match self.entry_type {
            EntryType::Credit => self.amount,
            EntryType::Debit => -self.amount,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "wallet_ledger")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub wallet_id: String,
    pub transaction_id: Option<String>,
    pub entry_type: String,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub description: Option<String>,
    pub reference_type: String,
    pub reference_id: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::wallets::Entity",
        from = "Column::WalletId",
        to = "super::wallets::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Wallet,
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TransactionId",
        to = "super::transactions::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Transaction,
}

impl Related<super::wallets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Wallet.def()
    }
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&LedgerEntry> for ActiveModel {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            id: ActiveValue::Set(entry.id.to_string()),
            wallet_id: ActiveValue::Set(entry.wallet_id.to_string()),
            transaction_id: ActiveValue::Set(entry.transaction_id.map(|id| id.to_string())),
            entry_type: ActiveValue::Set(entry.entry_type.as_str().to_string()),
            amount: ActiveValue::Set(entry.amount),
            balance_before: ActiveValue::Set(entry.balance_before),
            balance_after: ActiveValue::Set(entry.balance_after),
            description: ActiveValue::Set(entry.description.clone()),
            reference_type: ActiveValue::Set(entry.reference_type.as_str().to_string()),
            reference_id: ActiveValue::Set(entry.reference_id.to_string()),
            created_at: ActiveValue::Set(entry.created_at),
        }
    }
}

impl TryFrom<Model> for LedgerEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "ledger entry")?,
            wallet_id: parse_uuid(&model.wallet_id, "wallet")?,
            transaction_id: model
                .transaction_id
                .as_deref()
                .map(|id| parse_uuid(id, "transaction"))
                .transpose()?,
            entry_type: EntryType::try_from(model.entry_type.as_str())?,
            amount: model.amount,
            balance_before: model.balance_before,
            balance_after: model.balance_after,
            description: model.description,
            reference_type: ReferenceType::try_from(model.reference_type.as_str())?,
            reference_id: parse_uuid(&model.reference_id, "reference")?,
            created_at: model.created_at,
        })
    }
}
