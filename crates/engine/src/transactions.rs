//! Transaction log.
//!
//! A [`TransactionRecord`] is one logical money-movement event. Each record is
//! keyed by the caller's idempotency key: a second request carrying the same
//! key is answered from the stored record instead of being executed again.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Transfer,
    QrPayment,
    MissionReward,
    Purchase,
    Adjustment,
    Topup,
    Sync,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Transfer => "TRANSFER",
            Self::QrPayment => "QR_PAYMENT",
            Self::MissionReward => "MISSION_REWARD",
            Self::Purchase => "PURCHASE",
            Self::Adjustment => "ADJUSTMENT",
            Self::Topup => "TOPUP",
            Self::Sync => "SYNC",
        }
    }

    /// Prefix of the human-readable transaction code.
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Transfer | Self::QrPayment | Self::Purchase => "TRX",
            Self::MissionReward => "MIS",
            Self::Adjustment => "ADJ",
            Self::Topup => "TOP",
            Self::Sync => "SYN",
        }
    }
}

impl TryFrom<&str> for TransactionType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "TRANSFER" => Ok(Self::Transfer),
            "QR_PAYMENT" => Ok(Self::QrPayment),
            "MISSION_REWARD" => Ok(Self::MissionReward),
            "PURCHASE" => Ok(Self::Purchase),
            "ADJUSTMENT" => Ok(Self::Adjustment),
            "TOPUP" => Ok(Self::Topup),
            "SYNC" => Ok(Self::Sync),
            other => Err(EngineError::InvalidInput(format!(
                "invalid transaction type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Refunded => "REFUNDED",
        }
    }
}

impl TryFrom<&str> for TransactionStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "PROCESSING" => Ok(Self::Processing),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            "REFUNDED" => Ok(Self::Refunded),
            other => Err(EngineError::InvalidInput(format!(
                "invalid transaction status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub code: String,
    pub idempotency_key: String,
    /// The user who asked for the movement (payer, grader, buyer or admin).
    pub initiated_by: Uuid,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub from_wallet_id: Option<Uuid>,
    pub to_wallet_id: Option<Uuid>,
    pub amount: i64,
    pub fee_amount: i64,
    pub net_amount: i64,
    pub description: Option<String>,
    pub qr_code_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub mission_log_id: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// A fee-less record, completed at `now`.
    pub(crate) fn completed(
        transaction_type: TransactionType,
        idempotency_key: String,
        initiated_by: Uuid,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code: crate::util::readable_code(transaction_type.code_prefix(), now),
            idempotency_key,
            initiated_by,
            transaction_type,
            status: TransactionStatus::Completed,
            from_wallet_id: None,
            to_wallet_id: None,
            amount,
            fee_amount: 0,
            net_amount: amount,
            description: None,
            qr_code_id: None,
            order_id: None,
            mission_log_id: None,
            processed_at: Some(now),
            created_at: now,
        }
    }

    /// Whether the record may be handed back to `initiated_by` as the outcome
    /// of a `transaction_type` request.
    pub(crate) fn ensure_replayable(
        &self,
        initiated_by: Uuid,
        transaction_type: TransactionType,
    ) -> ResultEngine<()> {
        if self.initiated_by != initiated_by || self.transaction_type != transaction_type {
            return Err(EngineError::DuplicateRequest(format!(
                "idempotency key {} already used for another request",
                self.idempotency_key
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub code: String,
    #[sea_orm(unique)]
    pub idempotency_key: String,
    pub initiated_by: String,
    pub transaction_type: String,
    pub status: String,
    pub from_wallet_id: Option<String>,
    pub to_wallet_id: Option<String>,
    pub amount: i64,
    pub fee_amount: i64,
    pub net_amount: i64,
    pub description: Option<String>,
    pub qr_code_id: Option<String>,
    pub order_id: Option<String>,
    pub mission_log_id: Option<String>,
    pub processed_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ledger::Entity")]
    Ledger,
}

impl Related<super::ledger::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ledger.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

fn opt_id(id: Option<Uuid>) -> Option<String> {
    id.map(|id| id.to_string())
}

fn parse_opt(value: Option<String>, label: &str) -> ResultEngine<Option<Uuid>> {
    value.as_deref().map(|v| parse_uuid(v, label)).transpose()
}

impl From<&TransactionRecord> for ActiveModel {
    fn from(tx: &TransactionRecord) -> Self {
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            code: ActiveValue::Set(tx.code.clone()),
            idempotency_key: ActiveValue::Set(tx.idempotency_key.clone()),
            initiated_by: ActiveValue::Set(tx.initiated_by.to_string()),
            transaction_type: ActiveValue::Set(tx.transaction_type.as_str().to_string()),
            status: ActiveValue::Set(tx.status.as_str().to_string()),
            from_wallet_id: ActiveValue::Set(opt_id(tx.from_wallet_id)),
            to_wallet_id: ActiveValue::Set(opt_id(tx.to_wallet_id)),
            amount: ActiveValue::Set(tx.amount),
            fee_amount: ActiveValue::Set(tx.fee_amount),
            net_amount: ActiveValue::Set(tx.net_amount),
            description: ActiveValue::Set(tx.description.clone()),
            qr_code_id: ActiveValue::Set(opt_id(tx.qr_code_id)),
            order_id: ActiveValue::Set(opt_id(tx.order_id)),
            mission_log_id: ActiveValue::Set(opt_id(tx.mission_log_id)),
            processed_at: ActiveValue::Set(tx.processed_at),
            created_at: ActiveValue::Set(tx.created_at),
        }
    }
}

impl TryFrom<Model> for TransactionRecord {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            code: model.code,
            idempotency_key: model.idempotency_key,
            initiated_by: parse_uuid(&model.initiated_by, "user")?,
            transaction_type: TransactionType::try_from(model.transaction_type.as_str())?,
            status: TransactionStatus::try_from(model.status.as_str())?,
            from_wallet_id: parse_opt(model.from_wallet_id, "wallet")?,
            to_wallet_id: parse_opt(model.to_wallet_id, "wallet")?,
            amount: model.amount,
            fee_amount: model.fee_amount,
            net_amount: model.net_amount,
            description: model.description,
            qr_code_id: parse_opt(model.qr_code_id, "qr code")?,
            order_id: parse_opt(model.order_id, "order")?,
            mission_log_id: parse_opt(model.mission_log_id, "mission log")?,
            processed_at: model.processed_at,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_and_status_round_trip() {
        for ty in [
            TransactionType::Transfer,
            TransactionType::QrPayment,
            TransactionType::MissionReward,
            TransactionType::Purchase,
            TransactionType::Adjustment,
            TransactionType::Topup,
            TransactionType::Sync,
        ] {
            assert_eq!(TransactionType::try_from(ty.as_str()).unwrap(), ty);
        }
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Processing,
            TransactionStatus::Completed,
            TransactionStatus::Failed,
            TransactionStatus::Cancelled,
            TransactionStatus::Refunded,
        ] {
            assert_eq!(TransactionStatus::try_from(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn completed_record_uses_type_prefix() {
        let tx = TransactionRecord::completed(
            TransactionType::MissionReward,
            "k1".to_string(),
            Uuid::new_v4(),
            50,
            Utc::now(),
        );
        assert!(tx.code.starts_with("MIS-"));
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.net_amount, 50);
        assert_eq!(tx.fee_amount, 0);
    }

    #[test]
    fn replay_is_scoped_to_initiator_and_type() {
        let owner = Uuid::new_v4();
        let tx = TransactionRecord::completed(
            TransactionType::Transfer,
            "k1".to_string(),
            owner,
            10,
            Utc::now(),
        );
        assert!(tx.ensure_replayable(owner, TransactionType::Transfer).is_ok());
        assert!(matches!(
            tx.ensure_replayable(Uuid::new_v4(), TransactionType::Transfer),
            Err(EngineError::DuplicateRequest(_))
        ));
        assert!(matches!(
            tx.ensure_replayable(owner, TransactionType::Adjustment),
            Err(EngineError::DuplicateRequest(_))
        ));
    }
}
